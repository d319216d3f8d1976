//! Index differ.
//!
//! Same content-first matching as the constraint differ. The canonical
//! index definition is nameless (`CREATE [UNIQUE ]INDEX ON ...`), so a
//! rename never perturbs the hash and an index whose pre-rename hash
//! matches a live one survives a column or table rename as a single
//! `RenameIndex` entry.

use std::collections::BTreeSet;

use crate::changeset::{ChangeEntry, ChangeKind};
use crate::naming::ObjectKind;
use crate::pg;
use crate::rename::RenamePair;
use crate::snapshot::{NamedDefinition, TableInfo};

use super::{apply_renames, pre_rename_hash, DiffContext};

/// Diffs the indexes of one table present in both snapshots.
pub(crate) fn diff(
    ctx: DiffContext<'_>,
    declared: &TableInfo,
    live: &TableInfo,
) -> Vec<ChangeEntry> {
    let table = &declared.name;
    let pairs = ctx.renames.columns_for(table);
    let mut entries = Vec::new();

    let live_defs: Vec<&NamedDefinition> = live
        .indexes
        .values()
        .filter(|d| d.is_tool_owned(ObjectKind::Index, ctx.tag))
        .collect();
    let mut consumed: BTreeSet<&str> = BTreeSet::new();

    for d in declared.indexes.values() {
        if let Some(i) = live_defs
            .iter()
            .find(|i| i.hash == d.hash && !consumed.contains(i.name.as_str()))
        {
            consumed.insert(&i.name);
            if i.name != d.name {
                entries.push(rename_entry(table, i, d));
            }
            continue;
        }

        let pre = pre_rename_hash(&d.definition, table, &live.name, pairs);
        if let Some(i) = live_defs
            .iter()
            .find(|i| i.hash == pre && !consumed.contains(i.name.as_str()))
        {
            consumed.insert(&i.name);
            entries.push(rename_entry(table, i, d));
            continue;
        }

        entries.push(create_entry(table, d));
    }

    for i in &live_defs {
        if !consumed.contains(i.name.as_str()) {
            entries.push(drop_entry(table, &live.name, pairs, i));
        }
    }

    entries
}

/// Entry that creates one index and stamps its content hash.
pub(crate) fn create_entry(table: &str, def: &NamedDefinition) -> ChangeEntry {
    ChangeEntry::table_scoped(
        table,
        ChangeKind::CreateIndex,
        vec![
            pg::create_index(&def.name, &def.definition),
            pg::comment_hash(ObjectKind::Index, table, &def.name, &def.hash),
        ],
        vec![pg::drop_index(&def.name)],
    )
}

/// Entry that drops one index; the `down` recreates it with post-rename
/// identifiers, since drops run after renames.
pub(crate) fn drop_entry(
    table_now: &str,
    original_table: &str,
    pairs: &[RenamePair],
    def: &NamedDefinition,
) -> ChangeEntry {
    let restored = apply_renames(&def.definition, original_table, table_now, pairs);
    ChangeEntry::table_scoped(
        table_now,
        ChangeKind::DropIndex,
        vec![pg::drop_index(&def.name)],
        vec![
            pg::create_index(&def.name, &restored),
            pg::comment_hash(ObjectKind::Index, table_now, &def.name, &def.hash),
        ],
    )
}

fn rename_entry(table: &str, live: &NamedDefinition, declared: &NamedDefinition) -> ChangeEntry {
    ChangeEntry::table_scoped(
        table,
        ChangeKind::RenameIndex,
        vec![
            pg::rename_index(&live.name, &declared.name),
            pg::comment_hash(ObjectKind::Index, table, &declared.name, &declared.hash),
        ],
        vec![
            pg::rename_index(&declared.name, &live.name),
            pg::comment_hash(ObjectKind::Index, table, &live.name, &live.hash),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rename::RenameMap;
    use crate::snapshot::{ColumnDraft, IndexDraft, SchemaSnapshot, SnapshotBuilder, TableDraft};

    fn books_with_index(column: &str) -> SchemaSnapshot {
        SnapshotBuilder::new()
            .table(
                TableDraft::new("books")
                    .column(ColumnDraft::new(column, "text"))
                    .index(IndexDraft::new().columns(vec![column.to_string()]).unique()),
            )
            .build()
            .unwrap()
    }

    fn diff_books(
        declared: &SchemaSnapshot,
        live: &SchemaSnapshot,
        renames: &RenameMap,
    ) -> Vec<ChangeEntry> {
        let ctx = DiffContext {
            declared,
            introspected: live,
            renames,
            tag: "tm",
        };
        diff(
            ctx,
            declared.get_table("books").unwrap(),
            live.get_table("books").unwrap(),
        )
    }

    #[test]
    fn test_identical_indexes_produce_nothing() {
        let a = books_with_index("name");
        assert!(diff_books(&a, &a, &RenameMap::default()).is_empty());
    }

    #[test]
    fn test_new_index_creates_and_comments() {
        let declared = books_with_index("name");
        let live = SnapshotBuilder::new()
            .table(TableDraft::new("books").column(ColumnDraft::new("name", "text")))
            .build()
            .unwrap();

        let entries = diff_books(&declared, &live, &RenameMap::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::CreateIndex);
        assert!(entries[0].up[0].starts_with("CREATE UNIQUE INDEX \"books_"));
        assert!(entries[0].up[1].starts_with("COMMENT ON INDEX"));
        assert!(entries[0].down[0].starts_with("DROP INDEX"));
    }

    #[test]
    fn test_renamed_column_with_unchanged_index_is_rename_only() {
        let declared = books_with_index("full_name");
        let live = books_with_index("name");

        let mut renames = RenameMap::default();
        renames.columns.insert(
            "books".to_string(),
            vec![RenamePair::new("name", "full_name")],
        );

        let entries = diff_books(&declared, &live, &renames);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::RenameIndex);
        assert!(entries[0].up[0].starts_with("ALTER INDEX"));
        // No drop and no create anywhere in the entry.
        assert!(entries[0].up.iter().all(|s| !s.contains("DROP INDEX")));
        assert!(entries[0].up.iter().all(|s| !s.contains("CREATE ")));
    }

    #[test]
    fn test_external_index_is_ignored() {
        let declared = SnapshotBuilder::new()
            .table(TableDraft::new("books").column(ColumnDraft::new("name", "text")))
            .build()
            .unwrap();
        let mut live = declared.clone();
        let external = NamedDefinition::introspected(
            "books",
            "books_name_custom",
            "CREATE INDEX ON \"books\" (\"name\")",
            None,
        );
        live.tables
            .get_mut("books")
            .unwrap()
            .indexes
            .insert(external.name.clone(), external);

        assert!(diff_books(&declared, &live, &RenameMap::default()).is_empty());
    }

    #[test]
    fn test_removed_index_drop_is_reversible() {
        let declared = SnapshotBuilder::new()
            .table(TableDraft::new("books").column(ColumnDraft::new("name", "text")))
            .build()
            .unwrap();
        let live = books_with_index("name");

        let entries = diff_books(&declared, &live, &RenameMap::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::DropIndex);
        assert!(entries[0].up[0].starts_with("DROP INDEX"));
        assert!(entries[0].down[0].starts_with("CREATE UNIQUE INDEX"));
        assert!(entries[0].down[1].starts_with("COMMENT ON INDEX"));
    }
}
