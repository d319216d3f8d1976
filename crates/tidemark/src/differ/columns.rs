//! Column differ.
//!
//! Column identity is resolved through the rename map first; everything
//! else compares by value. Each changed property (type, nullability,
//! default, identity) becomes its own entry so every alteration stays
//! individually reversible.

use crate::changeset::{ChangeEntry, ChangeKind};
use crate::pg;
use crate::snapshot::{ColumnInfo, TableInfo};

use super::DiffContext;

/// Diffs the columns of one table present in both snapshots.
pub(crate) fn diff(
    ctx: DiffContext<'_>,
    declared: &TableInfo,
    live: &TableInfo,
) -> Vec<ChangeEntry> {
    let table = &declared.name;
    let pairs = ctx.renames.columns_for(table);
    let mut entries = Vec::new();

    for pair in pairs {
        entries.push(ChangeEntry::table_scoped(
            table,
            ChangeKind::ChangeColumnName,
            vec![pg::rename_column(table, &pair.from, &pair.to)],
            vec![pg::rename_column(table, &pair.to, &pair.from)],
        ));
    }

    for (name, column) in &declared.columns {
        let live_name = pairs
            .iter()
            .find(|p| p.to == *name)
            .map_or(name.as_str(), |p| p.from.as_str());

        if let Some(live_column) = live.get_column(live_name) {
            entries.extend(property_changes(table, column, live_column));
        } else {
            entries.push(ChangeEntry::table_scoped(
                table,
                ChangeKind::CreateColumn,
                vec![pg::add_column(table, column)],
                vec![pg::drop_column(table, name)],
            ));
        }
    }

    for (name, live_column) in &live.columns {
        let target = ctx.renames.column_target(table, name).unwrap_or(name);
        if declared.columns.contains_key(target) {
            continue;
        }
        entries.push(ChangeEntry::table_scoped(
            table,
            ChangeKind::DropColumn,
            vec![pg::drop_column(table, name)],
            vec![pg::add_column(table, live_column)],
        ));
    }

    entries
}

/// Emits one entry per changed column property.
fn property_changes(table: &str, declared: &ColumnInfo, live: &ColumnInfo) -> Vec<ChangeEntry> {
    let name = &declared.name;
    let mut entries = Vec::new();

    if declared.data_type != live.data_type {
        entries.push(ChangeEntry::table_scoped(
            table,
            ChangeKind::ChangeColumn,
            vec![pg::set_data_type(table, name, &declared.data_type)],
            vec![pg::set_data_type(table, name, &live.data_type)],
        ));
    }

    if declared.nullable != live.nullable {
        entries.push(ChangeEntry::table_scoped(
            table,
            ChangeKind::ChangeColumn,
            vec![pg::set_nullable(table, name, declared.nullable)],
            vec![pg::set_nullable(table, name, live.nullable)],
        ));
    }

    if declared.default_drift_key() != live.default_drift_key() {
        entries.push(ChangeEntry::table_scoped(
            table,
            ChangeKind::ChangeColumn,
            vec![pg::set_default(table, name, declared.default_expression())],
            vec![pg::set_default(table, name, live.default_expression())],
        ));
    }

    if declared.identity != live.identity {
        entries.push(ChangeEntry::table_scoped(
            table,
            ChangeKind::ChangeColumn,
            vec![pg::set_identity(table, name, live.identity, declared.identity)],
            vec![pg::set_identity(table, name, declared.identity, live.identity)],
        ));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rename::{RenameMap, RenamePair};
    use crate::snapshot::{ColumnDraft, SchemaSnapshot, SnapshotBuilder, TableDraft};

    fn books(columns: Vec<ColumnDraft>) -> SchemaSnapshot {
        let mut draft = TableDraft::new("books");
        for c in columns {
            draft = draft.column(c);
        }
        SnapshotBuilder::new().table(draft).build().unwrap()
    }

    fn ctx_diff(
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
    fn test_identical_columns_produce_nothing() {
        let a = books(vec![ColumnDraft::new("id", "integer").primary_key()]);
        let entries = ctx_diff(&a, &a, &RenameMap::default());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_added_column() {
        let declared = books(vec![
            ColumnDraft::new("id", "integer"),
            ColumnDraft::new("title", "text").not_null(),
        ]);
        let live = books(vec![ColumnDraft::new("id", "integer")]);

        let entries = ctx_diff(&declared, &live, &RenameMap::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::CreateColumn);
        assert_eq!(
            entries[0].up,
            vec!["ALTER TABLE \"books\" ADD COLUMN \"title\" text NOT NULL"]
        );
        assert_eq!(
            entries[0].down,
            vec!["ALTER TABLE \"books\" DROP COLUMN \"title\""]
        );
    }

    #[test]
    fn test_dropped_column_down_restores_definition() {
        let declared = books(vec![ColumnDraft::new("id", "integer")]);
        let live = books(vec![
            ColumnDraft::new("id", "integer"),
            ColumnDraft::new("title", "text").not_null(),
        ]);

        let entries = ctx_diff(&declared, &live, &RenameMap::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::DropColumn);
        assert_eq!(
            entries[0].down,
            vec!["ALTER TABLE \"books\" ADD COLUMN \"title\" text NOT NULL"]
        );
    }

    #[test]
    fn test_rename_is_single_entry() {
        let declared = books(vec![ColumnDraft::new("book_id", "integer")]);
        let live = books(vec![ColumnDraft::new("id", "integer")]);
        let mut renames = RenameMap::default();
        renames
            .columns
            .insert("books".to_string(), vec![RenamePair::new("id", "book_id")]);

        let entries = ctx_diff(&declared, &live, &renames);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::ChangeColumnName);
        assert_eq!(
            entries[0].up,
            vec!["ALTER TABLE \"books\" RENAME COLUMN \"id\" TO \"book_id\""]
        );
        assert_eq!(
            entries[0].down,
            vec!["ALTER TABLE \"books\" RENAME COLUMN \"book_id\" TO \"id\""]
        );
    }

    #[test]
    fn test_property_changes_are_independent_entries() {
        let declared = books(vec![ColumnDraft::new("price", "numeric(10,2)")
            .not_null()
            .default_value("0")]);
        let live = books(vec![ColumnDraft::new("price", "integer")]);

        let entries = ctx_diff(&declared, &live, &RenameMap::default());
        // Type, nullability and default each get their own entry.
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.kind == ChangeKind::ChangeColumn));
        assert!(entries.iter().all(|e| e.up.len() == 1 && e.down.len() == 1));
    }

    #[test]
    fn test_identity_change() {
        use crate::snapshot::IdentityMode;
        let declared = books(vec![
            ColumnDraft::new("id", "integer").identity(IdentityMode::Always)
        ]);
        let live = books(vec![ColumnDraft::new("id", "integer")]);

        let entries = ctx_diff(&declared, &live, &RenameMap::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].up,
            vec!["ALTER TABLE \"books\" ALTER COLUMN \"id\" ADD GENERATED ALWAYS AS IDENTITY"]
        );
        assert_eq!(
            entries[0].down,
            vec!["ALTER TABLE \"books\" ALTER COLUMN \"id\" DROP IDENTITY"]
        );
    }
}
