//! Constraint differ: primary keys, unique, foreign key and check
//! constraints.
//!
//! Matching is content-first: a declared constraint whose hash equals a
//! live one is the same object, whatever either is called. A declared
//! constraint whose *pre-rename* hash equals a live one is the same object
//! carried across a rename and becomes a `RenameConstraint` instead of a
//! drop/create pair. Live constraints without the ownership tail are
//! external and never touched.

use std::collections::BTreeSet;

use crate::changeset::{ChangeEntry, ChangeKind};
use crate::naming::ObjectKind;
use crate::pg;
use crate::rename::RenamePair;
use crate::snapshot::{NamedDefinition, TableInfo};

use super::{apply_renames, pre_rename_hash, DiffContext};

const CONSTRAINT_KINDS: [ObjectKind; 4] = [
    ObjectKind::PrimaryKey,
    ObjectKind::Unique,
    ObjectKind::ForeignKey,
    ObjectKind::Check,
];

/// Diffs all constraints of one table present in both snapshots.
pub(crate) fn diff(
    ctx: DiffContext<'_>,
    declared: &TableInfo,
    live: &TableInfo,
) -> Vec<ChangeEntry> {
    let table = &declared.name;
    let pairs = ctx.renames.columns_for(table);
    let mut entries = Vec::new();

    for kind in CONSTRAINT_KINDS {
        let live_defs: Vec<&NamedDefinition> = defs_of(live, kind)
            .into_iter()
            .filter(|d| d.is_tool_owned(kind, ctx.tag))
            .collect();
        let mut consumed: BTreeSet<&str> = BTreeSet::new();

        for d in defs_of(declared, kind) {
            if let Some(i) = live_defs
                .iter()
                .find(|i| i.hash == d.hash && !consumed.contains(i.name.as_str()))
            {
                consumed.insert(&i.name);
                if i.name != d.name {
                    entries.push(rename_entry(kind, table, i, d));
                }
                continue;
            }

            let pre = pre_rename_hash(&d.definition, table, &live.name, pairs);
            if let Some(i) = live_defs
                .iter()
                .find(|i| i.hash == pre && !consumed.contains(i.name.as_str()))
            {
                consumed.insert(&i.name);
                entries.push(rename_entry(kind, table, i, d));
                continue;
            }

            entries.push(create_entry(kind, table, d));
        }

        for i in &live_defs {
            if !consumed.contains(i.name.as_str()) {
                entries.push(drop_entry(kind, table, &live.name, pairs, i));
            }
        }
    }

    entries
}

fn defs_of(table: &TableInfo, kind: ObjectKind) -> Vec<&NamedDefinition> {
    match kind {
        ObjectKind::PrimaryKey => table.primary_key.iter().collect(),
        ObjectKind::Unique => table.unique.values().collect(),
        ObjectKind::ForeignKey => table.foreign_keys.values().collect(),
        ObjectKind::Check => table.checks.values().collect(),
        ObjectKind::Index | ObjectKind::Trigger => Vec::new(),
    }
}

/// Foreign key and check constraints validate existing rows, so they are
/// added NOT VALID and validated in a second statement.
fn needs_validation(kind: ObjectKind) -> bool {
    matches!(kind, ObjectKind::ForeignKey | ObjectKind::Check)
}

/// Entry that adds one constraint and stamps its content hash.
pub(crate) fn create_entry(kind: ObjectKind, table: &str, def: &NamedDefinition) -> ChangeEntry {
    let change = if kind == ObjectKind::PrimaryKey {
        ChangeKind::CreatePrimaryKey
    } else {
        ChangeKind::CreateConstraint
    };

    let mut up = vec![pg::add_constraint(
        table,
        &def.name,
        &def.definition,
        needs_validation(kind),
    )];
    if needs_validation(kind) {
        up.push(pg::validate_constraint(table, &def.name));
    }
    up.push(pg::comment_hash(kind, table, &def.name, &def.hash));

    ChangeEntry::table_scoped(table, change, up, vec![pg::drop_constraint(table, &def.name)])
}

/// Entry that drops one constraint; its `down` re-adds the definition
/// phrased with post-rename identifiers, since drops run after renames.
pub(crate) fn drop_entry(
    kind: ObjectKind,
    table_now: &str,
    original_table: &str,
    pairs: &[RenamePair],
    def: &NamedDefinition,
) -> ChangeEntry {
    let restored = apply_renames(&def.definition, original_table, table_now, pairs);

    let mut down = vec![pg::add_constraint(
        table_now,
        &def.name,
        &restored,
        needs_validation(kind),
    )];
    if needs_validation(kind) {
        down.push(pg::validate_constraint(table_now, &def.name));
    }
    down.push(pg::comment_hash(kind, table_now, &def.name, &def.hash));

    ChangeEntry::table_scoped(
        table_now,
        ChangeKind::DropConstraint,
        vec![pg::drop_constraint(table_now, &def.name)],
        down,
    )
}

/// Entry that renames a constraint in place and moves its hash comment to
/// the new content hash.
fn rename_entry(
    kind: ObjectKind,
    table: &str,
    live: &NamedDefinition,
    declared: &NamedDefinition,
) -> ChangeEntry {
    ChangeEntry::table_scoped(
        table,
        ChangeKind::RenameConstraint,
        vec![
            pg::rename_constraint(table, &live.name, &declared.name),
            pg::comment_hash(kind, table, &declared.name, &declared.hash),
        ],
        vec![
            pg::rename_constraint(table, &declared.name, &live.name),
            pg::comment_hash(kind, table, &live.name, &live.hash),
        ],
    )
}
