//! Table differ.
//!
//! Top of the diff: resolves table identity through the rename map, emits
//! create/drop/rename entries for whole tables, and delegates the interior
//! of surviving tables to the column, constraint, index and trigger
//! differs. A created table fans out into one entry per dependent object
//! so the assembler can order them; a dropped table fans out likewise so
//! the rollback can rebuild it piece by piece.

use crate::changeset::{ChangeEntry, ChangeKind};
use crate::naming::ObjectKind;
use crate::pg;
use crate::snapshot::TableInfo;

use super::{columns, constraints, indexes, triggers, DiffContext};

/// Diffs all tables between the two snapshots.
pub(crate) fn diff(ctx: DiffContext<'_>) -> Vec<ChangeEntry> {
    let mut entries = Vec::new();

    for pair in &ctx.renames.tables {
        entries.push(ChangeEntry::table_scoped(
            &pair.to,
            ChangeKind::ChangeTableName,
            vec![pg::rename_table(&pair.from, &pair.to)],
            vec![pg::rename_table(&pair.to, &pair.from)],
        ));
    }

    for (name, declared) in &ctx.declared.tables {
        let source = ctx.renames.table_source(name).unwrap_or(name);
        if let Some(live) = ctx.introspected.get_table(source) {
            entries.extend(columns::diff(ctx, declared, live));
            entries.extend(constraints::diff(ctx, declared, live));
            entries.extend(indexes::diff(ctx, declared, live));
            entries.extend(triggers::diff(ctx, declared, live));
        } else {
            entries.extend(create_entries(declared));
        }
    }

    for (name, live) in &ctx.introspected.tables {
        if ctx.declared.tables.contains_key(name) || ctx.renames.table_target(name).is_some() {
            continue;
        }
        entries.extend(drop_entries(ctx, live));
    }

    entries
}

/// Entries for a brand-new table: the bare CREATE TABLE plus one entry per
/// dependent object.
fn create_entries(table: &TableInfo) -> Vec<ChangeEntry> {
    let name = &table.name;
    let mut entries = vec![ChangeEntry::table_scoped(
        name,
        ChangeKind::CreateTable,
        vec![pg::create_table(table)],
        vec![pg::drop_table(name)],
    )];

    if let Some(pk) = &table.primary_key {
        entries.push(constraints::create_entry(ObjectKind::PrimaryKey, name, pk));
    }
    for def in table.unique.values() {
        entries.push(constraints::create_entry(ObjectKind::Unique, name, def));
    }
    for def in table.foreign_keys.values() {
        entries.push(constraints::create_entry(ObjectKind::ForeignKey, name, def));
    }
    for def in table.checks.values() {
        entries.push(constraints::create_entry(ObjectKind::Check, name, def));
    }
    for def in table.indexes.values() {
        entries.push(indexes::create_entry(name, def));
    }
    for def in table.triggers.values() {
        entries.push(triggers::create_entry(name, def));
    }

    entries
}

/// Entries for a dropped table: tool-owned dependents first (their priority
/// runs them before the DROP TABLE, and their `down` statements rebuild
/// them after the table `down` recreated it), then the table itself.
fn drop_entries(ctx: DiffContext<'_>, table: &TableInfo) -> Vec<ChangeEntry> {
    let name = &table.name;
    let mut entries = Vec::new();

    for def in table.triggers.values() {
        if def.is_tool_owned(ObjectKind::Trigger, ctx.tag) {
            entries.push(triggers::drop_entry(name, name, &[], def));
        }
    }
    for def in table.indexes.values() {
        if def.is_tool_owned(ObjectKind::Index, ctx.tag) {
            entries.push(indexes::drop_entry(name, name, &[], def));
        }
    }
    if let Some(pk) = &table.primary_key {
        if pk.is_tool_owned(ObjectKind::PrimaryKey, ctx.tag) {
            entries.push(constraints::drop_entry(
                ObjectKind::PrimaryKey,
                name,
                name,
                &[],
                pk,
            ));
        }
    }
    for (kind, defs) in [
        (ObjectKind::Unique, &table.unique),
        (ObjectKind::ForeignKey, &table.foreign_keys),
        (ObjectKind::Check, &table.checks),
    ] {
        for def in defs.values() {
            if def.is_tool_owned(kind, ctx.tag) {
                entries.push(constraints::drop_entry(kind, name, name, &[], def));
            }
        }
    }

    entries.push(ChangeEntry::table_scoped(
        name,
        ChangeKind::DropTable,
        vec![pg::drop_table(name)],
        vec![pg::create_table(table)],
    ));

    entries
}
