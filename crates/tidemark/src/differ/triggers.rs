//! Trigger differ.
//!
//! Trigger names are key-stable (`{table}_{key}_{tag}_trg`), so matching is
//! by name and change detection is by the comment-embedded content hash. A
//! body change replaces the trigger in place with `CREATE OR REPLACE`; only
//! a table rename moves the name, via `RenameTrigger`.

use std::collections::BTreeSet;

use crate::changeset::{ChangeEntry, ChangeKind};
use crate::naming::{self, ObjectKind};
use crate::pg;
use crate::rename::RenamePair;
use crate::snapshot::{NamedDefinition, TableInfo};

use super::{apply_renames, pre_rename_hash, DiffContext};

/// Diffs the triggers of one table present in both snapshots.
pub(crate) fn diff(
    ctx: DiffContext<'_>,
    declared: &TableInfo,
    live: &TableInfo,
) -> Vec<ChangeEntry> {
    let table = &declared.name;
    let pairs = ctx.renames.columns_for(table);
    let mut entries = Vec::new();

    let live_defs: Vec<&NamedDefinition> = live
        .triggers
        .values()
        .filter(|d| d.is_tool_owned(ObjectKind::Trigger, ctx.tag))
        .collect();
    let mut consumed: BTreeSet<&str> = BTreeSet::new();

    for d in declared.triggers.values() {
        // Same name: the trigger survived, replace the body if it changed.
        if let Some(i) = live_defs.iter().find(|i| i.name == d.name) {
            consumed.insert(&i.name);
            if i.hash != d.hash {
                entries.push(replace_entry(table, &live.name, pairs, i, d));
            }
            continue;
        }

        // Table rename moves the name prefix; the key part is stable.
        if let Some(i) = live_defs.iter().find(|i| {
            naming::retarget_name(&i.name, &live.name, table) == d.name
                && !consumed.contains(i.name.as_str())
        }) {
            consumed.insert(&i.name);
            entries.push(rename_entry(table, i, d));
            let pre = pre_rename_hash(&d.definition, table, &live.name, pairs);
            if i.hash != pre {
                entries.push(replace_entry(table, &live.name, pairs, i, d));
            }
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

/// Entry that creates one trigger and stamps its content hash.
pub(crate) fn create_entry(table: &str, def: &NamedDefinition) -> ChangeEntry {
    ChangeEntry::table_scoped(
        table,
        ChangeKind::CreateTrigger,
        vec![
            pg::create_trigger(&def.name, &def.definition, false),
            pg::comment_hash(ObjectKind::Trigger, table, &def.name, &def.hash),
        ],
        vec![pg::drop_trigger(&def.name, table)],
    )
}

/// Entry that drops one trigger; the `down` recreates it with post-rename
/// identifiers.
pub(crate) fn drop_entry(
    table_now: &str,
    original_table: &str,
    pairs: &[RenamePair],
    def: &NamedDefinition,
) -> ChangeEntry {
    let restored = apply_renames(&def.definition, original_table, table_now, pairs);
    let name = naming::retarget_name(&def.name, original_table, table_now);
    ChangeEntry::table_scoped(
        table_now,
        ChangeKind::DropTrigger,
        vec![pg::drop_trigger(&name, table_now)],
        vec![
            pg::create_trigger(&name, &restored, false),
            pg::comment_hash(ObjectKind::Trigger, table_now, &name, &def.hash),
        ],
    )
}

/// Entry that replaces a trigger body in place under its existing name.
fn replace_entry(
    table: &str,
    original_table: &str,
    pairs: &[RenamePair],
    live: &NamedDefinition,
    declared: &NamedDefinition,
) -> ChangeEntry {
    let restored = apply_renames(&live.definition, original_table, table, pairs);
    ChangeEntry::table_scoped(
        table,
        ChangeKind::ChangeTrigger,
        vec![
            pg::create_trigger(&declared.name, &declared.definition, true),
            pg::comment_hash(ObjectKind::Trigger, table, &declared.name, &declared.hash),
        ],
        vec![
            pg::create_trigger(&declared.name, &restored, true),
            pg::comment_hash(ObjectKind::Trigger, table, &declared.name, &live.hash),
        ],
    )
}

fn rename_entry(table: &str, live: &NamedDefinition, declared: &NamedDefinition) -> ChangeEntry {
    ChangeEntry::table_scoped(
        table,
        ChangeKind::RenameTrigger,
        vec![pg::rename_trigger(table, &live.name, &declared.name)],
        vec![pg::rename_trigger(table, &declared.name, &live.name)],
    )
}
