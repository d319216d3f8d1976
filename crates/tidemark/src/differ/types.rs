//! Enum type and extension differs.
//!
//! Enum changes are restricted to order-preserving member additions, which
//! is all `ALTER TYPE ... ADD VALUE` can express; a removal or reorder
//! aborts the plan with [`PlanError::UnsupportedEnumChange`] instead of
//! emitting a destructive rewrite.

use crate::changeset::{ChangeEntry, ChangeKind};
use crate::error::{PlanError, Result};
use crate::pg;

use super::DiffContext;

/// Diffs enum types between the two snapshots.
pub(crate) fn diff_enums(ctx: DiffContext<'_>) -> Result<Vec<ChangeEntry>> {
    let mut entries = Vec::new();

    for (name, declared) in &ctx.declared.enums {
        match ctx.introspected.enums.get(name) {
            None => entries.push(ChangeEntry::schema_scoped(
                ChangeKind::CreateEnum,
                vec![pg::create_enum(name, &declared.members)],
                vec![pg::drop_enum(name)],
            )),
            Some(live) => {
                if live.members == declared.members {
                    continue;
                }
                let up: Vec<String> = member_additions(name, &declared.members, &live.members)?
                    .into_iter()
                    .map(|(member, before)| pg::add_enum_value(name, &member, before.as_deref()))
                    .collect();
                // ADD VALUE has no inverse; the rollback rebuilds the type
                // with its previous members.
                entries.push(ChangeEntry::schema_scoped(
                    ChangeKind::ChangeEnum,
                    up,
                    vec![pg::drop_enum(name), pg::create_enum(name, &live.members)],
                ));
            }
        }
    }

    for (name, live) in &ctx.introspected.enums {
        if !ctx.declared.enums.contains_key(name) {
            entries.push(ChangeEntry::schema_scoped(
                ChangeKind::DropEnum,
                vec![pg::drop_enum(name)],
                vec![pg::create_enum(name, &live.members)],
            ));
        }
    }

    Ok(entries)
}

/// Diffs extensions between the two snapshots.
pub(crate) fn diff_extensions(ctx: DiffContext<'_>) -> Vec<ChangeEntry> {
    let mut entries = Vec::new();

    for name in ctx.declared.extensions.keys() {
        if !ctx.introspected.extensions.contains_key(name) {
            entries.push(ChangeEntry::schema_scoped(
                ChangeKind::CreateExtension,
                vec![pg::create_extension(name)],
                vec![pg::drop_extension(name)],
            ));
        }
    }

    for name in ctx.introspected.extensions.keys() {
        if !ctx.declared.extensions.contains_key(name) {
            entries.push(ChangeEntry::schema_scoped(
                ChangeKind::DropExtension,
                vec![pg::drop_extension(name)],
                vec![pg::create_extension(name)],
            ));
        }
    }

    entries
}

/// Computes the member additions taking `old` to `new`.
///
/// `old` must be an order-preserving subsequence of `new`; each addition
/// carries the old member it must land before, or `None` for an append.
fn member_additions(
    name: &str,
    new: &[String],
    old: &[String],
) -> Result<Vec<(String, Option<String>)>> {
    let mut additions = Vec::new();
    let mut remaining = old.iter().peekable();

    for member in new {
        if remaining.peek().is_some_and(|next| *next == member) {
            remaining.next();
            continue;
        }
        if old.contains(member) {
            return Err(PlanError::UnsupportedEnumChange {
                type_name: name.to_string(),
                message: format!("member '{member}' was reordered"),
            });
        }
        additions.push((member.clone(), remaining.peek().map(|s| (*s).clone())));
    }

    if let Some(removed) = remaining.next() {
        return Err(PlanError::UnsupportedEnumChange {
            type_name: name.to_string(),
            message: format!("member '{removed}' was removed"),
        });
    }

    Ok(additions)
}
