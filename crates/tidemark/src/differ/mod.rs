//! Entity differs.
//!
//! One differ per entity kind, each comparing the declared and introspected
//! snapshots and emitting raw [`ChangeEntry`] values. All differs receive
//! the resolved rename map so that a renamed column or table is treated as
//! continuous identity rather than a drop/add pair.

pub mod columns;
pub mod constraints;
pub mod indexes;
pub mod tables;
pub mod triggers;
pub mod types;

use crate::changeset::ChangeEntry;
use crate::error::Result;
use crate::naming;
use crate::pg;
use crate::rename::{RenameMap, RenamePair};
use crate::snapshot::SchemaSnapshot;

/// Shared input to every differ.
#[derive(Debug, Clone, Copy)]
pub struct DiffContext<'a> {
    /// The declared (target) snapshot.
    pub declared: &'a SchemaSnapshot,
    /// The introspected (current) snapshot.
    pub introspected: &'a SchemaSnapshot,
    /// Resolved renames.
    pub renames: &'a RenameMap,
    /// Ownership tag for generated names.
    pub tag: &'a str,
}

/// Runs every differ and concatenates the raw operations.
pub fn diff_all(ctx: DiffContext<'_>) -> Result<Vec<ChangeEntry>> {
    let mut entries = tables::diff(ctx);
    entries.extend(types::diff_enums(ctx)?);
    entries.extend(types::diff_extensions(ctx));
    Ok(entries)
}

/// Rewrites a declared canonical definition back to pre-rename identifiers.
///
/// Used to recognize "same content, renamed identifiers": the declared
/// definition with renames undone must hash to the value embedded on the
/// live object when nothing but names changed. Column references appear
/// both quoted (key lists) and bare (check expressions, partial-index
/// conditions), so both forms are rewritten.
pub(crate) fn unapply_renames(
    definition: &str,
    declared_table: &str,
    introspected_table: &str,
    columns: &[RenamePair],
) -> String {
    let mut out = definition.to_string();
    if declared_table != introspected_table {
        out = replace_identifier(&out, declared_table, introspected_table);
    }
    for pair in columns {
        out = replace_identifier(&out, &pair.to, &pair.from);
    }
    out
}

/// Rewrites an introspected definition forward through the rename map, for
/// use in `down` statements that must be valid after the renames applied.
pub(crate) fn apply_renames(
    definition: &str,
    introspected_table: &str,
    declared_table: &str,
    columns: &[RenamePair],
) -> String {
    let mut out = definition.to_string();
    if declared_table != introspected_table {
        out = replace_identifier(&out, introspected_table, declared_table);
    }
    for pair in columns {
        out = replace_identifier(&out, &pair.from, &pair.to);
    }
    out
}

/// Replaces every occurrence of an identifier, quoted or bare.
///
/// Bare occurrences are replaced only when delimited on both sides, so a
/// rename of `price` leaves `unit_price` and `prices` untouched.
fn replace_identifier(text: &str, from: &str, to: &str) -> String {
    let text = text.replace(&pg::quote_ident(from), &pg::quote_ident(to));

    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(pos) = rest.find(from) {
        let end = pos + from.len();
        let before = rest[..pos].chars().next_back().or_else(|| {
            // Start of `rest` may sit mid-word after a previous iteration.
            out.chars().next_back()
        });
        let after = rest[end..].chars().next();
        let bounded = before.is_none_or(|c| !is_ident_char(c))
            && after.is_none_or(|c| !is_ident_char(c));

        out.push_str(&rest[..pos]);
        out.push_str(if bounded { to } else { from });
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '"'
}

/// Hash of a declared definition as it would have read before the renames.
pub(crate) fn pre_rename_hash(
    definition: &str,
    declared_table: &str,
    introspected_table: &str,
    columns: &[RenamePair],
) -> String {
    naming::definition_hash(&unapply_renames(
        definition,
        declared_table,
        introspected_table,
        columns,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_identifier_quoted_and_bare() {
        assert_eq!(
            replace_identifier("CHECK (price > 0)", "price", "cost"),
            "CHECK (cost > 0)"
        );
        assert_eq!(
            replace_identifier("UNIQUE NULLS DISTINCT (\"price\")", "price", "cost"),
            "UNIQUE NULLS DISTINCT (\"cost\")"
        );
    }

    #[test]
    fn test_replace_identifier_respects_word_boundaries() {
        assert_eq!(
            replace_identifier("CHECK (unit_price > price OR prices > 0)", "price", "cost"),
            "CHECK (unit_price > cost OR prices > 0)"
        );
    }

    #[test]
    fn test_unapply_renames_matches_live_check_hash() {
        let pairs = vec![RenamePair::new("price", "cost")];
        let undone = unapply_renames("CHECK (cost > 0)", "books", "books", &pairs);
        assert_eq!(undone, "CHECK (price > 0)");
        assert_eq!(
            pre_rename_hash("CHECK (cost > 0)", "books", "books", &pairs),
            naming::definition_hash("CHECK (price > 0)")
        );
    }

    #[test]
    fn test_apply_renames_covers_partial_index_condition() {
        let pairs = vec![RenamePair::new("price", "cost")];
        let forward = apply_renames(
            "CREATE INDEX ON \"books\" (\"price\") WHERE price > 0",
            "books",
            "books",
            &pairs,
        );
        assert_eq!(forward, "CREATE INDEX ON \"books\" (\"cost\") WHERE cost > 0");
    }
}
