//! Canonical naming for generated database objects.
//!
//! Every tool-managed index, constraint and trigger gets a name derived from
//! a content hash of its canonical definition. The name doubles as the
//! change-detection key: identical definitions on the same table always
//! yield the same name, changed definitions always yield a different one.
//! The hash is also embedded as a database comment so that introspection can
//! recognize a semantically-equal definition even when the catalog phrases
//! it differently.

/// Default ownership tag used in generated names.
pub const DEFAULT_TAG: &str = "tm";

/// Width of the embedded definition hash, in hex characters.
///
/// 16 hex chars = 64 bits. For n generated objects the collision
/// probability is about n^2 / 2^65, negligible for realistic schemas.
pub const HASH_WIDTH: usize = 16;

/// Kinds of generated database objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Primary key constraint.
    PrimaryKey,
    /// Unique constraint.
    Unique,
    /// Foreign key constraint.
    ForeignKey,
    /// Check constraint.
    Check,
    /// Index.
    Index,
    /// Trigger.
    Trigger,
}

impl ObjectKind {
    /// Returns the name suffix for this kind.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::PrimaryKey => "pk",
            Self::Unique => "key",
            Self::ForeignKey => "fk",
            Self::Check => "chk",
            Self::Index => "idx",
            Self::Trigger => "trg",
        }
    }

    /// All constraint kinds (everything that lives in `pg_constraint`).
    #[must_use]
    pub fn is_constraint(self) -> bool {
        matches!(
            self,
            Self::PrimaryKey | Self::Unique | Self::ForeignKey | Self::Check
        )
    }
}

/// Computes the content hash of a canonical definition string.
///
/// Deterministic: equal inputs always hash equally, across runs and
/// processes.
#[must_use]
pub fn definition_hash(canonical: &str) -> String {
    let digest = blake3::hash(canonical.as_bytes());
    digest.to_hex().as_str()[..HASH_WIDTH].to_string()
}

/// Derives the generated name for an object from its owning table, kind,
/// canonical definition and ownership tag.
///
/// Pure function of its inputs: no shared state, safe to call concurrently
/// or repeatedly.
#[must_use]
pub fn generated_name(table: &str, kind: ObjectKind, canonical: &str, tag: &str) -> String {
    format!(
        "{}_{}_{}_{}",
        table,
        definition_hash(canonical),
        tag,
        kind.suffix()
    )
}

/// Derives the stable name for a trigger from its declared key.
///
/// Trigger names do not embed the definition hash: triggers replace in
/// place (`CREATE OR REPLACE TRIGGER`), so a body change must keep the
/// name while the embedded comment hash changes.
#[must_use]
pub fn trigger_name(table: &str, key: &str, tag: &str) -> String {
    format!("{table}_{key}_{tag}_trg")
}

/// Returns true if `name` carries the ownership tail for `kind` under the
/// given tag.
///
/// Objects without the tail are externally managed: recognized but never
/// diffed or mutated.
#[must_use]
pub fn is_tool_owned(name: &str, kind: ObjectKind, tag: &str) -> bool {
    name.ends_with(&format!("_{}_{}", tag, kind.suffix()))
}

/// Rewrites the table component of a generated name after a table rename.
///
/// The hash, tag and suffix are preserved; only the leading table part
/// changes.
#[must_use]
pub fn retarget_name(name: &str, old_table: &str, new_table: &str) -> String {
    name.strip_prefix(&format!("{old_table}_"))
        .map_or_else(|| name.to_string(), |rest| format!("{new_table}_{rest}"))
}
