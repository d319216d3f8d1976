//! Changeset entries and the assembler.
//!
//! Differs emit raw [`ChangeEntry`] values in whatever order they find
//! changes; the assembler merges them into one list and sorts by the
//! numeric priority on [`ChangeKind`], which encodes the dependency order
//! the database requires. Each entry carries its own inverse (`down`),
//! computed by the differ at emission time from the snapshot it had in
//! hand, so applying `up` then `down` for any single entry restores the
//! prior state exactly.

use serde::{Deserialize, Serialize};

/// Kind of schema change an entry performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Create a schema.
    CreateSchema,
    /// Create an extension.
    CreateExtension,
    /// Drop an extension.
    DropExtension,
    /// Create an enum type.
    CreateEnum,
    /// Add members to an enum type.
    ChangeEnum,
    /// Drop an enum type.
    DropEnum,
    /// Create a table.
    CreateTable,
    /// Drop a table.
    DropTable,
    /// Rename a table.
    ChangeTableName,
    /// Add a column.
    CreateColumn,
    /// Drop a column.
    DropColumn,
    /// Alter a column property (type, nullability, default or identity).
    ChangeColumn,
    /// Rename a column.
    ChangeColumnName,
    /// Create the primary key constraint.
    CreatePrimaryKey,
    /// Create a unique/foreign-key/check constraint.
    CreateConstraint,
    /// Drop a constraint.
    DropConstraint,
    /// Rename a constraint.
    RenameConstraint,
    /// Create an index.
    CreateIndex,
    /// Drop an index.
    DropIndex,
    /// Rename an index.
    RenameIndex,
    /// Create a trigger.
    CreateTrigger,
    /// Replace a trigger body in place.
    ChangeTrigger,
    /// Drop a trigger.
    DropTrigger,
    /// Rename a trigger.
    RenameTrigger,
}

impl ChangeKind {
    /// Execution priority; lower runs first.
    ///
    /// The order guarantees that a create never runs before the objects it
    /// depends on exist, and that drops of dependents (triggers, indexes,
    /// constraints) run before the structural drops they hang off.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::CreateSchema => 0,
            Self::CreateExtension => 1,
            Self::CreateEnum => 2,
            Self::ChangeEnum => 3,
            Self::CreateTable => 4,
            Self::ChangeTableName => 5,
            Self::CreateColumn => 6,
            Self::ChangeColumnName => 7,
            Self::ChangeColumn => 8,
            Self::DropTrigger => 9,
            Self::DropIndex => 10,
            Self::DropConstraint => 11,
            Self::DropColumn => 12,
            Self::DropTable => 13,
            Self::CreatePrimaryKey => 14,
            Self::CreateConstraint => 15,
            Self::CreateIndex => 16,
            // Trigger renames must land before in-place replaces: a replace
            // addresses the post-rename name, as column changes do.
            Self::RenameTrigger => 17,
            Self::CreateTrigger | Self::ChangeTrigger => 18,
            Self::RenameIndex => 19,
            Self::RenameConstraint => 20,
            Self::DropEnum => 21,
            Self::DropExtension => 22,
        }
    }
}

/// One ordered, reversible migration operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Table this entry touches; `None` for schema-wide operations
    /// (schemas, extensions, enum types).
    pub table: Option<String>,
    /// Operation kind.
    pub kind: ChangeKind,
    /// Execution priority, copied from the kind at construction.
    pub priority: u8,
    /// Forward statements, applied in order.
    pub up: Vec<String>,
    /// Inverse statements, the literal structural inverse of `up`.
    pub down: Vec<String>,
}

impl ChangeEntry {
    /// Creates a table-scoped entry.
    #[must_use]
    pub fn table_scoped(
        table: impl Into<String>,
        kind: ChangeKind,
        up: Vec<String>,
        down: Vec<String>,
    ) -> Self {
        Self {
            table: Some(table.into()),
            kind,
            priority: kind.priority(),
            up,
            down,
        }
    }

    /// Creates a schema-wide entry.
    #[must_use]
    pub fn schema_scoped(kind: ChangeKind, up: Vec<String>, down: Vec<String>) -> Self {
        Self {
            table: None,
            kind,
            priority: kind.priority(),
            up,
            down,
        }
    }
}

/// The final ordered, reversible changeset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Entries, sorted by priority (insertion order breaks ties).
    pub entries: Vec<ChangeEntry>,
}

impl Changeset {
    /// Returns true when the snapshots were already in agreement.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattens forward statements in execution order.
    #[must_use]
    pub fn up_statements(&self) -> Vec<&str> {
        self.entries
            .iter()
            .flat_map(|e| e.up.iter().map(String::as_str))
            .collect()
    }

    /// Flattens rollback statements: entries in reverse order, each entry's
    /// own `down` group in its listed order.
    #[must_use]
    pub fn down_statements(&self) -> Vec<&str> {
        self.entries
            .iter()
            .rev()
            .flat_map(|e| e.down.iter().map(String::as_str))
            .collect()
    }
}

/// Merges raw differ output into the final ordered changeset.
///
/// The sort is stable: entries with equal priority keep the order their
/// differ emitted them in, which is itself deterministic (snapshots iterate
/// in `BTreeMap` order).
#[must_use]
pub fn assemble(mut entries: Vec<ChangeEntry>) -> Changeset {
    entries.sort_by_key(|e| e.priority);
    Changeset { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: ChangeKind, up: &str) -> ChangeEntry {
        ChangeEntry::table_scoped("books", kind, vec![up.to_string()], vec![])
    }

    #[test]
    fn test_priority_orders_creates_before_dependents() {
        assert!(ChangeKind::CreateTable.priority() < ChangeKind::CreatePrimaryKey.priority());
        assert!(ChangeKind::CreatePrimaryKey.priority() < ChangeKind::CreateIndex.priority());
        assert!(ChangeKind::CreateEnum.priority() < ChangeKind::CreateTable.priority());
        assert!(ChangeKind::CreateExtension.priority() < ChangeKind::CreateEnum.priority());
    }

    #[test]
    fn test_priority_drops_dependents_first() {
        assert!(ChangeKind::DropIndex.priority() < ChangeKind::DropColumn.priority());
        assert!(ChangeKind::DropTrigger.priority() < ChangeKind::DropTable.priority());
        assert!(ChangeKind::DropConstraint.priority() < ChangeKind::DropTable.priority());
        assert!(ChangeKind::DropTable.priority() < ChangeKind::DropEnum.priority());
    }

    #[test]
    fn test_renames_run_before_column_changes() {
        assert!(ChangeKind::ChangeColumnName.priority() < ChangeKind::ChangeColumn.priority());
    }

    #[test]
    fn test_trigger_rename_runs_before_trigger_replace() {
        assert!(ChangeKind::RenameTrigger.priority() < ChangeKind::ChangeTrigger.priority());
        assert!(ChangeKind::ChangeTableName.priority() < ChangeKind::RenameTrigger.priority());
    }

    #[test]
    fn test_assemble_sorts_stably() {
        let changeset = assemble(vec![
            entry(ChangeKind::CreateIndex, "idx-a"),
            entry(ChangeKind::CreateTable, "tbl"),
            entry(ChangeKind::CreateIndex, "idx-b"),
        ]);

        let ups = changeset.up_statements();
        assert_eq!(ups, vec!["tbl", "idx-a", "idx-b"]);
    }

    #[test]
    fn test_down_statements_reverse_entry_order() {
        let mut a = entry(ChangeKind::CreateTable, "create");
        a.down = vec!["drop".to_string()];
        let mut b = entry(ChangeKind::CreateIndex, "index");
        b.down = vec!["drop index".to_string()];

        let changeset = assemble(vec![a, b]);
        assert_eq!(changeset.down_statements(), vec!["drop index", "drop"]);
    }
}
