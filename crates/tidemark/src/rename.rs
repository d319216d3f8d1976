//! Rename resolution.
//!
//! A column present only in the introspected snapshot and a column present
//! only in the declared snapshot may be the same logical column under a new
//! name, or an unrelated drop/add pair. Structural comparison alone cannot
//! tell them apart, so resolution is an explicit dependency with three
//! inputs, in priority order: `rename_from` hints authored in the declared
//! schema, pairs recorded in the journal by an earlier generation pass, and
//! finally an interactive [`RenamePrompt`]. When no prompt is available the
//! safe default is "not a rename" (drop + add); a rename is never guessed.
//!
//! The resolved [`RenameMap`] feeds every differ so that objects depending
//! on a renamed column are re-evaluated as if the rename had already been
//! applied, instead of being spuriously dropped and recreated.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::casing::CasingConfig;
use crate::error::{PlanError, Result};
use crate::snapshot::SchemaSnapshot;

/// A single from/to physical-name pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePair {
    /// Name in the introspected snapshot.
    pub from: String,
    /// Name in the declared snapshot.
    pub to: String,
}

impl RenamePair {
    /// Creates a new pair.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Resolved renames for one diff run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    /// Table renames.
    pub tables: Vec<RenamePair>,
    /// Column renames, keyed by declared (new) table name.
    pub columns: BTreeMap<String, Vec<RenamePair>>,
}

impl RenameMap {
    /// Returns true when nothing was renamed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.values().all(Vec::is_empty)
    }

    /// Maps an introspected table name to its declared name.
    #[must_use]
    pub fn table_target(&self, from: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|p| p.from == from)
            .map(|p| p.to.as_str())
    }

    /// Maps a declared table name back to its introspected name.
    #[must_use]
    pub fn table_source(&self, to: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|p| p.to == to)
            .map(|p| p.from.as_str())
    }

    /// Column rename pairs for a table (declared name).
    #[must_use]
    pub fn columns_for(&self, table: &str) -> &[RenamePair] {
        self.columns.get(table).map_or(&[], Vec::as_slice)
    }

    /// Maps an introspected column name to its declared name within a table.
    #[must_use]
    pub fn column_target(&self, table: &str, from: &str) -> Option<&str> {
        self.columns_for(table)
            .iter()
            .find(|p| p.from == from)
            .map(|p| p.to.as_str())
    }

    fn add_column(&mut self, table: &str, pair: RenamePair) {
        self.columns.entry(table.to_string()).or_default().push(pair);
    }
}

/// Callback boundary for interactive rename resolution.
///
/// Receives the table and the columns still in doubt; returns the pairs the
/// user confirmed as renames. Anything not returned is treated as drop+add.
pub trait RenamePrompt {
    /// Resolves column identity for one table.
    fn resolve_columns(
        &mut self,
        table: &str,
        dropped: &[String],
        added: &[String],
    ) -> Result<Vec<RenamePair>>;
}

/// Non-interactive prompt: resolves nothing, every doubt becomes drop+add.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl RenamePrompt for NoPrompt {
    fn resolve_columns(
        &mut self,
        _table: &str,
        _dropped: &[String],
        _added: &[String],
    ) -> Result<Vec<RenamePair>> {
        Ok(Vec::new())
    }
}

/// Renames resolved in earlier generation passes.
///
/// Persisted as JSON next to the migration output so that regenerating a
/// changeset after a rename was already confirmed never re-prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameJournal {
    /// Recorded table renames.
    pub tables: Vec<RenamePair>,
    /// Recorded column renames, keyed by declared table name.
    pub columns: BTreeMap<String, Vec<RenamePair>>,
}

impl RenameJournal {
    /// Loads a journal from disk; a missing file is an empty journal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| PlanError::JournalRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Writes the journal to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    fn recorded_column(&self, table: &str, from: &str, to: &str) -> bool {
        self.columns
            .get(table)
            .is_some_and(|pairs| pairs.iter().any(|p| p.from == from && p.to == to))
    }

    fn record_column(&mut self, table: &str, pair: &RenamePair) {
        let pairs = self.columns.entry(table.to_string()).or_default();
        if !pairs.contains(pair) {
            pairs.push(pair.clone());
        }
    }

    fn record_table(&mut self, pair: &RenamePair) {
        if !self.tables.contains(pair) {
            self.tables.push(pair.clone());
        }
    }
}

/// Resolves table and column identity between two snapshots.
///
/// Newly confirmed pairs are recorded into `journal`; a failed or aborted
/// prompt aborts the whole resolution, leaving no partial map behind. The
/// casing configuration translates names for the prompt only; everything
/// recorded and returned is physical.
pub fn resolve(
    declared: &SchemaSnapshot,
    introspected: &SchemaSnapshot,
    casing: &CasingConfig,
    journal: &mut RenameJournal,
    prompt: &mut dyn RenamePrompt,
) -> Result<RenameMap> {
    let mut map = RenameMap::default();

    resolve_tables(declared, introspected, journal, &mut map);

    for (table_name, declared_table) in &declared.tables {
        let introspected_name = map
            .table_source(table_name)
            .unwrap_or(table_name.as_str())
            .to_string();
        let Some(introspected_table) = introspected.get_table(&introspected_name) else {
            continue;
        };

        let mut dropped: Vec<String> = introspected_table
            .columns
            .keys()
            .filter(|c| !declared_table.columns.contains_key(*c))
            .cloned()
            .collect();
        let mut added: Vec<String> = declared_table
            .columns
            .keys()
            .filter(|c| !introspected_table.columns.contains_key(*c))
            .cloned()
            .collect();

        // 1. Explicit rename_from hints.
        for column in declared_table.columns.values() {
            let Some(from) = column.rename_from.as_deref() else {
                continue;
            };
            if !added.contains(&column.name) {
                // Rename already applied in an earlier run; the hint is stale.
                continue;
            }
            if !dropped.contains(&from.to_string()) {
                return Err(PlanError::AmbiguousRename {
                    table: table_name.clone(),
                    message: format!(
                        "column '{}' declares rename_from '{}' which is not present in the database",
                        column.name, from
                    ),
                });
            }
            let pair = RenamePair::new(from, &column.name);
            take_pair(&mut dropped, &mut added, &pair);
            journal.record_column(table_name, &pair);
            map.add_column(table_name, pair);
        }

        // 2. Pairs confirmed in an earlier pass. Re-checked one by one: a
        // journal carried across runs may record several targets for the
        // same source, and a source consumed by one pair must not feed a
        // second (the map would otherwise rename one column twice).
        let recorded: Vec<RenamePair> = dropped
            .iter()
            .flat_map(|from| {
                added
                    .iter()
                    .filter(|to| journal.recorded_column(table_name, from, to))
                    .map(|to| RenamePair::new(from, to))
                    .collect::<Vec<_>>()
            })
            .collect();
        for pair in recorded {
            if !dropped.contains(&pair.from) || !added.contains(&pair.to) {
                continue;
            }
            take_pair(&mut dropped, &mut added, &pair);
            map.add_column(table_name, pair);
        }

        // 3. Interactive resolution for whatever is still in doubt. The
        // prompt speaks logical names; the map stores physical ones.
        if !dropped.is_empty() && !added.is_empty() {
            let logical_dropped: Vec<String> =
                dropped.iter().map(|c| casing.to_logical(c)).collect();
            let logical_added: Vec<String> = added.iter().map(|c| casing.to_logical(c)).collect();
            let resolved = prompt.resolve_columns(
                &casing.to_logical(table_name),
                &logical_dropped,
                &logical_added,
            )?;
            for pair in resolved {
                let pair = RenamePair::new(
                    casing.to_physical(&pair.from),
                    casing.to_physical(&pair.to),
                );
                if !dropped.contains(&pair.from) || !added.contains(&pair.to) {
                    return Err(PlanError::AmbiguousRename {
                        table: table_name.clone(),
                        message: format!(
                            "resolution '{}' -> '{}' does not match the columns in doubt",
                            pair.from, pair.to
                        ),
                    });
                }
                take_pair(&mut dropped, &mut added, &pair);
                journal.record_column(table_name, &pair);
                map.add_column(table_name, pair);
            }
        }
    }

    Ok(map)
}

fn resolve_tables(
    declared: &SchemaSnapshot,
    introspected: &SchemaSnapshot,
    journal: &mut RenameJournal,
    map: &mut RenameMap,
) {
    for (name, table) in &declared.tables {
        if introspected.tables.contains_key(name) {
            continue;
        }
        let hinted = table.rename_from.clone();
        let journaled = journal
            .tables
            .iter()
            .find(|p| p.to == *name)
            .map(|p| p.from.clone());
        let Some(from) = hinted.or(journaled) else {
            continue;
        };
        // The old name must still exist in the database and must not also
        // be declared; otherwise the rename already happened.
        if introspected.tables.contains_key(&from) && !declared.tables.contains_key(&from) {
            let pair = RenamePair::new(&from, name);
            journal.record_table(&pair);
            map.tables.push(pair);
        }
    }
}

fn take_pair(dropped: &mut Vec<String>, added: &mut Vec<String>, pair: &RenamePair) {
    dropped.retain(|c| *c != pair.from);
    added.retain(|c| *c != pair.to);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ColumnDraft, SnapshotBuilder, TableDraft};

    fn snapshot(table: TableDraft) -> SchemaSnapshot {
        SnapshotBuilder::new().table(table).build().unwrap()
    }

    fn books(columns: &[&str]) -> SchemaSnapshot {
        let mut draft = TableDraft::new("books");
        for c in columns {
            draft = draft.column(ColumnDraft::new(*c, "text"));
        }
        snapshot(draft)
    }

    struct FixedPrompt(Vec<RenamePair>);

    impl RenamePrompt for FixedPrompt {
        fn resolve_columns(
            &mut self,
            _table: &str,
            _dropped: &[String],
            _added: &[String],
        ) -> Result<Vec<RenamePair>> {
            Ok(self.0.clone())
        }
    }

    struct PanicPrompt;

    impl RenamePrompt for PanicPrompt {
        fn resolve_columns(
            &mut self,
            table: &str,
            _dropped: &[String],
            _added: &[String],
        ) -> Result<Vec<RenamePair>> {
            panic!("prompt should not be invoked for table '{table}'");
        }
    }

    #[test]
    fn test_hint_resolves_without_prompt() {
        let declared = snapshot(
            TableDraft::new("books")
                .column(ColumnDraft::new("book_id", "integer").rename_from("id")),
        );
        let introspected = books(&["id"]);

        let mut journal = RenameJournal::default();
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut PanicPrompt,
        ).unwrap();
        assert_eq!(
            map.columns_for("books"),
            &[RenamePair::new("id", "book_id")]
        );
    }

    #[test]
    fn test_stale_hint_is_ignored() {
        // Rename already applied: both snapshots have book_id.
        let declared = snapshot(
            TableDraft::new("books")
                .column(ColumnDraft::new("book_id", "integer").rename_from("id")),
        );
        let introspected = books(&["book_id"]);

        let mut journal = RenameJournal::default();
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut PanicPrompt,
        ).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_hint_to_unknown_column_is_ambiguous() {
        let declared = snapshot(
            TableDraft::new("books")
                .column(ColumnDraft::new("book_id", "integer").rename_from("missing")),
        );
        let introspected = books(&["id"]);

        let mut journal = RenameJournal::default();
        let result = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut NoPrompt,
        );
        assert!(matches!(result, Err(PlanError::AmbiguousRename { .. })));
    }

    #[test]
    fn test_journal_prevents_reprompt() {
        let declared = books(&["book_id"]);
        let introspected = books(&["id"]);

        let mut journal = RenameJournal::default();
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut FixedPrompt(vec![RenamePair::new("id", "book_id")]),
        )
        .unwrap();
        assert_eq!(map.columns_for("books").len(), 1);

        // Second pass: the journal answers, the prompt must not fire.
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut PanicPrompt,
        ).unwrap();
        assert_eq!(
            map.columns_for("books"),
            &[RenamePair::new("id", "book_id")]
        );
    }

    #[test]
    fn test_invalid_prompt_answer_is_ambiguous() {
        let declared = books(&["book_id"]);
        let introspected = books(&["id"]);

        let mut journal = RenameJournal::default();
        let result = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut FixedPrompt(vec![RenamePair::new("nope", "book_id")]),
        );
        assert!(matches!(result, Err(PlanError::AmbiguousRename { .. })));
    }

    #[test]
    fn test_no_prompt_defaults_to_drop_add() {
        let declared = books(&["book_id"]);
        let introspected = books(&["id"]);

        let mut journal = RenameJournal::default();
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut NoPrompt,
        ).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_table_rename_hint() {
        let declared = snapshot(
            TableDraft::new("publications")
                .rename_from("books")
                .column(ColumnDraft::new("id", "integer")),
        );
        let introspected = books(&["id"]);

        let mut journal = RenameJournal::default();
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut PanicPrompt,
        ).unwrap();
        assert_eq!(map.table_target("books"), Some("publications"));
        assert_eq!(map.table_source("publications"), Some("books"));
    }

    #[test]
    fn test_journal_with_two_targets_consumes_source_once() {
        // A journal carried across runs can record several targets for one
        // source column. Only the first recorded pair may apply; a source
        // must never feed two renames in the same map.
        let declared = books(&["author", "author_name"]);
        let introspected = books(&["writer"]);

        let mut journal = RenameJournal::default();
        journal.record_column("books", &RenamePair::new("writer", "author"));
        journal.record_column("books", &RenamePair::new("writer", "author_name"));

        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::disabled(),
            &mut journal,
            &mut NoPrompt,
        )
        .unwrap();
        assert_eq!(
            map.columns_for("books"),
            &[RenamePair::new("writer", "author")]
        );
    }

    #[test]
    fn test_prompt_speaks_logical_names() {
        use crate::casing::CaseRule;

        struct EchoPrompt {
            seen: Vec<(String, Vec<String>, Vec<String>)>,
            answer: Vec<RenamePair>,
        }

        impl RenamePrompt for EchoPrompt {
            fn resolve_columns(
                &mut self,
                table: &str,
                dropped: &[String],
                added: &[String],
            ) -> Result<Vec<RenamePair>> {
                self.seen
                    .push((table.to_string(), dropped.to_vec(), added.to_vec()));
                Ok(self.answer.clone())
            }
        }

        let declared = snapshot(
            TableDraft::new("user_accounts").column(ColumnDraft::new("full_name", "text")),
        );
        let introspected = snapshot(
            TableDraft::new("user_accounts").column(ColumnDraft::new("display_name", "text")),
        );

        let mut journal = RenameJournal::default();
        let mut prompt = EchoPrompt {
            seen: Vec::new(),
            answer: vec![RenamePair::new("displayName", "fullName")],
        };
        let map = resolve(
            &declared,
            &introspected,
            &CasingConfig::enabled(CaseRule::Snake),
            &mut journal,
            &mut prompt,
        )
        .unwrap();

        // The prompt saw logical names; the map and journal hold physical.
        assert_eq!(
            prompt.seen,
            vec![(
                "userAccounts".to_string(),
                vec!["displayName".to_string()],
                vec!["fullName".to_string()],
            )]
        );
        assert_eq!(
            map.columns_for("user_accounts"),
            &[RenamePair::new("display_name", "full_name")]
        );
        assert!(journal.recorded_column("user_accounts", "display_name", "full_name"));
    }

    #[test]
    fn test_journal_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renames.json");

        let mut journal = RenameJournal::default();
        journal.record_column("books", &RenamePair::new("id", "book_id"));
        journal.save(&path).unwrap();

        let loaded = RenameJournal::load(&path).unwrap();
        assert_eq!(loaded, journal);

        // A missing file is simply an empty journal.
        let missing = RenameJournal::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(missing, RenameJournal::default());
    }
}
