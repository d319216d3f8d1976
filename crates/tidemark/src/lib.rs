//! Declarative schema migration planning for PostgreSQL.
//!
//! `tidemark` compares a schema declared in code against a snapshot
//! introspected from a live database and produces a minimal, ordered,
//! reversible changeset of DDL statements, where:
//! - Generated object names embed a content hash, so an unchanged
//!   definition is always recognized and never churned
//! - Renamed tables and columns are resolved explicitly (hints, a
//!   persisted journal, or an interactive prompt) and carry their
//!   dependent indexes and constraints across as renames
//! - Every entry records its own structural inverse, so a changeset can
//!   be rolled back statement by statement
//!
//! # Architecture
//!
//! - **Snapshot** - The shared schema representation, declared or
//!   introspected ([`snapshot`])
//! - **Naming** - Content-hash names and the ownership tag ([`naming`])
//! - **Rename** - Table/column identity resolution ([`rename`])
//! - **Differ** - One differ per entity kind ([`differ`])
//! - **Changeset** - Priority-ordered, reversible entries ([`changeset`])
//! - **Introspect** - Live-catalog snapshot builder ([`introspect`])
//! - **Apply** - Sequential statement execution ([`apply`])
//!
//! # Example
//!
//! ```rust
//! use tidemark::prelude::*;
//!
//! let declared = SnapshotBuilder::new()
//!     .table(
//!         TableDraft::new("books")
//!             .column(ColumnDraft::new("id", "integer").primary_key())
//!             .column(ColumnDraft::new("title", "text").not_null()),
//!     )
//!     .build()?;
//!
//! let introspected = SchemaSnapshot::new();
//! let changeset = Planner::new(PlanOptions::default())
//!     .plan(&declared, &introspected, &mut NoPrompt)?;
//!
//! assert!(changeset.up_statements()[0].starts_with("CREATE TABLE"));
//! # Ok::<(), tidemark::PlanError>(())
//! ```

pub mod apply;
pub mod casing;
pub mod changeset;
pub mod differ;
pub mod error;
pub mod introspect;
pub mod naming;
pub mod pg;
pub mod rename;
pub mod snapshot;

use std::path::PathBuf;

use tracing::debug;

pub use crate::changeset::Changeset;
pub use crate::error::{PlanError, Result};

use crate::casing::CasingConfig;
use crate::changeset::{ChangeEntry, ChangeKind};
use crate::differ::DiffContext;
use crate::rename::{RenameJournal, RenamePrompt};
use crate::snapshot::SchemaSnapshot;

/// Commonly used types for planning a migration.
pub mod prelude {
    pub use crate::casing::{CaseRule, CasingConfig};
    pub use crate::changeset::{ChangeEntry, ChangeKind, Changeset};
    pub use crate::error::{PlanError, Result};
    pub use crate::rename::{NoPrompt, RenamePair, RenamePrompt};
    pub use crate::snapshot::{
        ColumnDraft, IdentityMode, IndexDraft, ReferentialAction, SchemaSnapshot, SnapshotBuilder,
        TableDraft, TriggerDraft, UniquenessMode,
    };
    pub use crate::{PlanOptions, Planner};
}

/// Options for one planning run.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Ownership tag embedded in generated names.
    pub tag: String,
    /// Path of the rename journal; `None` disables persistence.
    pub journal_path: Option<PathBuf>,
    /// Schema to create when planning against an empty database.
    pub schema_name: Option<String>,
    /// Logical/physical casing translation, used for prompt display.
    pub casing: CasingConfig,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            tag: naming::DEFAULT_TAG.to_string(),
            journal_path: None,
            schema_name: None,
            casing: CasingConfig::disabled(),
        }
    }
}

/// Plans changesets from snapshot pairs.
#[derive(Debug, Clone)]
pub struct Planner {
    options: PlanOptions,
}

impl Planner {
    /// Creates a planner with the given options.
    #[must_use]
    pub fn new(options: PlanOptions) -> Self {
        Self { options }
    }

    /// Diffs the declared snapshot against the introspected one.
    ///
    /// Synchronous and side-effect free apart from the prompt callback and
    /// the rename journal; any failure aborts with no partial changeset.
    pub fn plan(
        &self,
        declared: &SchemaSnapshot,
        introspected: &SchemaSnapshot,
        prompt: &mut dyn RenamePrompt,
    ) -> Result<Changeset> {
        declared.validate()?;
        introspected.validate()?;

        let mut journal = match &self.options.journal_path {
            Some(path) => RenameJournal::load(path)?,
            None => RenameJournal::default(),
        };
        let renames = rename::resolve(
            declared,
            introspected,
            &self.options.casing,
            &mut journal,
            prompt,
        )?;
        if let Some(path) = &self.options.journal_path {
            journal.save(path)?;
        }

        let ctx = DiffContext {
            declared,
            introspected,
            renames: &renames,
            tag: &self.options.tag,
        };
        let mut entries = differ::diff_all(ctx)?;

        // A configured schema is created only on a completely empty target;
        // the IF NOT EXISTS phrasing keeps re-planning idempotent anyway.
        if let Some(schema) = &self.options.schema_name {
            if is_empty_snapshot(introspected) && !entries.is_empty() {
                entries.push(ChangeEntry::schema_scoped(
                    ChangeKind::CreateSchema,
                    vec![pg::create_schema(schema)],
                    vec![pg::drop_schema(schema)],
                ));
            }
        }

        let changeset = changeset::assemble(entries);
        debug!(
            entries = changeset.entries.len(),
            renames = !renames.is_empty(),
            "assembled changeset"
        );
        Ok(changeset)
    }
}

fn is_empty_snapshot(snapshot: &SchemaSnapshot) -> bool {
    snapshot.tables.is_empty() && snapshot.enums.is_empty() && snapshot.extensions.is_empty()
}
