//! Changeset application.
//!
//! Applies a planned changeset statement by statement. The assembler's
//! priority order is the execution order; rollback replays the entries in
//! reverse. No transaction is opened here: the ordering contract makes it
//! safe for the caller to wrap either direction in its own transaction,
//! except where a statement (`ALTER TYPE ... ADD VALUE` on older servers)
//! cannot run inside one.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::changeset::Changeset;
use crate::error::Result;

/// Executes changesets against a database.
pub struct Applier {
    pool: PgPool,
    dry_run: bool,
}

impl Applier {
    /// Creates a new applier.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Applies the forward statements in changeset order.
    pub async fn apply(&self, changeset: &Changeset) -> Result<()> {
        info!(entries = changeset.entries.len(), "applying changeset");
        self.execute_all(&changeset.up_statements()).await?;
        info!("changeset applied");
        Ok(())
    }

    /// Applies the rollback statements, entries in reverse order.
    pub async fn rollback(&self, changeset: &Changeset) -> Result<()> {
        info!(entries = changeset.entries.len(), "rolling back changeset");
        self.execute_all(&changeset.down_statements()).await?;
        info!("changeset rolled back");
        Ok(())
    }

    async fn execute_all(&self, statements: &[&str]) -> Result<()> {
        for sql in statements {
            debug!(sql = %sql, "executing");
            if self.dry_run {
                println!("{sql};");
            } else {
                sqlx::query(sql).execute(&self.pool).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::changeset::{assemble, ChangeEntry, ChangeKind};

    // A lazy pool opens no connection until a query runs, and a dry run
    // never runs one.
    fn offline_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/unreachable")
            .unwrap()
    }

    fn sample_changeset() -> Changeset {
        assemble(vec![ChangeEntry::table_scoped(
            "books",
            ChangeKind::CreateTable,
            vec!["CREATE TABLE \"books\" (\"id\" integer)".to_string()],
            vec!["DROP TABLE \"books\"".to_string()],
        )])
    }

    #[tokio::test]
    async fn test_dry_run_apply_touches_no_database() {
        let applier = Applier::new(offline_pool()).dry_run(true);
        applier.apply(&sample_changeset()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_rollback_touches_no_database() {
        let applier = Applier::new(offline_pool()).dry_run(true);
        applier.rollback(&sample_changeset()).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_changeset_applies_without_connecting() {
        let applier = Applier::new(offline_pool());
        applier.apply(&Changeset::default()).await.unwrap();
    }
}
