//! PostgreSQL DDL rendering.
//!
//! Statement construction for every operation the differs emit. The differs
//! decide *what* changed; this module only knows how to phrase it.

use crate::naming::ObjectKind;
use crate::snapshot::{ColumnInfo, IdentityMode, TableInfo};

/// Quotes an identifier (table name, column name, etc.).
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quotes and joins a list of identifiers.
#[must_use]
pub fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the column clause used by CREATE TABLE and ADD COLUMN.
///
/// Constraints and indexes are deliberately absent: they are separate
/// changeset entries so each stays individually reversible.
#[must_use]
pub fn column_ddl(column: &ColumnInfo) -> String {
    let mut parts = vec![quote_ident(&column.name), column.data_type.clone()];

    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }

    if let Some(expr) = column.default_expression() {
        parts.push(format!("DEFAULT {expr}"));
    }

    match column.identity {
        IdentityMode::None => {}
        IdentityMode::ByDefault => parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string()),
        IdentityMode::Always => parts.push("GENERATED ALWAYS AS IDENTITY".to_string()),
    }

    parts.join(" ")
}

/// Renders CREATE TABLE with bare columns.
#[must_use]
pub fn create_table(table: &TableInfo) -> String {
    let cols: Vec<String> = table.columns.values().map(column_ddl).collect();
    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_ident(&table.name),
        cols.join(",\n  ")
    )
}

/// Renders DROP TABLE.
#[must_use]
pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE {}", quote_ident(name))
}

/// Renders ALTER TABLE ... RENAME TO.
#[must_use]
pub fn rename_table(old_name: &str, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(old_name),
        quote_ident(new_name)
    )
}

/// Renders ALTER TABLE ... ADD COLUMN.
#[must_use]
pub fn add_column(table: &str, column: &ColumnInfo) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column_ddl(column)
    )
}

/// Renders ALTER TABLE ... DROP COLUMN.
#[must_use]
pub fn drop_column(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    )
}

/// Renders ALTER TABLE ... RENAME COLUMN.
#[must_use]
pub fn rename_column(table: &str, old_name: &str, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table),
        quote_ident(old_name),
        quote_ident(new_name)
    )
}

fn alter_column(table: &str, column: &str, action: &str) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN {} {}",
        quote_ident(table),
        quote_ident(column),
        action
    )
}

/// Renders SET DATA TYPE.
#[must_use]
pub fn set_data_type(table: &str, column: &str, data_type: &str) -> String {
    alter_column(table, column, &format!("SET DATA TYPE {data_type}"))
}

/// Renders SET NOT NULL or DROP NOT NULL.
#[must_use]
pub fn set_nullable(table: &str, column: &str, nullable: bool) -> String {
    let action = if nullable {
        "DROP NOT NULL"
    } else {
        "SET NOT NULL"
    };
    alter_column(table, column, action)
}

/// Renders SET DEFAULT or DROP DEFAULT.
#[must_use]
pub fn set_default(table: &str, column: &str, expression: Option<&str>) -> String {
    match expression {
        Some(expr) => alter_column(table, column, &format!("SET DEFAULT {expr}")),
        None => alter_column(table, column, "DROP DEFAULT"),
    }
}

/// Renders an identity-mode transition for a column.
#[must_use]
pub fn set_identity(table: &str, column: &str, from: IdentityMode, to: IdentityMode) -> String {
    let action = match (from, to) {
        (IdentityMode::None, IdentityMode::ByDefault) => {
            "ADD GENERATED BY DEFAULT AS IDENTITY".to_string()
        }
        (IdentityMode::None, IdentityMode::Always) => {
            "ADD GENERATED ALWAYS AS IDENTITY".to_string()
        }
        (_, IdentityMode::None) => "DROP IDENTITY".to_string(),
        (_, IdentityMode::ByDefault) => "SET GENERATED BY DEFAULT".to_string(),
        (_, IdentityMode::Always) => "SET GENERATED ALWAYS".to_string(),
    };
    alter_column(table, column, &action)
}

/// Renders ALTER TABLE ... ADD CONSTRAINT with an optional NOT VALID tail.
#[must_use]
pub fn add_constraint(table: &str, name: &str, clause: &str, not_valid: bool) -> String {
    let tail = if not_valid { " NOT VALID" } else { "" };
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {}{}",
        quote_ident(table),
        quote_ident(name),
        clause,
        tail
    )
}

/// Renders ALTER TABLE ... VALIDATE CONSTRAINT.
#[must_use]
pub fn validate_constraint(table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} VALIDATE CONSTRAINT {}",
        quote_ident(table),
        quote_ident(name)
    )
}

/// Renders ALTER TABLE ... DROP CONSTRAINT.
#[must_use]
pub fn drop_constraint(table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        quote_ident(table),
        quote_ident(name)
    )
}

/// Renders ALTER TABLE ... RENAME CONSTRAINT.
#[must_use]
pub fn rename_constraint(table: &str, old_name: &str, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
        quote_ident(table),
        quote_ident(old_name),
        quote_ident(new_name)
    )
}

/// Renders a CREATE INDEX statement from its canonical (nameless) form.
///
/// Canonical index definitions read `CREATE [UNIQUE ]INDEX ON ...` so that
/// the hash never depends on the derived name; the name is spliced in here.
#[must_use]
pub fn create_index(name: &str, canonical: &str) -> String {
    canonical.replacen("INDEX ON", &format!("INDEX {} ON", quote_ident(name)), 1)
}

/// Renders DROP INDEX.
#[must_use]
pub fn drop_index(name: &str) -> String {
    format!("DROP INDEX {}", quote_ident(name))
}

/// Renders ALTER INDEX ... RENAME TO.
#[must_use]
pub fn rename_index(old_name: &str, new_name: &str) -> String {
    format!(
        "ALTER INDEX {} RENAME TO {}",
        quote_ident(old_name),
        quote_ident(new_name)
    )
}

/// Renders CREATE [OR REPLACE] TRIGGER from its canonical body.
///
/// The canonical trigger body already contains the `ON "table"` clause.
#[must_use]
pub fn create_trigger(name: &str, canonical: &str, or_replace: bool) -> String {
    let keyword = if or_replace {
        "CREATE OR REPLACE TRIGGER"
    } else {
        "CREATE TRIGGER"
    };
    format!("{} {} {}", keyword, quote_ident(name), canonical)
}

/// Renders DROP TRIGGER.
#[must_use]
pub fn drop_trigger(name: &str, table: &str) -> String {
    format!(
        "DROP TRIGGER {} ON {}",
        quote_ident(name),
        quote_ident(table)
    )
}

/// Renders ALTER TRIGGER ... RENAME TO.
#[must_use]
pub fn rename_trigger(table: &str, old_name: &str, new_name: &str) -> String {
    format!(
        "ALTER TRIGGER {} ON {} RENAME TO {}",
        quote_ident(old_name),
        quote_ident(table),
        quote_ident(new_name)
    )
}

/// Renders CREATE TYPE ... AS ENUM.
#[must_use]
pub fn create_enum(name: &str, members: &[String]) -> String {
    let labels: Vec<String> = members.iter().map(|m| quote_literal(m)).collect();
    format!(
        "CREATE TYPE {} AS ENUM ({})",
        quote_ident(name),
        labels.join(", ")
    )
}

/// Renders ALTER TYPE ... ADD VALUE, optionally anchored BEFORE an
/// existing member to preserve declared ordering.
#[must_use]
pub fn add_enum_value(name: &str, member: &str, before: Option<&str>) -> String {
    let mut sql = format!(
        "ALTER TYPE {} ADD VALUE {}",
        quote_ident(name),
        quote_literal(member)
    );
    if let Some(anchor) = before {
        sql.push_str(&format!(" BEFORE {}", quote_literal(anchor)));
    }
    sql
}

/// Renders DROP TYPE.
#[must_use]
pub fn drop_enum(name: &str) -> String {
    format!("DROP TYPE {}", quote_ident(name))
}

/// Renders CREATE EXTENSION IF NOT EXISTS.
#[must_use]
pub fn create_extension(name: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(name))
}

/// Renders DROP EXTENSION.
#[must_use]
pub fn drop_extension(name: &str) -> String {
    format!("DROP EXTENSION {}", quote_ident(name))
}

/// Renders CREATE SCHEMA IF NOT EXISTS.
#[must_use]
pub fn create_schema(name: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(name))
}

/// Renders DROP SCHEMA.
#[must_use]
pub fn drop_schema(name: &str) -> String {
    format!("DROP SCHEMA {}", quote_ident(name))
}

/// Renders the COMMENT ON statement that embeds a definition hash on a
/// constraint, index or trigger.
#[must_use]
pub fn comment_hash(kind: ObjectKind, table: &str, name: &str, hash: &str) -> String {
    let literal = quote_literal(hash);
    match kind {
        ObjectKind::Index => format!("COMMENT ON INDEX {} IS {}", quote_ident(name), literal),
        ObjectKind::Trigger => format!(
            "COMMENT ON TRIGGER {} ON {} IS {}",
            quote_ident(name),
            quote_ident(table),
            literal
        ),
        _ => format!(
            "COMMENT ON CONSTRAINT {} ON {} IS {}",
            quote_ident(name),
            quote_ident(table),
            literal
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("books"), "\"books\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_create_index_splices_name() {
        let canonical = "CREATE UNIQUE INDEX ON \"books\" (\"name\")";
        assert_eq!(
            create_index("books_abc_tm_idx", canonical),
            "CREATE UNIQUE INDEX \"books_abc_tm_idx\" ON \"books\" (\"name\")"
        );
    }

    #[test]
    fn test_add_constraint_not_valid() {
        let sql = add_constraint("books", "books_x_tm_fk", "FOREIGN KEY (\"a\")", true);
        assert!(sql.ends_with("NOT VALID"));
        assert!(sql.contains("ADD CONSTRAINT \"books_x_tm_fk\""));
    }

    #[test]
    fn test_identity_transitions() {
        assert_eq!(
            set_identity("books", "id", IdentityMode::None, IdentityMode::Always),
            "ALTER TABLE \"books\" ALTER COLUMN \"id\" ADD GENERATED ALWAYS AS IDENTITY"
        );
        assert_eq!(
            set_identity("books", "id", IdentityMode::Always, IdentityMode::None),
            "ALTER TABLE \"books\" ALTER COLUMN \"id\" DROP IDENTITY"
        );
        assert_eq!(
            set_identity(
                "books",
                "id",
                IdentityMode::Always,
                IdentityMode::ByDefault
            ),
            "ALTER TABLE \"books\" ALTER COLUMN \"id\" SET GENERATED BY DEFAULT"
        );
    }

    #[test]
    fn test_comment_hash_targets() {
        assert!(comment_hash(ObjectKind::Index, "books", "i", "h").starts_with("COMMENT ON INDEX"));
        assert!(comment_hash(ObjectKind::Check, "books", "c", "h")
            .starts_with("COMMENT ON CONSTRAINT"));
        assert!(
            comment_hash(ObjectKind::Trigger, "books", "t", "h").starts_with("COMMENT ON TRIGGER")
        );
    }
}
