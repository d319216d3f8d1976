//! Live-catalog introspection.
//!
//! Builds a [`SchemaSnapshot`] from `pg_catalog`, reading back the content
//! hashes embedded as object comments where present. Catalog definitions
//! are normalized just enough to be re-executable through the same DDL
//! paths the differs use (index definitions lose their embedded name,
//! trigger definitions lose their `CREATE TRIGGER name` head). Any query
//! failure aborts the whole snapshot.

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::Result;
use crate::naming::{self, ObjectKind};
use crate::pg;
use crate::snapshot::{
    ColumnInfo, EnumType, ExtensionInfo, IdentityMode, NamedDefinition, SchemaSnapshot, TableInfo,
};

/// Introspects one schema of a live database into a snapshot.
pub async fn snapshot(pool: &PgPool, schema: &str) -> Result<SchemaSnapshot> {
    let mut snapshot = SchemaSnapshot::new();

    load_columns(pool, schema, &mut snapshot).await?;
    load_constraints(pool, schema, &mut snapshot).await?;
    load_indexes(pool, schema, &mut snapshot).await?;
    load_triggers(pool, schema, &mut snapshot).await?;
    load_enums(pool, schema, &mut snapshot).await?;
    load_extensions(pool, &mut snapshot).await?;

    snapshot.validate()?;
    debug!(
        schema = %schema,
        tables = snapshot.tables.len(),
        enums = snapshot.enums.len(),
        "introspected schema"
    );
    Ok(snapshot)
}

async fn load_columns(pool: &PgPool, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
    let rows = sqlx::query(
        r"
        SELECT c.relname AS table_name,
               a.attname AS column_name,
               format_type(a.atttypid, a.atttypmod) AS data_type,
               NOT a.attnotnull AS nullable,
               pg_get_expr(ad.adbin, ad.adrelid) AS default_expr,
               a.attidentity::text AS identity,
               t.typtype::text AS typtype
        FROM pg_attribute a
        JOIN pg_class c ON c.oid = a.attrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        JOIN pg_type t ON t.oid = a.atttypid
        LEFT JOIN pg_attrdef ad ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum
        WHERE n.nspname = $1
          AND c.relkind = 'r'
          AND a.attnum > 0
          AND NOT a.attisdropped
        ORDER BY c.relname, a.attnum
        ",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let table: String = row.try_get("table_name")?;
        let name: String = row.try_get("column_name")?;
        let data_type: String = row.try_get("data_type")?;

        let mut column = ColumnInfo::new(&table, &name, &data_type);
        column.nullable = row.try_get("nullable")?;
        column.default = row.try_get("default_expr")?;
        column.identity = match row.try_get::<String, _>("identity")?.as_str() {
            "a" => IdentityMode::Always,
            "d" => IdentityMode::ByDefault,
            _ => IdentityMode::None,
        };
        column.is_enum = row.try_get::<String, _>("typtype")? == "e";

        snapshot
            .tables
            .entry(table.clone())
            .or_insert_with(|| TableInfo::new(&table))
            .columns
            .insert(name, column);
    }

    Ok(())
}

async fn load_constraints(
    pool: &PgPool,
    schema: &str,
    snapshot: &mut SchemaSnapshot,
) -> Result<()> {
    let rows = sqlx::query(
        r"
        SELECT c.relname AS table_name,
               con.conname AS name,
               con.contype::text AS contype,
               pg_get_constraintdef(con.oid) AS definition,
               obj_description(con.oid, 'pg_constraint') AS comment
        FROM pg_constraint con
        JOIN pg_class c ON c.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
        ORDER BY c.relname, con.conname
        ",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let table: String = row.try_get("table_name")?;
        let name: String = row.try_get("name")?;
        let kind = match row.try_get::<String, _>("contype")?.as_str() {
            "p" => ObjectKind::PrimaryKey,
            "u" => ObjectKind::Unique,
            "f" => ObjectKind::ForeignKey,
            "c" => ObjectKind::Check,
            // Exclusion and other constraint flavors are left alone.
            _ => continue,
        };
        let definition: String = row.try_get("definition")?;
        let comment: Option<String> = row.try_get("comment")?;

        let def = NamedDefinition::introspected(&table, &name, &definition, embedded_hash(comment));
        table_entry(snapshot, &table).insert_definition(kind, def)?;
    }

    Ok(())
}

async fn load_indexes(pool: &PgPool, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
    let rows = sqlx::query(
        r"
        SELECT c.relname AS table_name,
               i.relname AS name,
               pg_get_indexdef(x.indexrelid) AS definition,
               obj_description(x.indexrelid, 'pg_class') AS comment
        FROM pg_index x
        JOIN pg_class c ON c.oid = x.indrelid
        JOIN pg_class i ON i.oid = x.indexrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN pg_constraint con ON con.conindid = x.indexrelid
        WHERE n.nspname = $1
          AND con.oid IS NULL
        ORDER BY c.relname, i.relname
        ",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let table: String = row.try_get("table_name")?;
        let name: String = row.try_get("name")?;
        let definition: String = row.try_get("definition")?;
        let comment: Option<String> = row.try_get("comment")?;

        let canonical = nameless_index_definition(&definition, &name);
        let def = NamedDefinition::introspected(&table, &name, &canonical, embedded_hash(comment));
        table_entry(snapshot, &table).insert_definition(ObjectKind::Index, def)?;
    }

    Ok(())
}

async fn load_triggers(pool: &PgPool, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
    let rows = sqlx::query(
        r"
        SELECT c.relname AS table_name,
               t.tgname AS name,
               pg_get_triggerdef(t.oid) AS definition,
               obj_description(t.oid, 'pg_trigger') AS comment
        FROM pg_trigger t
        JOIN pg_class c ON c.oid = t.tgrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
          AND NOT t.tgisinternal
        ORDER BY c.relname, t.tgname
        ",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let table: String = row.try_get("table_name")?;
        let name: String = row.try_get("name")?;
        let definition: String = row.try_get("definition")?;
        let comment: Option<String> = row.try_get("comment")?;

        let body = trigger_body(&definition, &name);
        let def = NamedDefinition::introspected(&table, &name, &body, embedded_hash(comment));
        table_entry(snapshot, &table).insert_definition(ObjectKind::Trigger, def)?;
    }

    Ok(())
}

async fn load_enums(pool: &PgPool, schema: &str, snapshot: &mut SchemaSnapshot) -> Result<()> {
    let rows = sqlx::query(
        r"
        SELECT t.typname AS name,
               e.enumlabel AS label
        FROM pg_type t
        JOIN pg_enum e ON e.enumtypid = t.oid
        JOIN pg_namespace n ON n.oid = t.typnamespace
        WHERE n.nspname = $1
        ORDER BY t.typname, e.enumsortorder
        ",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let name: String = row.try_get("name")?;
        let label: String = row.try_get("label")?;
        snapshot
            .enums
            .entry(name.clone())
            .or_insert_with(|| EnumType::new(name, Vec::new()))
            .members
            .push(label);
    }

    Ok(())
}

async fn load_extensions(pool: &PgPool, snapshot: &mut SchemaSnapshot) -> Result<()> {
    let rows = sqlx::query("SELECT extname FROM pg_extension ORDER BY extname")
        .fetch_all(pool)
        .await?;

    for row in rows {
        let name: String = row.try_get("extname")?;
        snapshot
            .extensions
            .insert(name.clone(), ExtensionInfo { name });
    }

    Ok(())
}

fn table_entry<'a>(snapshot: &'a mut SchemaSnapshot, table: &str) -> &'a mut TableInfo {
    snapshot
        .tables
        .entry(table.to_string())
        .or_insert_with(|| TableInfo::new(table))
}

/// Accepts a comment only when it has the exact shape of an embedded hash.
fn embedded_hash(comment: Option<String>) -> Option<String> {
    comment.filter(|c| c.len() == naming::HASH_WIDTH && c.chars().all(|ch| ch.is_ascii_hexdigit()))
}

/// Strips the embedded name from a catalog index definition, yielding the
/// nameless canonical form the differs hash and re-execute.
fn nameless_index_definition(definition: &str, name: &str) -> String {
    let quoted = format!("INDEX {} ON", pg::quote_ident(name));
    let stripped = definition.replacen(&quoted, "INDEX ON", 1);
    if stripped != definition {
        return stripped;
    }
    definition.replacen(&format!("INDEX {name} ON"), "INDEX ON", 1)
}

/// Strips the `CREATE TRIGGER name` head from a catalog trigger definition.
fn trigger_body(definition: &str, name: &str) -> String {
    for head in [
        format!("CREATE TRIGGER {} ", pg::quote_ident(name)),
        format!("CREATE TRIGGER {name} "),
    ] {
        if let Some(rest) = definition.strip_prefix(&head) {
            return rest.to_string();
        }
    }
    definition.to_string()
}
