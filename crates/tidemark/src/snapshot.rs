//! Schema snapshot representation.
//!
//! A [`SchemaSnapshot`] is the shared in-memory form of a database schema,
//! whether it was declared in code (built through [`SnapshotBuilder`]) or
//! introspected from a live database. Construction is pure data assembly:
//! no decision logic lives here, and building the same input twice yields
//! byte-identical snapshots (all aggregates are `BTreeMap`s, so iteration
//! order is stable). That determinism is what makes the hash-based change
//! detection in [`crate::naming`] stable across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::casing::CasingConfig;
use crate::error::{PlanError, Result};
use crate::naming::{self, ObjectKind};
use crate::pg;

/// Identity generation mode of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentityMode {
    /// Not an identity column.
    #[default]
    None,
    /// GENERATED BY DEFAULT AS IDENTITY.
    ByDefault,
    /// GENERATED ALWAYS AS IDENTITY.
    Always,
}

/// Uniqueness mode of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UniquenessMode {
    /// No unique constraint.
    #[default]
    None,
    /// UNIQUE NULLS DISTINCT (the PostgreSQL default).
    NullsDistinct,
    /// UNIQUE NULLS NOT DISTINCT.
    NullsNotDistinct,
}

/// Referential action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// No action (error if the referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as no action but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default value.
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL spelling of this action.
    #[must_use]
    pub fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the catalog spelling of an action.
    #[must_use]
    pub fn from_sql(sql: &str) -> Self {
        match sql {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

/// Foreign key reference carried by a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Action on delete.
    pub on_delete: ReferentialAction,
    /// Action on update.
    pub on_update: ReferentialAction,
}

/// A single column in a snapshot.
///
/// Identity is `(table, name)`. Constructed once per snapshot build,
/// immutable afterwards, compared by value across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Owning table (physical name).
    pub table: String,
    /// Column name (physical name).
    pub name: String,
    /// Canonical SQL type string (e.g. `integer`, `character varying(255)`).
    pub data_type: String,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Default expression. May carry a drift-detection hash tag in the
    /// form `{hash}:{expression}`.
    pub default: Option<String>,
    /// Identity generation mode.
    pub identity: IdentityMode,
    /// Column-level uniqueness mode.
    pub uniqueness: UniquenessMode,
    /// Whether this column is part of the primary key.
    pub primary_key: bool,
    /// Foreign key reference, if any.
    pub foreign_key: Option<ForeignKeyRef>,
    /// Numeric precision, for numeric types.
    pub numeric_precision: Option<i32>,
    /// Numeric scale, for numeric types.
    pub numeric_scale: Option<i32>,
    /// Maximum character length, for character types.
    pub char_max_length: Option<i32>,
    /// Fractional-seconds precision, for datetime types.
    pub datetime_precision: Option<i32>,
    /// Whether the type is an enum type.
    pub is_enum: bool,
    /// Physical name this column was renamed from, if declared.
    pub rename_from: Option<String>,
}

impl ColumnInfo {
    /// Creates a new column.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            identity: IdentityMode::None,
            uniqueness: UniquenessMode::None,
            primary_key: false,
            foreign_key: None,
            numeric_precision: None,
            numeric_scale: None,
            char_max_length: None,
            datetime_precision: None,
            is_enum: false,
            rename_from: None,
        }
    }

    /// Returns the default expression with any hash tag stripped.
    #[must_use]
    pub fn default_expression(&self) -> Option<&str> {
        self.default.as_deref().map(strip_default_tag)
    }

    /// Returns the drift-detection key for the default value.
    ///
    /// Tagged defaults (`{hash}:{expression}`) compare by their embedded
    /// hash; untagged defaults hash their expression on the fly. Two
    /// differently-phrased but identically-tagged defaults compare equal.
    #[must_use]
    pub fn default_drift_key(&self) -> Option<String> {
        self.default.as_deref().map(|raw| {
            split_default_tag(raw).map_or_else(
                || naming::definition_hash(raw),
                |(hash, _)| hash.to_string(),
            )
        })
    }
}

fn split_default_tag(raw: &str) -> Option<(&str, &str)> {
    let (head, tail) = raw.split_once(':')?;
    if head.len() == naming::HASH_WIDTH && head.chars().all(|c| c.is_ascii_hexdigit()) {
        Some((head, tail))
    } else {
        None
    }
}

fn strip_default_tag(raw: &str) -> &str {
    split_default_tag(raw).map_or(raw, |(_, expr)| expr)
}

/// A named database object definition: index, primary key, unique
/// constraint, foreign key, check constraint or trigger.
///
/// The `hash` is the content hash of the canonical definition. For
/// tool-owned objects it is embedded in the name (triggers excepted) and
/// stored as a database comment; for introspected objects it is read back
/// from that comment when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedDefinition {
    /// Owning table (physical name).
    pub table: String,
    /// Object name.
    pub name: String,
    /// Canonical definition string.
    pub definition: String,
    /// Content hash of the canonical definition.
    pub hash: String,
}

impl NamedDefinition {
    /// Creates a tool-owned definition with a generated name.
    #[must_use]
    pub fn generated(table: &str, kind: ObjectKind, canonical: &str, tag: &str) -> Self {
        Self {
            table: table.to_string(),
            name: naming::generated_name(table, kind, canonical, tag),
            definition: canonical.to_string(),
            hash: naming::definition_hash(canonical),
        }
    }

    /// Creates a tool-owned trigger definition with a stable key-based name.
    #[must_use]
    pub fn trigger(table: &str, key: &str, canonical: &str, tag: &str) -> Self {
        Self {
            table: table.to_string(),
            name: naming::trigger_name(table, key, tag),
            definition: canonical.to_string(),
            hash: naming::definition_hash(canonical),
        }
    }

    /// Creates a definition from introspected catalog data.
    ///
    /// `comment_hash` is the hash read back from the object's comment; when
    /// absent the hash is re-derived from the catalog's definition text.
    #[must_use]
    pub fn introspected(
        table: &str,
        name: &str,
        definition: &str,
        comment_hash: Option<String>,
    ) -> Self {
        let hash = comment_hash.unwrap_or_else(|| naming::definition_hash(definition));
        Self {
            table: table.to_string(),
            name: name.to_string(),
            definition: definition.to_string(),
            hash,
        }
    }

    /// Returns whether this definition is tool-owned under the given tag.
    #[must_use]
    pub fn is_tool_owned(&self, kind: ObjectKind, tag: &str) -> bool {
        naming::is_tool_owned(&self.name, kind, tag)
    }
}

/// An enum type: name plus ordered member labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    /// Type name (physical).
    pub name: String,
    /// Ordered member labels.
    pub members: Vec<String>,
}

impl EnumType {
    /// Creates a new enum type.
    #[must_use]
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Returns the canonical comma-joined member string.
    #[must_use]
    pub fn canonical_members(&self) -> String {
        self.members.join(",")
    }
}

/// An installed extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Extension name.
    pub name: String,
}

/// A single table: columns plus every named definition that belongs to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name (physical).
    pub name: String,
    /// Columns, keyed by physical name.
    pub columns: BTreeMap<String, ColumnInfo>,
    /// Primary key constraint, if any.
    pub primary_key: Option<NamedDefinition>,
    /// Unique constraints, keyed by name.
    pub unique: BTreeMap<String, NamedDefinition>,
    /// Foreign key constraints, keyed by name.
    pub foreign_keys: BTreeMap<String, NamedDefinition>,
    /// Check constraints, keyed by name.
    pub checks: BTreeMap<String, NamedDefinition>,
    /// Indexes, keyed by name.
    pub indexes: BTreeMap<String, NamedDefinition>,
    /// Triggers, keyed by name.
    pub triggers: BTreeMap<String, NamedDefinition>,
    /// Physical name this table was renamed from, if declared.
    pub rename_from: Option<String>,
}

impl TableInfo {
    /// Creates a new empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Gets a column by physical name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    /// Inserts a named definition into the map for its kind, failing on a
    /// generated-name collision.
    pub fn insert_definition(&mut self, kind: ObjectKind, def: NamedDefinition) -> Result<()> {
        let map = match kind {
            ObjectKind::PrimaryKey => {
                if self.primary_key.is_some() {
                    return Err(PlanError::NamingCollision {
                        table: def.table,
                        name: def.name,
                    });
                }
                self.primary_key = Some(def);
                return Ok(());
            }
            ObjectKind::Unique => &mut self.unique,
            ObjectKind::ForeignKey => &mut self.foreign_keys,
            ObjectKind::Check => &mut self.checks,
            ObjectKind::Index => &mut self.indexes,
            ObjectKind::Trigger => &mut self.triggers,
        };
        if map.contains_key(&def.name) {
            return Err(PlanError::NamingCollision {
                table: def.table,
                name: def.name,
            });
        }
        map.insert(def.name.clone(), def);
        Ok(())
    }

    fn all_definitions(&self) -> impl Iterator<Item = &NamedDefinition> {
        self.primary_key
            .iter()
            .chain(self.unique.values())
            .chain(self.foreign_keys.values())
            .chain(self.checks.values())
            .chain(self.indexes.values())
            .chain(self.triggers.values())
    }
}

/// Complete schema snapshot: tables, enum types and extensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Tables, keyed by physical name.
    pub tables: BTreeMap<String, TableInfo>,
    /// Enum types, keyed by physical name.
    pub enums: BTreeMap<String, EnumType>,
    /// Extensions, keyed by name.
    pub extensions: BTreeMap<String, ExtensionInfo>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a table by physical name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    /// Verifies the snapshot invariants.
    ///
    /// Every named definition and column must refer to the table it is
    /// stored under; a mismatch means the snapshot was assembled wrong and
    /// the whole plan must abort.
    pub fn validate(&self) -> Result<()> {
        for (key, table) in &self.tables {
            if table.name != *key {
                return Err(PlanError::SnapshotBuild(format!(
                    "table '{}' stored under key '{}'",
                    table.name, key
                )));
            }
            for column in table.columns.values() {
                if column.table != *key {
                    return Err(PlanError::SnapshotBuild(format!(
                        "column '{}' claims table '{}' but is stored under '{}'",
                        column.name, column.table, key
                    )));
                }
            }
            for def in table.all_definitions() {
                if !self.tables.contains_key(&def.table) || def.table != *key {
                    return Err(PlanError::OrphanedDefinition {
                        name: def.name.clone(),
                        table: def.table.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Draft of a column in a declared schema, authored with logical names.
#[derive(Debug, Clone)]
pub struct ColumnDraft {
    name: String,
    data_type: String,
    nullable: bool,
    default: Option<String>,
    identity: IdentityMode,
    uniqueness: UniquenessMode,
    primary_key: bool,
    references: Option<ForeignKeyRef>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    char_max_length: Option<i32>,
    datetime_precision: Option<i32>,
    is_enum: bool,
    rename_from: Option<String>,
}

impl ColumnDraft {
    /// Creates a new column draft.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            identity: IdentityMode::None,
            uniqueness: UniquenessMode::None,
            primary_key: false,
            references: None,
            numeric_precision: None,
            numeric_scale: None,
            char_max_length: None,
            datetime_precision: None,
            is_enum: false,
            rename_from: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Sets the identity mode.
    #[must_use]
    pub fn identity(mut self, mode: IdentityMode) -> Self {
        self.identity = mode;
        self
    }

    /// Adds a UNIQUE NULLS DISTINCT constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.uniqueness = UniquenessMode::NullsDistinct;
        self
    }

    /// Adds a UNIQUE NULLS NOT DISTINCT constraint.
    #[must_use]
    pub fn unique_nulls_not_distinct(mut self) -> Self {
        self.uniqueness = UniquenessMode::NullsNotDistinct;
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Adds a foreign key reference (logical target names).
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        });
        self
    }

    /// Sets the ON DELETE action of the reference.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = action;
        }
        self
    }

    /// Sets the ON UPDATE action of the reference.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_update = action;
        }
        self
    }

    /// Sets numeric precision and scale.
    #[must_use]
    pub fn numeric(mut self, precision: i32, scale: i32) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }

    /// Sets the maximum character length.
    #[must_use]
    pub fn char_length(mut self, length: i32) -> Self {
        self.char_max_length = Some(length);
        self
    }

    /// Sets the datetime fractional precision.
    #[must_use]
    pub fn datetime_precision(mut self, precision: i32) -> Self {
        self.datetime_precision = Some(precision);
        self
    }

    /// Marks the type as an enum type.
    #[must_use]
    pub fn enum_type(mut self) -> Self {
        self.is_enum = true;
        self
    }

    /// Records the logical name this column was renamed from.
    #[must_use]
    pub fn rename_from(mut self, name: impl Into<String>) -> Self {
        self.rename_from = Some(name.into());
        self
    }
}

/// Draft of an index in a declared schema.
#[derive(Debug, Clone, Default)]
pub struct IndexDraft {
    columns: Vec<String>,
    unique: bool,
    condition: Option<String>,
}

impl IndexDraft {
    /// Creates a new index draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indexed columns (logical names).
    #[must_use]
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a partial index condition (written with physical names).
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Draft of a trigger in a declared schema.
#[derive(Debug, Clone)]
pub struct TriggerDraft {
    key: String,
    timing: String,
    each_row: bool,
    function: String,
}

impl TriggerDraft {
    /// Creates a new trigger draft.
    ///
    /// `key` names the trigger within its table and stays stable across
    /// body changes (triggers replace in place rather than drop+create).
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timing: "BEFORE UPDATE".to_string(),
            each_row: true,
            function: String::new(),
        }
    }

    /// Sets the timing clause (e.g. `BEFORE INSERT OR UPDATE`).
    #[must_use]
    pub fn timing(mut self, timing: impl Into<String>) -> Self {
        self.timing = timing.into();
        self
    }

    /// Fires once per statement instead of per row.
    #[must_use]
    pub fn for_each_statement(mut self) -> Self {
        self.each_row = false;
        self
    }

    /// Sets the trigger function call (e.g. `set_updated_at()`).
    #[must_use]
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    fn canonical(&self, table: &str) -> String {
        let scope = if self.each_row { "ROW" } else { "STATEMENT" };
        format!(
            "{} ON {} FOR EACH {} EXECUTE FUNCTION {}",
            self.timing,
            pg::quote_ident(table),
            scope,
            self.function
        )
    }
}

/// Draft of a table in a declared schema.
#[derive(Debug, Clone)]
pub struct TableDraft {
    name: String,
    rename_from: Option<String>,
    columns: Vec<ColumnDraft>,
    checks: Vec<String>,
    indexes: Vec<IndexDraft>,
    triggers: Vec<TriggerDraft>,
}

impl TableDraft {
    /// Creates a new table draft.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rename_from: None,
            columns: Vec::new(),
            checks: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Records the logical name this table was renamed from.
    #[must_use]
    pub fn rename_from(mut self, name: impl Into<String>) -> Self {
        self.rename_from = Some(name.into());
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDraft) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a check constraint (expression written with physical names).
    #[must_use]
    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.checks.push(expression.into());
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDraft) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: TriggerDraft) -> Self {
        self.triggers.push(trigger);
        self
    }
}

/// Builds a declared-schema snapshot from drafts.
///
/// Logical identifiers are translated to physical form here, before any
/// canonical definition string is composed; everything downstream of the
/// builder sees physical names only.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    casing: CasingConfig,
    tag: String,
    tables: Vec<TableDraft>,
    enums: Vec<EnumType>,
    extensions: Vec<String>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Creates a builder with casing disabled and the default ownership tag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            casing: CasingConfig::disabled(),
            tag: naming::DEFAULT_TAG.to_string(),
            tables: Vec::new(),
            enums: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Sets the casing configuration.
    #[must_use]
    pub fn casing(mut self, casing: CasingConfig) -> Self {
        self.casing = casing;
        self
    }

    /// Sets the ownership tag used in generated names.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Adds a table draft.
    #[must_use]
    pub fn table(mut self, table: TableDraft) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds an enum type (logical name, ordered members).
    #[must_use]
    pub fn enum_type(mut self, name: impl Into<String>, members: Vec<String>) -> Self {
        self.enums.push(EnumType::new(name, members));
        self
    }

    /// Adds a required extension.
    #[must_use]
    pub fn extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.push(name.into());
        self
    }

    /// Builds and validates the snapshot.
    pub fn build(self) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new();
        let tag = &self.tag;

        for draft in &self.tables {
            let table_name = self.casing.to_physical(&draft.name);
            if snapshot.tables.contains_key(&table_name) {
                return Err(PlanError::SnapshotBuild(format!(
                    "duplicate table '{table_name}'"
                )));
            }
            let mut table = TableInfo::new(&table_name);
            table.rename_from = draft
                .rename_from
                .as_deref()
                .map(|n| self.casing.to_physical(n));

            let mut pk_columns = Vec::new();
            for col in &draft.columns {
                let column = self.realize_column(&table_name, col);
                if table.columns.contains_key(&column.name) {
                    return Err(PlanError::SnapshotBuild(format!(
                        "duplicate column '{}' in table '{}'",
                        column.name, table_name
                    )));
                }
                if column.primary_key {
                    pk_columns.push(column.name.clone());
                }
                if column.uniqueness != UniquenessMode::None {
                    let canonical = unique_canonical(&column.name, column.uniqueness);
                    table.insert_definition(
                        ObjectKind::Unique,
                        NamedDefinition::generated(&table_name, ObjectKind::Unique, &canonical, tag),
                    )?;
                }
                if let Some(fk) = &column.foreign_key {
                    let canonical = foreign_key_canonical(&column.name, fk);
                    table.insert_definition(
                        ObjectKind::ForeignKey,
                        NamedDefinition::generated(
                            &table_name,
                            ObjectKind::ForeignKey,
                            &canonical,
                            tag,
                        ),
                    )?;
                }
                table.columns.insert(column.name.clone(), column);
            }

            if !pk_columns.is_empty() {
                let canonical = primary_key_canonical(&pk_columns);
                table.insert_definition(
                    ObjectKind::PrimaryKey,
                    NamedDefinition::generated(&table_name, ObjectKind::PrimaryKey, &canonical, tag),
                )?;
            }

            for expr in &draft.checks {
                let canonical = format!("CHECK ({expr})");
                table.insert_definition(
                    ObjectKind::Check,
                    NamedDefinition::generated(&table_name, ObjectKind::Check, &canonical, tag),
                )?;
            }

            for index in &draft.indexes {
                let columns: Vec<String> = index
                    .columns
                    .iter()
                    .map(|c| self.casing.to_physical(c))
                    .collect();
                let canonical = index_canonical(
                    &table_name,
                    &columns,
                    index.unique,
                    index.condition.as_deref(),
                );
                table.insert_definition(
                    ObjectKind::Index,
                    NamedDefinition::generated(&table_name, ObjectKind::Index, &canonical, tag),
                )?;
            }

            for trigger in &draft.triggers {
                let canonical = trigger.canonical(&table_name);
                table.insert_definition(
                    ObjectKind::Trigger,
                    NamedDefinition::trigger(&table_name, &trigger.key, &canonical, tag),
                )?;
            }

            snapshot.tables.insert(table_name, table);
        }

        for enum_type in &self.enums {
            let name = self.casing.to_physical(&enum_type.name);
            if snapshot.enums.contains_key(&name) {
                return Err(PlanError::SnapshotBuild(format!(
                    "duplicate enum type '{name}'"
                )));
            }
            snapshot
                .enums
                .insert(name.clone(), EnumType::new(name, enum_type.members.clone()));
        }

        for extension in &self.extensions {
            snapshot.extensions.insert(
                extension.clone(),
                ExtensionInfo {
                    name: extension.clone(),
                },
            );
        }

        snapshot.validate()?;
        Ok(snapshot)
    }

    fn realize_column(&self, table: &str, draft: &ColumnDraft) -> ColumnInfo {
        ColumnInfo {
            table: table.to_string(),
            name: self.casing.to_physical(&draft.name),
            data_type: draft.data_type.clone(),
            nullable: draft.nullable,
            default: draft.default.clone(),
            identity: draft.identity,
            uniqueness: draft.uniqueness,
            primary_key: draft.primary_key,
            foreign_key: draft.references.as_ref().map(|fk| ForeignKeyRef {
                table: self.casing.to_physical(&fk.table),
                column: self.casing.to_physical(&fk.column),
                on_delete: fk.on_delete,
                on_update: fk.on_update,
            }),
            numeric_precision: draft.numeric_precision,
            numeric_scale: draft.numeric_scale,
            char_max_length: draft.char_max_length,
            datetime_precision: draft.datetime_precision,
            is_enum: draft.is_enum,
            rename_from: draft
                .rename_from
                .as_deref()
                .map(|n| self.casing.to_physical(n)),
        }
    }
}

/// Canonical clause for a primary key.
#[must_use]
pub fn primary_key_canonical(columns: &[String]) -> String {
    format!("PRIMARY KEY ({})", pg::quote_list(columns))
}

/// Canonical clause for a single-column unique constraint.
#[must_use]
pub fn unique_canonical(column: &str, mode: UniquenessMode) -> String {
    let nulls = match mode {
        UniquenessMode::NullsNotDistinct => "NULLS NOT DISTINCT ",
        _ => "NULLS DISTINCT ",
    };
    format!("UNIQUE {}({})", nulls, pg::quote_ident(column))
}

/// Canonical clause for a single-column foreign key.
#[must_use]
pub fn foreign_key_canonical(column: &str, fk: &ForeignKeyRef) -> String {
    format!(
        "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        pg::quote_ident(column),
        pg::quote_ident(&fk.table),
        pg::quote_ident(&fk.column),
        fk.on_delete.to_sql(),
        fk.on_update.to_sql()
    )
}

/// Canonical (nameless) CREATE INDEX statement.
#[must_use]
pub fn index_canonical(
    table: &str,
    columns: &[String],
    unique: bool,
    condition: Option<&str>,
) -> String {
    let mut sql = String::from("CREATE ");
    if unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ON ");
    sql.push_str(&pg::quote_ident(table));
    sql.push_str(" (");
    sql.push_str(&pg::quote_list(columns));
    sql.push(')');
    if let Some(cond) = condition {
        sql.push_str(" WHERE ");
        sql.push_str(cond);
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casing::CaseRule;

    fn books_builder() -> SnapshotBuilder {
        SnapshotBuilder::new().table(
            TableDraft::new("books")
                .column(ColumnDraft::new("id", "integer").primary_key())
                .column(ColumnDraft::new("name", "text").not_null().unique()),
        )
    }

    #[test]
    fn test_builder_generates_primary_key() {
        let snapshot = books_builder().build().unwrap();
        let books = snapshot.get_table("books").unwrap();
        let pk = books.primary_key.as_ref().unwrap();
        assert_eq!(pk.definition, "PRIMARY KEY (\"id\")");
        assert!(pk.name.ends_with("_tm_pk"));
    }

    #[test]
    fn test_builder_generates_unique_constraint() {
        let snapshot = books_builder().build().unwrap();
        let books = snapshot.get_table("books").unwrap();
        assert_eq!(books.unique.len(), 1);
        let unique = books.unique.values().next().unwrap();
        assert_eq!(unique.definition, "UNIQUE NULLS DISTINCT (\"name\")");
    }

    #[test]
    fn test_builder_is_deterministic() {
        let a = books_builder().build().unwrap();
        let b = books_builder().build().unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_builder_translates_casing() {
        let snapshot = SnapshotBuilder::new()
            .casing(CasingConfig::enabled(CaseRule::Snake))
            .table(
                TableDraft::new("userAccounts")
                    .column(ColumnDraft::new("accountId", "integer").primary_key()),
            )
            .build()
            .unwrap();

        let table = snapshot.get_table("user_accounts").unwrap();
        assert!(table.get_column("account_id").is_some());
        let pk = table.primary_key.as_ref().unwrap();
        assert_eq!(pk.definition, "PRIMARY KEY (\"account_id\")");
    }

    #[test]
    fn test_duplicate_check_is_naming_collision() {
        let result = SnapshotBuilder::new()
            .table(
                TableDraft::new("books")
                    .column(ColumnDraft::new("price", "numeric"))
                    .check("price > 0")
                    .check("price > 0"),
            )
            .build();
        assert!(matches!(result, Err(PlanError::NamingCollision { .. })));
    }

    #[test]
    fn test_foreign_key_canonical_form() {
        let snapshot = SnapshotBuilder::new()
            .table(TableDraft::new("authors").column(ColumnDraft::new("id", "integer").primary_key()))
            .table(
                TableDraft::new("books").column(
                    ColumnDraft::new("author_id", "integer")
                        .references("authors", "id")
                        .on_delete(ReferentialAction::Cascade),
                ),
            )
            .build()
            .unwrap();

        let books = snapshot.get_table("books").unwrap();
        let fk = books.foreign_keys.values().next().unwrap();
        assert!(fk.definition.contains("REFERENCES \"authors\" (\"id\")"));
        assert!(fk.definition.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_validate_rejects_orphaned_definition() {
        let mut snapshot = books_builder().build().unwrap();
        let orphan = NamedDefinition::introspected("ghost", "ghost_idx", "CREATE INDEX ...", None);
        snapshot
            .tables
            .get_mut("books")
            .unwrap()
            .indexes
            .insert(orphan.name.clone(), orphan);
        assert!(matches!(
            snapshot.validate(),
            Err(PlanError::OrphanedDefinition { .. })
        ));
    }

    #[test]
    fn test_default_drift_key_prefers_tag() {
        let mut column = ColumnInfo::new("books", "created_at", "timestamp");
        column.default = Some(format!("{}:{}", "a".repeat(naming::HASH_WIDTH), "now()"));
        assert_eq!(column.default_drift_key().unwrap(), "a".repeat(16));
        assert_eq!(column.default_expression().unwrap(), "now()");

        column.default = Some("now()".to_string());
        assert_eq!(
            column.default_drift_key().unwrap(),
            naming::definition_hash("now()")
        );
    }

    #[test]
    fn test_trigger_definition() {
        let snapshot = SnapshotBuilder::new()
            .table(
                TableDraft::new("books")
                    .column(ColumnDraft::new("id", "integer").primary_key())
                    .trigger(
                        TriggerDraft::new("touch")
                            .timing("BEFORE UPDATE")
                            .function("set_updated_at()"),
                    ),
            )
            .build()
            .unwrap();

        let books = snapshot.get_table("books").unwrap();
        let trigger = books.triggers.get("books_touch_tm_trg").unwrap();
        assert_eq!(
            trigger.definition,
            "BEFORE UPDATE ON \"books\" FOR EACH ROW EXECUTE FUNCTION set_updated_at()"
        );
    }
}
