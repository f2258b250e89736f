//! Raw config types matching the layered JSON configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Debug mode surfaces failing statements and their parameters to the caller.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_database_url(),
            debug: false,
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite::memory:".into()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            per_page: default_per_page(),
        }
    }
}

fn default_per_page() -> u64 {
    10
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    /// Column holding the owning user's id on user-specific models.
    #[serde(default = "default_user_foreign_key")]
    pub foreign_key: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            foreign_key: default_user_foreign_key(),
        }
    }
}

fn default_user_foreign_key() -> String {
    "users_id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationsConfig {
    /// Nested relation reads stop below this depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        RelationsConfig {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> u32 {
    3
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    ManyToMany,
}

impl RelationKind {
    /// belongs_to and has_one materialize a single record.
    pub fn is_singular(self) -> bool {
        matches!(self, RelationKind::BelongsTo | RelationKind::HasOne)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    /// Related model name; defaults to the relation name.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub local_key: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Bridge table, many_to_many only.
    #[serde(default)]
    pub bridge: Option<String>,
    /// Bridge column pointing at the related model, many_to_many only.
    #[serde(default)]
    pub related_key: Option<String>,
    #[serde(default)]
    pub flatten: bool,
    /// Falls back to the model-level `cascade` flag when unset.
    #[serde(default)]
    pub cascade: Option<bool>,
    /// Field name to attach under instead of the relation name.
    #[serde(default)]
    pub mount: Option<String>,
    #[serde(default, rename = "where")]
    pub where_: IndexMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimestampsConfig {
    #[serde(default = "default_created")]
    pub created: String,
    #[serde(default = "default_updated")]
    pub updated: String,
}

impl Default for TimestampsConfig {
    fn default() -> Self {
        TimestampsConfig {
            created: default_created(),
            updated: default_updated(),
        }
    }
}

fn default_created() -> String {
    "created".into()
}

fn default_updated() -> String {
    "updated".into()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Table name; defaults to the model name.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Column name to type declaration, in declaration order. Used by the table-creation helper.
    #[serde(default)]
    pub schema: IndexMap<String, String>,
    #[serde(default)]
    pub relations: IndexMap<String, RelationConfig>,
    #[serde(default)]
    pub cascade: bool,
    #[serde(default)]
    pub user_specific: bool,
    #[serde(default)]
    pub prevent_duplicate: bool,
    #[serde(default)]
    pub load_relations: Option<bool>,
    #[serde(default)]
    pub timestamps: TimestampsConfig,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

/// All config sections after layer merging.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub relations: RelationsConfig,
    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,
}
