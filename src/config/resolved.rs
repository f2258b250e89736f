//! Resolved model registry: config validated and flattened for runtime use.

use crate::config::{RelationKind, TimestampsConfig, ValidationRule};
use crate::error::ConfigError;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A relation edge with every key filled in.
#[derive(Clone, Debug)]
pub struct ResolvedRelation {
    pub name: String,
    pub kind: RelationKind,
    /// Registry name of the related entity.
    pub model: String,
    /// Parent column whose value is matched.
    pub local_key: String,
    /// Column on the related (or bridge) table matched against the local key.
    pub foreign_key: String,
    /// Registry name of the bridge entity, many_to_many only.
    pub bridge: Option<String>,
    /// Bridge column holding the related entity's key, many_to_many only.
    pub related_key: Option<String>,
    pub flatten: bool,
    pub cascade: bool,
    /// Field name the related data is attached under.
    pub mount: String,
    /// Extra equality filter applied to the related read.
    pub filter: IndexMap<String, Value>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub table_name: String,
    pub primary_key: String,
    pub schema: IndexMap<String, String>,
    pub relations: Vec<ResolvedRelation>,
    pub user_specific: bool,
    pub user_foreign_key: String,
    pub prevent_duplicate: bool,
    pub load_relations: bool,
    pub timestamps: TimestampsConfig,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    /// Bare entity over a table with no config of its own (bridge tables).
    pub fn bare(name: &str) -> Self {
        ResolvedEntity {
            name: name.to_string(),
            table_name: name.to_string(),
            primary_key: "id".into(),
            schema: IndexMap::new(),
            relations: Vec::new(),
            user_specific: false,
            user_foreign_key: String::new(),
            prevent_duplicate: false,
            load_relations: false,
            timestamps: TimestampsConfig::default(),
            validation: HashMap::new(),
        }
    }

    /// True when the schema declares the column. An empty schema declares nothing.
    pub fn declares(&self, column: &str) -> bool {
        self.schema.contains_key(column)
    }

    /// Columns maintained by the driver or the database, never part of an update delta.
    pub fn is_managed_timestamp(&self, column: &str) -> bool {
        column == self.timestamps.created || column == self.timestamps.updated
    }

    pub fn has_cascade(&self) -> bool {
        self.relations.iter().any(|r| r.cascade)
    }

    pub fn relation_by_mount(&self, mount: &str) -> Option<&ResolvedRelation> {
        self.relations.iter().find(|r| r.mount == mount)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<Arc<ResolvedEntity>>,
    pub entity_by_name: HashMap<String, Arc<ResolvedEntity>>,
    pub per_page: u64,
    pub max_relation_depth: u32,
    pub debug: bool,
}

impl ResolvedModel {
    pub fn entity_by_name(&self, name: &str) -> Option<&Arc<ResolvedEntity>> {
        self.entity_by_name.get(name)
    }

    /// Entity lookup where absence is a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<ResolvedEntity>, ConfigError> {
        self.entity_by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: name.to_string(),
            })
    }
}
