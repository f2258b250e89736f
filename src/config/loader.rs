//! Load config from layered JSON documents and resolve it into the runtime registry.

use crate::config::resolved::{ResolvedEntity, ResolvedModel, ResolvedRelation};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else is replaced.
pub fn merge_layer(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (k, v) in overlay {
                match base.get_mut(&k) {
                    Some(existing) => merge_layer(existing, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Merge layers in order (framework defaults, module defaults, app overrides) into one config.
pub fn load_layers<I>(layers: I) -> Result<FullConfig, ConfigError>
where
    I: IntoIterator<Item = Value>,
{
    let mut merged = Value::Object(serde_json::Map::new());
    for layer in layers {
        if !layer.is_object() {
            return Err(ConfigError::Load("config layer must be a JSON object".into()));
        }
        merge_layer(&mut merged, layer);
    }
    serde_json::from_value(merged).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read JSON files and merge them in the given order. Missing files are an error.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<FullConfig, ConfigError> {
    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let layer: Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "config layer loaded");
        layers.push(layer);
    }
    load_layers(layers)
}

/// Apply `DATABASE_URL` and `APP_DEBUG` from the environment (and `.env`, if present).
pub fn apply_env_overrides(config: &mut FullConfig) {
    dotenvy::dotenv().ok();
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(debug) = std::env::var("APP_DEBUG") {
        config.database.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
}

/// Build the resolved registry from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::new();
    let mut entity_by_name: HashMap<String, Arc<ResolvedEntity>> = HashMap::new();
    let mut bridges: Vec<String> = Vec::new();

    for (name, model) in &config.models {
        let primary_key = model.primary_key.clone().unwrap_or_else(|| "id".into());
        let mut relations = Vec::with_capacity(model.relations.len());
        for (rel_name, rel) in &model.relations {
            let related_name = rel.model.clone().unwrap_or_else(|| rel_name.clone());
            let related = config
                .models
                .get(&related_name)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: related_name.clone(),
                })?;
            let related_pk = related.primary_key.clone().unwrap_or_else(|| "id".into());

            let (local_key, foreign_key) = match rel.kind {
                RelationKind::BelongsTo => (
                    rel.local_key.clone().unwrap_or_else(|| format!("{}_id", related_name)),
                    rel.foreign_key.clone().unwrap_or(related_pk),
                ),
                RelationKind::HasOne | RelationKind::HasMany | RelationKind::ManyToMany => (
                    rel.local_key.clone().unwrap_or_else(|| primary_key.clone()),
                    rel.foreign_key.clone().unwrap_or_else(|| format!("{}_id", name)),
                ),
            };

            let (bridge, related_key) = match rel.kind {
                RelationKind::ManyToMany => {
                    let bridge_table = rel.bridge.clone().ok_or_else(|| ConfigError::MissingOption {
                        model: name.clone(),
                        relation: rel_name.clone(),
                        option: "bridge",
                    })?;
                    let bridge_name = bridge_entity_name(config, &bridge_table);
                    if !config.models.contains_key(&bridge_name) && !bridges.contains(&bridge_name) {
                        bridges.push(bridge_name.clone());
                    }
                    (
                        Some(bridge_name),
                        Some(rel.related_key.clone().unwrap_or_else(|| format!("{}_id", related_name))),
                    )
                }
                _ => (None, None),
            };

            relations.push(ResolvedRelation {
                name: rel_name.clone(),
                kind: rel.kind,
                model: related_name,
                local_key,
                foreign_key,
                bridge,
                related_key,
                flatten: rel.flatten,
                cascade: rel.cascade.unwrap_or(model.cascade),
                mount: rel.mount.clone().unwrap_or_else(|| rel_name.clone()),
                filter: rel.where_.clone(),
            });
        }

        let entity = Arc::new(ResolvedEntity {
            name: name.clone(),
            table_name: model.table.clone().unwrap_or_else(|| name.clone()),
            primary_key,
            schema: model.schema.clone(),
            load_relations: model.load_relations.unwrap_or(!relations.is_empty()),
            relations,
            user_specific: model.user_specific,
            user_foreign_key: config.user.foreign_key.clone(),
            prevent_duplicate: model.prevent_duplicate,
            timestamps: model.timestamps.clone(),
            validation: model.validation.clone(),
        });
        entity_by_name.insert(name.clone(), entity.clone());
        entities.push(entity);
    }

    for bridge in bridges {
        let entity = Arc::new(ResolvedEntity::bare(&bridge));
        entity_by_name.insert(bridge, entity.clone());
        entities.push(entity);
    }

    tracing::info!(models = entities.len(), "model registry resolved");
    Ok(ResolvedModel {
        entities,
        entity_by_name,
        per_page: config.pagination.per_page,
        max_relation_depth: config.relations.max_depth,
        debug: config.database.debug,
    })
}

/// A bridge may name a configured model, or a table owned by one; otherwise it stands alone.
fn bridge_entity_name(config: &FullConfig, bridge: &str) -> String {
    if config.models.contains_key(bridge) {
        return bridge.to_string();
    }
    config
        .models
        .iter()
        .find(|(_, m)| m.table.as_deref() == Some(bridge))
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| bridge.to_string())
}
