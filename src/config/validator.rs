//! Config validation: referential integrity of relations and identifier hygiene.

use crate::config::{FullConfig, RelationKind};
use crate::error::ConfigError;
use crate::sql::identifier;

fn check_identifier(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || identifier(name) != name {
        return Err(ConfigError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.pagination.per_page == 0 {
        return Err(ConfigError::Validation("pagination.per_page must be positive".into()));
    }
    check_identifier(&config.user.foreign_key)?;

    for (name, model) in &config.models {
        check_identifier(name)?;
        if let Some(table) = &model.table {
            check_identifier(table)?;
        }
        if let Some(pk) = &model.primary_key {
            check_identifier(pk)?;
        }
        for column in model.schema.keys() {
            check_identifier(column)?;
        }

        for (rel_name, rel) in &model.relations {
            check_identifier(rel_name)?;
            let related = rel.model.as_deref().unwrap_or(rel_name);
            if !config.models.contains_key(related) {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: related.to_string(),
                });
            }
            for key in [&rel.local_key, &rel.foreign_key, &rel.related_key, &rel.bridge, &rel.mount]
                .into_iter()
                .flatten()
            {
                check_identifier(key)?;
            }
            for column in rel.where_.keys() {
                check_identifier(column)?;
            }
            if rel.kind == RelationKind::ManyToMany && rel.bridge.is_none() {
                return Err(ConfigError::MissingOption {
                    model: name.clone(),
                    relation: rel_name.clone(),
                    option: "bridge",
                });
            }
            if rel.flatten && !rel.kind.is_singular() {
                return Err(ConfigError::Validation(format!(
                    "model '{}' relation '{}': flatten requires belongs_to or has_one",
                    name, rel_name
                )));
            }
        }
    }

    Ok(())
}
