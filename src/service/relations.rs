//! Relation resolution: attach related entities to freshly read records.

use crate::config::{RelationKind, ResolvedEntity, ResolvedRelation};
use crate::context::Context;
use crate::error::{AppError, ConfigError};
use crate::model::{Data, Field, FilterValue, Limit, Model, Where};
use async_recursion::async_recursion;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// `{foreign_key: key}` followed by the relation's extra equality filter.
fn relation_filter(relation: &ResolvedRelation, key: Value) -> Where {
    let mut map: IndexMap<String, FilterValue> = IndexMap::new();
    map.insert(relation.foreign_key.clone(), FilterValue::Eq(key));
    for (col, v) in &relation.filter {
        map.entry(col.clone()).or_insert_with(|| v.clone().into());
    }
    Where::Map(map)
}

fn empty_list(entity: Arc<ResolvedEntity>) -> Model {
    let mut list = Model::new(entity);
    list.set_data(Data::List(Vec::new()));
    list.mark_read();
    list
}

fn missing_option(entity: &ResolvedEntity, relation: &ResolvedRelation, option: &'static str) -> AppError {
    AppError::Config(ConfigError::MissingOption {
        model: entity.name.clone(),
        relation: relation.name.clone(),
        option,
    })
}

impl Context {
    /// Resolve every declared relation of a single, read record.
    #[async_recursion]
    pub(crate) async fn resolve_relations(&mut self, model: &mut Model, depth: u32) -> Result<(), AppError> {
        let entity = model.entity().clone();
        for relation in &entity.relations {
            self.resolve_relation(&entity, model, relation, depth).await?;
        }
        Ok(())
    }

    /// Attach every cascading relation a loaded record is still missing, whatever the
    /// relation-loading flag or depth it was read with. Flattened relations are not attached.
    pub(crate) async fn load_cascades(&mut self, model: &mut Model) -> Result<(), AppError> {
        let entity = model.entity().clone();
        if !entity.has_cascade() {
            return Ok(());
        }
        let depth = model.query().depth();
        if model.is_list() {
            for child in model.items_mut() {
                self.load_missing_cascades(&entity, child, depth).await?;
            }
        } else if model.count() > 0 {
            self.load_missing_cascades(&entity, model, depth).await?;
        }
        Ok(())
    }

    async fn load_missing_cascades(
        &mut self,
        entity: &ResolvedEntity,
        record: &mut Model,
        depth: u32,
    ) -> Result<(), AppError> {
        for relation in entity.relations.iter().filter(|r| r.cascade && !r.flatten) {
            if matches!(record.get(&relation.mount), Some(Field::Related(_))) {
                continue;
            }
            self.resolve_relation(entity, record, relation, depth).await?;
        }
        Ok(())
    }

    async fn resolve_relation(
        &mut self,
        entity: &ResolvedEntity,
        parent: &mut Model,
        relation: &ResolvedRelation,
        depth: u32,
    ) -> Result<(), AppError> {
        let related = self.registry().require(&relation.model)?;
        let key = parent.value(&relation.local_key).cloned().filter(|v| !v.is_null());

        match relation.kind {
            RelationKind::ManyToMany => {
                let list = match key {
                    Some(key) => self.resolve_many_to_many(entity, relation, related, key, depth).await?,
                    None => empty_list(related),
                };
                parent.set(&relation.mount, list);
            }
            RelationKind::HasMany => {
                let list = match key {
                    Some(key) => {
                        let mut sub = Model::new(related);
                        sub.filter(relation_filter(relation, key));
                        sub.query_mut().set_depth(depth + 1);
                        self.read(&mut sub).await?;
                        sub
                    }
                    None => empty_list(related),
                };
                parent.set(&relation.mount, list);
            }
            RelationKind::BelongsTo | RelationKind::HasOne => {
                let Some(key) = key else {
                    return Ok(());
                };
                let mut sub = Model::new(related.clone());
                sub.filter(relation_filter(relation, key))
                    .limit(Limit::One);
                sub.query_mut().set_depth(depth + 1);
                self.read(&mut sub).await?;
                if sub.count() == 0 {
                    return Ok(());
                }
                if relation.flatten {
                    if let Some(mut fields) = sub.record().cloned() {
                        fields.remove(&related.primary_key);
                        parent.set_many(fields, false);
                    }
                } else {
                    parent.set(&relation.mount, sub);
                }
            }
        }
        Ok(())
    }

    /// Bridge rows for the parent, each joined to its related entity through the request cache.
    async fn resolve_many_to_many(
        &mut self,
        entity: &ResolvedEntity,
        relation: &ResolvedRelation,
        related: Arc<ResolvedEntity>,
        key: Value,
        depth: u32,
    ) -> Result<Model, AppError> {
        let bridge_name = relation
            .bridge
            .as_deref()
            .ok_or_else(|| missing_option(entity, relation, "bridge"))?;
        let related_key = relation
            .related_key
            .as_deref()
            .ok_or_else(|| missing_option(entity, relation, "related_key"))?;
        let bridge_entity = self.registry().require(bridge_name)?;

        let mut bridge = Model::new(bridge_entity.clone());
        bridge.filter(relation_filter(relation, key)).with_relations(false);
        self.read(&mut bridge).await?;

        let mut items = Vec::with_capacity(bridge.count());
        for row in bridge.items() {
            let Some(id) = row.value(related_key).cloned().filter(|v| !v.is_null()) else {
                continue;
            };
            let cached = self.cached_relation(&related.name, &id).cloned();
            let mut item = match cached {
                Some(m) => m,
                None => {
                    let mut m = Model::new(related.clone());
                    m.filter(Where::Key(id.clone()));
                    m.query_mut().set_depth(depth + 1);
                    self.read(&mut m).await?;
                    if m.count() == 0 {
                        tracing::warn!(
                            model = %related.name,
                            id = %id,
                            bridge = %bridge_name,
                            "bridge row points at a missing record, skipped"
                        );
                        continue;
                    }
                    self.cache_relation(&related.name, &id, m.clone());
                    m
                }
            };
            if let Some(fields) = row.record() {
                for (col, v) in fields.scalars() {
                    if *col != bridge_entity.primary_key {
                        item.set(col, v.clone());
                    }
                }
            }
            items.push(item);
        }

        let mut list = empty_list(related);
        list.set_data(Data::List(items));
        Ok(list)
    }
}
