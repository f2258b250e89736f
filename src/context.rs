//! Request-scoped context: pool handle, relation cache, statement log and caller session.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::model::Model;
use crate::session::UserSession;
use crate::state::AppState;
use serde_json::Value;
use sqlx::AnyPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct Context {
    pool: AnyPool,
    model: Arc<ResolvedModel>,
    session: UserSession,
    /// Related entities fetched through bridges, keyed by (entity, id). Never invalidated.
    relation_cache: HashMap<(String, String), Model>,
    statements: Vec<String>,
    /// (entity, key) of records whose cascading delete is under way.
    deleting: HashSet<(String, String)>,
}

impl Context {
    pub fn new(state: &AppState, session: UserSession) -> Self {
        Context {
            pool: state.pool.clone(),
            model: state.model.clone(),
            session,
            relation_cache: HashMap::new(),
            statements: Vec::new(),
            deleting: HashSet::new(),
        }
    }

    /// Fresh container for a registered model.
    pub fn model(&self, name: &str) -> Result<Model, AppError> {
        Ok(Model::new(self.model.require(name)?))
    }

    pub fn registry(&self) -> &ResolvedModel {
        &self.model
    }

    pub fn session(&self) -> &UserSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut UserSession {
        &mut self.session
    }

    /// End the request and hand the session back for persistence.
    pub fn into_session(self) -> UserSession {
        self.session
    }

    /// Every statement executed through this context, in order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn statements_starting_with(&self, prefix: &str) -> usize {
        self.statements.iter().filter(|s| s.starts_with(prefix)).count()
    }

    pub fn debug(&self) -> bool {
        self.model.debug
    }

    pub(crate) fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub(crate) fn log_statement(&mut self, sql: &str) {
        self.statements.push(sql.to_string());
    }

    /// User filter value for user-specific entities: the current id, or `Null` when signed out.
    pub(crate) fn user_scope(&self, entity: &ResolvedEntity) -> Option<Value> {
        entity
            .user_specific
            .then(|| self.session.user_id.clone().unwrap_or(Value::Null))
    }

    /// False when the record is already being deleted further up the cascade.
    pub(crate) fn begin_delete(&mut self, entity: &str, id: &Value) -> bool {
        self.deleting.insert((entity.to_string(), id.to_string()))
    }

    pub(crate) fn end_delete(&mut self, entity: &str, id: &Value) {
        self.deleting.remove(&(entity.to_string(), id.to_string()));
    }

    pub(crate) fn cached_relation(&self, entity: &str, id: &Value) -> Option<&Model> {
        self.relation_cache.get(&(entity.to_string(), id.to_string()))
    }

    pub(crate) fn cache_relation(&mut self, entity: &str, id: &Value, model: Model) {
        self.relation_cache.insert((entity.to_string(), id.to_string()), model);
    }
}
