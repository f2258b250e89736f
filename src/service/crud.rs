//! Generic create/read/update/delete/count execution through the request context.

use crate::config::ResolvedEntity;
use crate::context::Context;
use crate::error::AppError;
use crate::model::{Data, Field, Model, Record, Where};
use crate::service::RequestValidator;
use crate::session::UserSession;
use crate::sql::{self, bind_all, QueryBuf, Scope};
use async_recursion::async_recursion;
use serde_json::Value;
use sqlx::any::{AnyQueryResult, AnyRow};

/// Result of `Context::create`.
#[derive(Clone, Debug, PartialEq)]
pub enum CreateOutcome {
    /// Row inserted; carries the primary key written back into the record.
    Inserted { id: Option<Value> },
    /// Identical to the caller's previous submission for this model; nothing was inserted.
    Duplicate,
}

impl CreateOutcome {
    pub fn inserted(&self) -> bool {
        matches!(self, CreateOutcome::Inserted { .. })
    }
}

/// A primary key that is absent, null, empty or numeric has not been assigned by storage yet.
fn is_unassigned_key(v: &Value) -> bool {
    match v {
        Value::Null | Value::Number(_) => true,
        Value::String(s) => s.is_empty() || s.parse::<f64>().is_ok(),
        _ => false,
    }
}

fn unscoped(verb: &str, entity: &ResolvedEntity) -> AppError {
    AppError::BadRequest(format!("refusing to {} {} without a filter", verb, entity.name))
}

/// Session-local "last generated key" query for the connected backend.
fn last_insert_id_sql(backend: &str) -> &'static str {
    if backend.eq_ignore_ascii_case("mysql") {
        "SELECT LAST_INSERT_ID()"
    } else {
        "SELECT last_insert_rowid()"
    }
}

fn now_timestamp() -> Value {
    Value::String(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Columns written by UPDATE: scalar fields minus key, managed timestamps and undeclared columns.
fn update_delta(entity: &ResolvedEntity, record: &Record) -> Vec<(String, Value)> {
    record
        .scalars()
        .filter(|(k, _)| **k != entity.primary_key)
        .filter(|(k, _)| !entity.is_managed_timestamp(k))
        .filter(|(k, _)| entity.schema.is_empty() || entity.declares(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn collect_cascades<'a>(entity: &ResolvedEntity, record: &'a mut Record, out: &mut Vec<&'a mut Model>) {
    for (name, field) in record.iter_mut() {
        let cascades = entity
            .relation_by_mount(name)
            .map(|r| r.cascade)
            .unwrap_or(false);
        if !cascades {
            continue;
        }
        if let Field::Related(sub) = field {
            if sub.is_list() {
                out.extend(sub.items_mut().iter_mut());
            } else {
                out.push(sub);
            }
        }
    }
}

/// Cascading relation sub-containers attached to the model, one level of lists flattened.
fn cascade_targets(model: &mut Model) -> Vec<&mut Model> {
    let entity = model.entity().clone();
    let mut targets = Vec::new();
    match model.data_mut() {
        Data::Single(record) => collect_cascades(&entity, record, &mut targets),
        Data::List(items) => {
            for item in items.iter_mut() {
                if let Some(record) = item.record_mut() {
                    collect_cascades(&entity, record, &mut targets);
                }
            }
        }
    }
    targets
}

impl Context {
    fn scope_key(model: &Model) -> Option<Value> {
        if model.is_list() {
            None
        } else {
            model.primary_key().cloned()
        }
    }

    /// Insert the model's record. Strips an unassigned key, applies user scope and the duplicate guard.
    pub async fn create(&mut self, model: &mut Model, data: Option<Record>) -> Result<CreateOutcome, AppError> {
        let entity = model.entity().clone();
        if let Some(data) = data {
            model.set_many(data, false);
        }
        let user = self.user_scope(&entity);
        let record = model
            .record_mut()
            .ok_or_else(|| AppError::BadRequest("create needs a single record, not a list".into()))?;

        if record.value(&entity.primary_key).map(is_unassigned_key).unwrap_or(false) {
            record.remove(&entity.primary_key);
        }
        let fingerprint = entity.prevent_duplicate.then(|| UserSession::fingerprint(record));

        if let Some(user) = user.filter(|u| !u.is_null()) {
            if !record.contains(&entity.user_foreign_key) {
                record.insert(entity.user_foreign_key.clone(), user);
            }
        }
        if entity.declares(&entity.timestamps.created) && !record.contains(&entity.timestamps.created) {
            record.insert(entity.timestamps.created.clone(), now_timestamp());
        }
        RequestValidator::validate(record, &entity.validation)?;

        if let Some(fp) = &fingerprint {
            if self.session().is_duplicate(&entity.name, fp) {
                tracing::warn!(model = %entity.name, "duplicate submission ignored");
                return Ok(CreateOutcome::Duplicate);
            }
        }

        let q = sql::insert(&entity, record);
        let needs_key = !record.contains(&entity.primary_key);
        if needs_key {
            if let Some(id) = self.insert_returning_key(&q).await? {
                model.set(&entity.primary_key, id);
            }
        } else {
            self.execute(&q).await?;
        }
        if let Some(fp) = fingerprint {
            self.session_mut().remember_submission(&entity.name, fp);
        }
        Ok(CreateOutcome::Inserted {
            id: model.primary_key().cloned(),
        })
    }

    pub async fn read(&mut self, model: &mut Model) -> Result<(), AppError> {
        self.read_columns(model, &["*"]).await
    }

    /// SELECT with the accumulated intent, materialize rows, then resolve relations.
    pub async fn read_columns(&mut self, model: &mut Model, columns: &[&str]) -> Result<(), AppError> {
        let entity = model.entity().clone();
        let user = self.user_scope(&entity);
        let key = Self::scope_key(model);
        let q = sql::select(
            &entity,
            model.query(),
            columns,
            Scope {
                implicit_key: key.as_ref(),
                user: user.as_ref(),
            },
        );
        let rows = self.fetch_rows(&q).await?;

        let mut found = true;
        if model.is_single() {
            match rows.into_iter().next() {
                Some(row) => model.set_data(Data::Single(row)),
                None => found = false,
            }
        } else {
            let items = rows
                .into_iter()
                .map(|row| Model::from_row(entity.clone(), row))
                .collect();
            model.set_data(Data::List(items));
        }
        model.mark_read();

        let depth = model.query().depth();
        let load = model.query().loads_relations().unwrap_or(entity.load_relations)
            && !entity.relations.is_empty()
            && depth < self.registry().max_relation_depth;
        if !load || !found {
            return Ok(());
        }
        if model.is_list() {
            for child in model.items_mut() {
                self.resolve_relations(child, depth).await?;
            }
        } else {
            self.resolve_relations(model, depth).await?;
        }
        Ok(())
    }

    /// UPDATE the delta of the model's fields, then cascade to related sub-containers.
    #[async_recursion]
    pub async fn update(
        &mut self,
        model: &mut Model,
        data: Option<Record>,
        filter: Option<Where>,
    ) -> Result<(), AppError> {
        if let Some(filter) = filter {
            model.filter(filter);
        }
        let entity = model.entity().clone();
        let mut sets = match (&data, model.record()) {
            (Some(data), None) => update_delta(&entity, data),
            (_, Some(record)) => {
                let mut merged = record.clone();
                if let Some(data) = &data {
                    merged.extend(data.clone());
                }
                update_delta(&entity, &merged)
            }
            (None, None) => Vec::new(),
        };
        if let Some(data) = data {
            model.set_many(data, false);
        }

        if !sets.is_empty() {
            let partial: Record = sets.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            RequestValidator::validate_partial(&partial, &entity.validation)?;
            if entity.declares(&entity.timestamps.updated) {
                let stamp = now_timestamp();
                model.set(&entity.timestamps.updated, stamp.clone());
                sets.push((entity.timestamps.updated.clone(), stamp));
            }
        }

        let user = self.user_scope(&entity);
        let key = Self::scope_key(model);
        if !sets.is_empty() && model.query().has_no_filter() && key.is_none() && user.is_none() {
            return Err(unscoped("update", &entity));
        }
        let scope = Scope {
            implicit_key: key.as_ref(),
            user: user.as_ref(),
        };
        if let Some(q) = sql::update(&entity, model.query(), &sets, scope) {
            self.execute(&q).await?;
        }

        for target in cascade_targets(model) {
            self.update(target, None, None).await?;
        }
        Ok(())
    }

    /// Delete cascading sub-containers first, then the rows matched by the model, then clear it.
    #[async_recursion]
    pub async fn delete(&mut self, model: &mut Model, filter: Option<Where>) -> Result<(), AppError> {
        if let Some(filter) = filter {
            model.filter(filter);
        }
        let entity = model.entity().clone();
        let user = self.user_scope(&entity);
        if model.query().has_no_filter() && Self::scope_key(model).is_none() && user.is_none() {
            return Err(unscoped("delete from", &entity));
        }

        if entity.has_cascade() {
            if !model.is_read() {
                self.read(model).await?;
            }
            self.load_cascades(model).await?;
        }
        let key = Self::scope_key(model);

        if let Some(id) = &key {
            if !self.begin_delete(&entity.name, id) {
                return Ok(());
            }
        }
        let cascaded = self.delete_cascades(model).await;
        if let Some(id) = &key {
            self.end_delete(&entity.name, id);
        }
        cascaded?;

        let q = sql::delete(
            &entity,
            model.query(),
            Scope {
                implicit_key: key.as_ref(),
                user: user.as_ref(),
            },
        );
        self.execute(&q).await?;
        model.clear();
        Ok(())
    }

    async fn delete_cascades(&mut self, model: &mut Model) -> Result<(), AppError> {
        for target in cascade_targets(model) {
            self.delete(target, None).await?;
        }
        Ok(())
    }

    /// SELECT COUNT(*) with the model's filter.
    pub async fn count(&mut self, model: &Model) -> Result<u64, AppError> {
        let entity = model.entity().clone();
        let user = self.user_scope(&entity);
        let key = Self::scope_key(model);
        let q = sql::count(
            &entity,
            model.query(),
            Scope {
                implicit_key: key.as_ref(),
                user: user.as_ref(),
            },
        );
        let rows = self.fetch_rows(&q).await?;
        let n = rows
            .first()
            .and_then(|r| r.value("count"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0);
        Ok(n)
    }

    /// Paginate with config and session defaults. Counts loaded children once read, otherwise queries the total.
    pub async fn paginate(
        &mut self,
        model: &mut Model,
        per_page: Option<u64>,
        page: Option<u64>,
    ) -> Result<u64, AppError> {
        let per_page = per_page.unwrap_or(self.registry().per_page);
        let page = page.or(self.session().page).unwrap_or(1);
        let total = if model.is_read() {
            model.items().len() as u64
        } else {
            self.count(model).await?
        };
        model.paginate(per_page, page, total);
        Ok(model.pages().unwrap_or(0))
    }

    pub(crate) async fn fetch_rows(&mut self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        self.log_statement(&q.sql);
        let query = bind_all(sqlx::query(&q.sql), &q.params);
        match query.fetch_all(self.pool()).await {
            Ok(rows) => Ok(rows.iter().map(row_to_record).collect()),
            Err(e) => Err(self.execution_error(q, e)),
        }
    }

    pub(crate) async fn execute(&mut self, q: &QueryBuf) -> Result<AnyQueryResult, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        self.log_statement(&q.sql);
        let query = bind_all(sqlx::query(&q.sql), &q.params);
        match query.execute(self.pool()).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.execution_error(q, e)),
        }
    }

    /// INSERT and read back the generated key on the same connection.
    /// Drivers that report no key through the query result are asked with a follow-up SELECT.
    async fn insert_returning_key(&mut self, q: &QueryBuf) -> Result<Option<i64>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        self.log_statement(&q.sql);
        let mut conn = match self.pool().acquire().await {
            Ok(conn) => conn,
            Err(e) => return Err(self.execution_error(q, e)),
        };
        let result = match bind_all(sqlx::query(&q.sql), &q.params).execute(&mut *conn).await {
            Ok(result) => result,
            Err(e) => return Err(self.execution_error(q, e)),
        };
        if let Some(id) = result.last_insert_id() {
            return Ok(Some(id));
        }

        let lookup = QueryBuf {
            sql: last_insert_id_sql(conn.backend_name()).to_string(),
            params: Vec::new(),
        };
        tracing::debug!(sql = %lookup.sql, "query");
        self.log_statement(&lookup.sql);
        match sqlx::query(&lookup.sql).fetch_one(&mut *conn).await {
            Ok(row) => {
                use sqlx::Row;
                Ok(row.try_get::<Option<i64>, _>(0).ok().flatten())
            }
            Err(e) => Err(self.execution_error(&lookup, e)),
        }
    }

    /// Debug mode keeps the statement and parameters; otherwise callers only see "not found".
    fn execution_error(&self, q: &QueryBuf, e: sqlx::Error) -> AppError {
        tracing::error!(sql = %q.sql, params = ?q.params, error = %e, "statement failed");
        if self.debug() {
            AppError::Query {
                sql: q.interpolate(),
                params: serde_json::to_string(&q.params).unwrap_or_default(),
                source: e,
            }
        } else {
            AppError::NotFound("record".into())
        }
    }
}

fn row_to_record(row: &AnyRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.ordinal())))
        .collect()
}

fn cell_to_value(row: &AnyRow, idx: usize) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return Value::String(String::from_utf8_lossy(&bytes).into_owned());
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_key_lookup_follows_the_backend() {
        assert_eq!(last_insert_id_sql("MySQL"), "SELECT LAST_INSERT_ID()");
        assert_eq!(last_insert_id_sql("SQLite"), "SELECT last_insert_rowid()");
    }

    #[test]
    fn numeric_looking_keys_are_unassigned() {
        assert!(is_unassigned_key(&json!(5)));
        assert!(is_unassigned_key(&json!("12")));
        assert!(is_unassigned_key(&json!("")));
        assert!(is_unassigned_key(&Value::Null));
        assert!(!is_unassigned_key(&json!("3f2a-uuid")));
    }

    #[test]
    fn delta_skips_key_timestamps_and_undeclared_columns() {
        let mut entity = ResolvedEntity::bare("posts");
        let record = Record::from_iter([
            ("id", json!(1)),
            ("title", json!("t")),
            ("updated", json!("2024-01-01")),
            ("author_name", json!("flattened")),
        ]);
        let delta = update_delta(&entity, &record);
        assert_eq!(delta.len(), 2);

        entity.schema.insert("id".into(), "INTEGER".into());
        entity.schema.insert("title".into(), "TEXT".into());
        let delta = update_delta(&entity, &record);
        assert_eq!(delta, vec![("title".to_string(), json!("t"))]);
    }
}
