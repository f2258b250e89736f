//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity and query intent.

use crate::config::ResolvedEntity;
use crate::model::{FilterValue, Limit, Query, Record};
use serde_json::Value;

/// Reduce an identifier to `[A-Za-z0-9_]`.
pub fn identifier(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> &'static str {
        self.params.push(v);
        "?"
    }

    /// Statement with parameters inlined as literals. For diagnostics only, never executed.
    pub fn interpolate(&self) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 4);
        let mut params = self.params.iter();
        let mut in_quote = false;
        for c in self.sql.chars() {
            match c {
                '\'' => {
                    in_quote = !in_quote;
                    out.push(c);
                }
                '?' if !in_quote => match params.next() {
                    Some(v) => out.push_str(&literal(v)),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
        out
    }
}

fn literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".into(),
        Value::Bool(b) => if *b { "TRUE".into() } else { "FALSE".into() },
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Scope of one statement beyond the query intent itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scope<'a> {
    /// Primary-key value of a loaded record; used when the query has no explicit filter.
    pub implicit_key: Option<&'a Value>,
    /// Current user id for user-specific entities (`Null` when nobody is signed in).
    pub user: Option<&'a Value>,
}

fn render_entry(q: &mut QueryBuf, column: &str, value: &FilterValue) -> String {
    let col = identifier(column);
    let eq = |q: &mut QueryBuf, v: &Value| -> String {
        if v.is_null() {
            format!("{} IS NULL", col)
        } else {
            format!("{} = {}", col, q.push_param(v.clone()))
        }
    };
    match value {
        FilterValue::Eq(v) => eq(q, v),
        FilterValue::Any(values) if values.is_empty() => "1 = 0".into(),
        FilterValue::Any(values) => {
            let parts: Vec<String> = values.iter().map(|v| eq(q, v)).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

/// WHERE clause (with leading space) or empty. User scope is always AND-joined; the raw fragment uses the query operator.
fn where_clause(q: &mut QueryBuf, entity: &ResolvedEntity, query: &Query, scope: Scope<'_>) -> String {
    let op = query.operator().as_sql();
    let mut parts = Vec::new();
    if query.has_no_filter() {
        if let Some(key) = scope.implicit_key {
            parts.push(render_entry(q, &entity.primary_key, &FilterValue::Eq(key.clone())));
        }
    } else {
        for (column, value) in query.filters() {
            parts.push(render_entry(q, column, value));
        }
    }
    let mut clause = parts.join(&format!(" {} ", op));

    if let Some(user) = scope.user {
        let user_part = render_entry(q, &entity.user_foreign_key, &FilterValue::Eq(user.clone()));
        if clause.is_empty() {
            clause = user_part;
        } else {
            clause = format!("{} AND {}", clause, user_part);
        }
    }

    if let Some(raw) = query.raw_filter() {
        q.params.extend(raw.params.iter().cloned());
        if clause.is_empty() {
            clause = raw.sql.clone();
        } else {
            clause = format!("{} {} {}", clause, op, raw.sql);
        }
    }

    if clause.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clause)
    }
}

fn order_clause(entity: &ResolvedEntity, query: &Query) -> String {
    if query.is_single() {
        return String::new();
    }
    let pk = identifier(&entity.primary_key);
    match query.order_by() {
        Some(order) => {
            let col = identifier(&order.column);
            if col == pk {
                format!(" ORDER BY {} {}", col, order.direction.as_sql())
            } else {
                format!(" ORDER BY {} {}, {} ASC", col, order.direction.as_sql(), pk)
            }
        }
        None => format!(" ORDER BY {} ASC", pk),
    }
}

fn limit_clause(limit: Option<Limit>) -> String {
    match limit {
        None | Some(Limit::One) => String::new(),
        Some(Limit::Count(n)) => format!(" LIMIT {}", n),
        Some(Limit::Window { offset, count }) => format!(" LIMIT {},{}", offset, count),
    }
}

fn column_list(columns: &[&str]) -> String {
    let cols: Vec<String> = columns
        .iter()
        .map(|c| if *c == "*" { "*".to_string() } else { identifier(c) })
        .filter(|c| !c.is_empty())
        .collect();
    if cols.is_empty() {
        "*".into()
    } else {
        cols.join(", ")
    }
}

/// SELECT <columns> FROM <table> <WHERE> <ORDER> <LIMIT>.
pub fn select(entity: &ResolvedEntity, query: &Query, columns: &[&str], scope: Scope<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, query, scope);
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        column_list(columns),
        identifier(&entity.table_name),
        where_sql,
        order_clause(entity, query),
        limit_clause(query.limit_intent())
    );
    q
}

/// SELECT COUNT(*) with the filter only.
pub fn count(entity: &ResolvedEntity, query: &Query, scope: Scope<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, query, scope);
    q.sql = format!(
        "SELECT COUNT(*) AS count FROM {}{}",
        identifier(&entity.table_name),
        where_sql
    );
    q
}

/// INSERT every scalar field of the record as a column.
pub fn insert(entity: &ResolvedEntity, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = identifier(&entity.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, value) in record.scalars() {
        cols.push(identifier(name));
        placeholders.push(q.push_param(value.clone()));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// UPDATE <table> SET ... <WHERE>. Returns None when there is nothing to set.
pub fn update(
    entity: &ResolvedEntity,
    query: &Query,
    sets: &[(String, Value)],
    scope: Scope<'_>,
) -> Option<QueryBuf> {
    if sets.is_empty() {
        return None;
    }
    let mut q = QueryBuf::new();
    let assignments: Vec<String> = sets
        .iter()
        .map(|(col, v)| format!("{} = {}", identifier(col), q.push_param(v.clone())))
        .collect();
    let where_sql = where_clause(&mut q, entity, query, scope);
    q.sql = format!(
        "UPDATE {} SET {}{}",
        identifier(&entity.table_name),
        assignments.join(", "),
        where_sql
    );
    Some(q)
}

/// DELETE FROM <table> <WHERE> <LIMIT>. Only a plain count limit applies to DELETE.
pub fn delete(entity: &ResolvedEntity, query: &Query, scope: Scope<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, query, scope);
    let limit = match query.limit_intent() {
        Some(Limit::Count(n)) => format!(" LIMIT {}", n),
        _ => String::new(),
    };
    q.sql = format!(
        "DELETE FROM {}{}{}",
        identifier(&entity.table_name),
        where_sql,
        limit
    );
    q
}
