//! Query intent: filters, ordering and limits accumulated before a verb runs.

use indexmap::IndexMap;
use serde_json::Value;

/// Boolean operator joining every filter entry of one query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One filter entry: equality, or equality against any of several values.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Eq(Value),
    Any(Vec<Value>),
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Array(values) => FilterValue::Any(values),
            other => FilterValue::Eq(other),
        }
    }
}

/// Argument of `Model::filter`. A bare key selects one record by primary key.
#[derive(Clone, Debug, PartialEq)]
pub enum Where {
    Key(Value),
    Map(IndexMap<String, FilterValue>),
}

impl From<Value> for Where {
    fn from(v: Value) -> Self {
        match v {
            Value::Object(map) => Where::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            other => Where::Key(other),
        }
    }
}

impl From<i64> for Where {
    fn from(v: i64) -> Self {
        Where::Key(v.into())
    }
}

impl From<i32> for Where {
    fn from(v: i32) -> Self {
        Where::Key(v.into())
    }
}

impl From<&str> for Where {
    fn from(v: &str) -> Self {
        Where::Key(v.into())
    }
}

impl From<String> for Where {
    fn from(v: String) -> Self {
        Where::Key(v.into())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Where
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(entries: [(K, V); N]) -> Self {
        Where::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), FilterValue::from(v.into())))
                .collect(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    /// Exactly one record, materialized in single mode.
    One,
    Count(u64),
    Window { offset: u64, count: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Raw SQL appended to the WHERE clause with its own bound parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFilter {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    filter: IndexMap<String, FilterValue>,
    operator: Operator,
    raw: Option<RawFilter>,
    order: Option<Order>,
    limit: Option<Limit>,
    with_relations: Option<bool>,
    depth: u32,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge entries into the filter; the operator applies to the whole filter.
    pub fn filter<I>(&mut self, entries: I, operator: Operator) -> &mut Self
    where
        I: IntoIterator<Item = (String, FilterValue)>,
    {
        self.filter.extend(entries);
        self.operator = operator;
        self
    }

    pub fn raw(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.raw = Some(RawFilter {
            sql: sql.into(),
            params,
        });
        self
    }

    pub fn limit(&mut self, limit: Limit) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn clear_limit(&mut self) -> &mut Self {
        self.limit = None;
        self
    }

    pub fn order(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn with_relations(&mut self, load: bool) -> &mut Self {
        self.with_relations = Some(load);
        self
    }

    pub(crate) fn set_depth(&mut self, depth: u32) -> &mut Self {
        self.depth = depth;
        self
    }

    pub fn is_single(&self) -> bool {
        self.limit == Some(Limit::One)
    }

    pub fn filters(&self) -> &IndexMap<String, FilterValue> {
        &self.filter
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn raw_filter(&self) -> Option<&RawFilter> {
        self.raw.as_ref()
    }

    pub fn order_by(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn limit_intent(&self) -> Option<Limit> {
        self.limit
    }

    /// Explicit relation-loading choice, if any; the entity default applies otherwise.
    pub fn loads_relations(&self) -> Option<bool> {
        self.with_relations
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// No explicit filter entries and no raw fragment.
    pub fn has_no_filter(&self) -> bool {
        self.filter.is_empty() && self.raw.is_none()
    }
}
