//! Record container: one record or a list of records of a single entity.

use crate::config::ResolvedEntity;
use crate::model::ordering::compare_values;
use crate::model::query::{Direction, Limit, Operator, Query, Where};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// A field is a scalar column value or an attached relation.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Value(Value),
    Related(Model),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            Field::Related(_) => None,
        }
    }

    pub fn as_related(&self) -> Option<&Model> {
        match self {
            Field::Related(m) => Some(m),
            Field::Value(_) => None,
        }
    }

    pub fn to_structured(&self) -> Value {
        match self {
            Field::Value(v) => v.clone(),
            Field::Related(m) => m.to_structured(),
        }
    }
}

impl From<Value> for Field {
    fn from(v: Value) -> Self {
        Field::Value(v)
    }
}

impl From<Model> for Field {
    fn from(m: Model) -> Self {
        Field::Related(m)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::Value(v.into())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::Value(v.into())
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Value(v.into())
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Value(v.into())
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Field::Value(v.into())
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Field::Value(v.into())
    }
}

/// Ordered field mapping of one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record(IndexMap<String, Field>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Field> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Field> {
        self.0.get_mut(field)
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.0.get(field).and_then(Field::as_value)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Field>) -> Option<Field> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Field> {
        self.0.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Field)> {
        self.0.iter_mut()
    }

    /// Scalar fields only, in insertion order.
    pub fn scalars(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter_map(|(k, f)| f.as_value().map(|v| (k, v)))
    }

    pub fn extend(&mut self, other: Record) {
        self.0.extend(other.0);
    }

    pub fn to_structured(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, f)| (k.clone(), f.to_structured()))
                .collect(),
        )
    }
}

impl From<serde_json::Map<String, Value>> for Record {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Record(map.into_iter().map(|(k, v)| (k, Field::Value(v))).collect())
    }
}

impl<K: Into<String>, F: Into<Field>> FromIterator<(K, F)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, F)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, f)| (k.into(), f.into())).collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Field);
    type IntoIter = indexmap::map::IntoIter<String, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Materialized content: exactly one record, or positional child containers.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    Single(Record),
    List(Vec<Model>),
}

#[derive(Clone, Debug)]
pub struct Model {
    entity: Arc<ResolvedEntity>,
    query: Query,
    data: Data,
    read: bool,
    pages: Option<u64>,
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.entity.name == other.entity.name && self.data == other.data
    }
}

impl Model {
    /// Fresh container holding an empty record, ready to be filled or queried.
    pub fn new(entity: Arc<ResolvedEntity>) -> Self {
        Model {
            entity,
            query: Query::new(),
            data: Data::Single(Record::new()),
            read: false,
            pages: None,
        }
    }

    /// Child container for one materialized row, scoped to its own primary key.
    pub(crate) fn from_row(entity: Arc<ResolvedEntity>, record: Record) -> Self {
        let mut query = Query::new();
        if let Some(pk) = record.value(&entity.primary_key).cloned() {
            query.filter([(entity.primary_key.clone(), pk.into())], Operator::And);
        }
        query.limit(Limit::One);
        Model {
            entity,
            query,
            data: Data::Single(record),
            read: true,
            pages: None,
        }
    }

    pub fn entity(&self) -> &Arc<ResolvedEntity> {
        &self.entity
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Query {
        &mut self.query
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Data {
        &mut self.data
    }

    pub(crate) fn set_data(&mut self, data: Data) {
        self.data = data;
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub(crate) fn mark_read(&mut self) {
        self.read = true;
    }

    pub fn pages(&self) -> Option<u64> {
        self.pages
    }

    pub fn is_single(&self) -> bool {
        self.query.is_single()
    }

    pub fn is_list(&self) -> bool {
        matches!(self.data, Data::List(_))
    }

    /// Children in list mode, fields in single mode.
    pub fn count(&self) -> usize {
        match &self.data {
            Data::Single(record) => record.len(),
            Data::List(items) => items.len(),
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.data {
            Data::Single(record) => Some(record),
            Data::List(_) => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match &mut self.data {
            Data::Single(record) => Some(record),
            Data::List(_) => None,
        }
    }

    pub fn items(&self) -> &[Model] {
        match &self.data {
            Data::List(items) => items,
            Data::Single(_) => &[],
        }
    }

    pub fn items_mut(&mut self) -> &mut [Model] {
        match &mut self.data {
            Data::List(items) => items,
            Data::Single(_) => &mut [],
        }
    }

    pub fn get(&self, field: &str) -> Option<&Field> {
        self.record().and_then(|r| r.get(field))
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.record().and_then(|r| r.value(field))
    }

    pub fn related(&self, field: &str) -> Option<&Model> {
        self.get(field).and_then(Field::as_related)
    }

    /// Assign one field. In list mode the assignment applies to every child.
    pub fn set(&mut self, field: &str, value: impl Into<Field>) -> &mut Self {
        let value = value.into();
        match &mut self.data {
            Data::Single(record) => {
                record.insert(field, value);
            }
            Data::List(items) => {
                for item in items {
                    item.set(field, value.clone());
                }
            }
        }
        self
    }

    pub fn unset(&mut self, field: &str) -> Option<Field> {
        self.record_mut().and_then(|r| r.remove(field))
    }

    /// Bulk assign; `overwrite` clears existing fields first.
    pub fn set_many(&mut self, data: impl Into<Record>, overwrite: bool) -> &mut Self {
        let data = data.into();
        match &mut self.data {
            Data::Single(record) => {
                if overwrite {
                    record.clear();
                }
                record.extend(data);
            }
            Data::List(items) => {
                for item in items {
                    item.set_many(data.clone(), overwrite);
                }
            }
        }
        self
    }

    /// Current primary-key value of a single record, if assigned.
    pub fn primary_key(&self) -> Option<&Value> {
        self.value(&self.entity.primary_key).filter(|v| !v.is_null())
    }

    /// Drop all loaded data, keeping the current mode.
    pub(crate) fn clear(&mut self) {
        match &mut self.data {
            Data::Single(record) => record.clear(),
            Data::List(items) => items.clear(),
        }
    }

    /// Filter by a map (AND). A bare key selects one record by primary key.
    pub fn filter(&mut self, filter: impl Into<Where>) -> &mut Self {
        self.filter_op(filter, Operator::And)
    }

    pub fn filter_op(&mut self, filter: impl Into<Where>, operator: Operator) -> &mut Self {
        match filter.into() {
            Where::Key(key) => {
                let pk = self.entity.primary_key.clone();
                self.query.filter([(pk, key.into())], operator).limit(Limit::One);
            }
            Where::Map(map) => {
                self.query.filter(map, operator);
            }
        }
        self
    }

    pub fn raw_filter(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.query.raw(sql, params);
        self
    }

    pub fn limit(&mut self, limit: Limit) -> &mut Self {
        self.query.limit(limit);
        self
    }

    pub fn with_relations(&mut self, load: bool) -> &mut Self {
        self.query.with_relations(load);
        self
    }

    /// Record the ordering and, once read, sort loaded children now. Equal keys keep their order.
    pub fn order(&mut self, column: &str, direction: Direction) -> &mut Self {
        self.query.order(column, direction);
        if self.read {
            if let Data::List(items) = &mut self.data {
                items.sort_by(|a, b| {
                    let ord = compare_values(a.value(column), b.value(column));
                    match direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                });
            }
        }
        self
    }

    /// Window the query to one page of `total` rows and, once read, slice loaded children.
    pub fn paginate(&mut self, per_page: u64, page: u64, total: u64) -> &mut Self {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.pages = Some(total.div_ceil(per_page));
        self.query.limit(Limit::Window {
            offset,
            count: per_page,
        });
        if self.read {
            if let Data::List(items) = &mut self.data {
                let kept: Vec<Model> = std::mem::take(items)
                    .into_iter()
                    .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                    .take(per_page as usize)
                    .collect();
                *items = kept;
            }
        }
        self
    }

    /// Plain nested JSON: objects for records, arrays for lists.
    pub fn to_structured(&self) -> Value {
        match &self.data {
            Data::Single(record) => record.to_structured(),
            Data::List(items) => Value::Array(items.iter().map(Model::to_structured).collect()),
        }
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_structured().serialize(serializer)
    }
}
