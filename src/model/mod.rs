//! Record containers and the query intent they carry.

mod container;
mod ordering;
mod query;

pub use container::{Data, Field, Model, Record};
pub use ordering::compare_values;
pub use query::{Direction, FilterValue, Limit, Operator, Order, Query, RawFilter, Where};
