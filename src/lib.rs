//! Record SDK: configuration-driven record containers, query intent and SQL execution.

pub mod config;
pub mod context;
pub mod error;
pub mod migration;
pub mod model;
pub mod service;
pub mod session;
pub mod sql;
pub mod state;

pub use config::{resolve, FullConfig, ResolvedEntity, ResolvedModel, ResolvedRelation};
pub use context::Context;
pub use error::{AppError, ConfigError};
pub use migration::{apply_migrations, create_table};
pub use model::{Data, Direction, Field, FilterValue, Limit, Model, Operator, Record, Where};
pub use service::{CreateOutcome, RequestValidator};
pub use session::UserSession;
pub use state::AppState;
