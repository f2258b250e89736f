//! Execution verbs, relation resolution and validation.

mod crud;
mod relations;
mod validation;
pub use crud::CreateOutcome;
pub use validation::RequestValidator;
