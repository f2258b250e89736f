//! Safe SQL builder: sanitized identifiers, values as bound parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
