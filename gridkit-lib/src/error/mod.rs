//! Error types

mod field;
mod filter;
mod provider;
mod validation;

pub use field::*;
pub use filter::*;
pub use provider::*;
pub use validation::*;
