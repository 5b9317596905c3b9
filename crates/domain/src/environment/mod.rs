//! Variable naming, scope and environment domain types

mod lookup;
mod normalized;
mod variable;

pub use lookup::EnvironmentLookup;
pub use normalized::{NormalizedMap, normalize};
pub use variable::{Sigil, VariableScope};
