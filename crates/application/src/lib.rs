//! Scopevar Application - Variable resolution and scoping
//!
//! This crate contains the engine that turns templates such as
//! `Hello, ${name}!` into values:
//! - `variable_resolver`: reference scanning, finders, substitution and the
//!   [`VariableEngine`] facade
//! - `variables`: scope frames, deferred values, the scope stack and
//!   return value assignment

pub mod variable_resolver;
pub mod variables;

pub use variable_resolver::{BulkValue, VariableEngine};
pub use variables::{GlobalVariables, VariableAssigner, VariableScopes, Variables};
