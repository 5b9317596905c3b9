//! Scopevar Domain - Core variable types
//!
//! This crate defines the value model, naming rules, scope levels and error
//! taxonomy shared by the variable engine.
//! All types here are pure Rust with no I/O dependencies.

pub mod environment;
pub mod error;
pub mod settings;
pub mod value;

pub use environment::{EnvironmentLookup, NormalizedMap, Sigil, VariableScope, normalize};
pub use error::{VariableError, VariableResult};
pub use settings::GlobalSettings;
pub use value::{AttributeAccess, HostObject, IndexAccess, Record, Slice, Value};
