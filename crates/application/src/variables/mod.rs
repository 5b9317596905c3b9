//! Variable storage and scoping
//!
//! - [`VariableStore`] holds the bindings of one frame
//! - [`Variables`] is a frame with lookup and substitution
//! - [`DeferredValue`] is a variable table value resolved on first read
//! - [`VariableScopes`] is the global/suite/test/keyword stack
//! - [`VariableAssigner`] distributes return values over targets

mod assigner;
mod deferred;
mod frame;
mod globals;
mod scopes;
mod store;

pub use assigner::VariableAssigner;
pub use deferred::{DeferredKind, DeferredValue, DictItem, ErrorReporter};
pub use frame::Variables;
pub use globals::GlobalVariables;
pub use scopes::VariableScopes;
pub use store::{StoreEntry, VariableStore};
