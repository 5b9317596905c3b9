//! Variable resolution module
//!
//! Scans `${scalar}`, `@{list}`, `&{dict}`, `%{ENV}` and `*{reserved}`
//! references, resolves them through a chain of finders, and substitutes
//! them into templates.
//!
//! # Usage
//!
//! ```
//! use scopevar_application::variable_resolver::VariableEngine;
//! use scopevar_domain::{GlobalSettings, Value};
//!
//! let mut engine = VariableEngine::from_settings(&GlobalSettings::new()).unwrap();
//! engine.enter_suite();
//! engine.assign("${name}", Value::from("world")).unwrap();
//!
//! let greeting = engine.substitute_string("Hello, ${name}!").unwrap();
//! assert_eq!(greeting, "Hello, world!");
//! ```

pub mod engine;
pub mod escaping;
pub mod evaluation;
pub mod finders;
pub mod notfound;
pub mod replacer;
pub mod search;
pub mod splitting;

pub use engine::{BulkValue, VariableEngine};
pub use escaping::{escape, unescape};
pub use finders::{Finder, VariableFinder};
pub use replacer::VariableReplacer;
pub use search::{
    VariableMatch, VariableMatches, VariableSearcher, is_assign, is_dict_variable,
    is_list_variable, is_variable, search_variable,
};
pub use splitting::split_from_equals;
