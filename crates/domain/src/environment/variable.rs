//! Variable sigils and scope levels

use serde::{Deserialize, Serialize};

/// The type identifier that starts a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sigil {
    /// `${name}`: any value.
    Scalar,
    /// `@{name}`: a list-like value, expanded in place in sequences.
    List,
    /// `&{name}`: a dictionary value.
    Dict,
    /// `%{NAME}`: an environment variable.
    Environment,
    /// `*{...}`: reserved syntax, never resolved.
    Reserved,
}

impl Sigil {
    /// All sigils in scanning order.
    pub const ALL: [Self; 5] = [
        Self::Scalar,
        Self::List,
        Self::Dict,
        Self::Environment,
        Self::Reserved,
    ];

    /// Parses a sigil character.
    #[must_use]
    pub const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '$' => Some(Self::Scalar),
            '@' => Some(Self::List),
            '&' => Some(Self::Dict),
            '%' => Some(Self::Environment),
            '*' => Some(Self::Reserved),
            _ => None,
        }
    }

    /// Returns the sigil character.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Scalar => '$',
            Self::List => '@',
            Self::Dict => '&',
            Self::Environment => '%',
            Self::Reserved => '*',
        }
    }

    /// Returns true if references with this sigil may carry `[item]` accessors.
    #[must_use]
    pub const fn can_have_items(self) -> bool {
        matches!(self, Self::Scalar | Self::List | Self::Dict)
    }

    /// Returns true if variables with this sigil can be stored and assigned.
    #[must_use]
    pub const fn is_assignable(self) -> bool {
        matches!(self, Self::Scalar | Self::List | Self::Dict)
    }

    /// Decorates a bare name, e.g. `name` -> `${name}`.
    #[must_use]
    pub fn decorate(self, name: &str) -> String {
        format!("{}{{{name}}}", self.as_char())
    }
}

/// A level in the scope stack.
///
/// Ordered from outermost to innermost.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    /// Visible everywhere for the whole run.
    #[default]
    Global,
    /// Visible in the current suite and its children.
    Suite,
    /// Visible in the current test and its keywords.
    Test,
    /// Visible only in the current keyword invocation.
    Keyword,
}

impl VariableScope {
    /// Returns the display name for this scope.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Suite => "Suite",
            Self::Test => "Test",
            Self::Keyword => "Keyword",
        }
    }

    /// Returns the nesting level (0 = outermost).
    #[must_use]
    pub const fn level(&self) -> u8 {
        match self {
            Self::Global => 0,
            Self::Suite => 1,
            Self::Test => 2,
            Self::Keyword => 3,
        }
    }
}
