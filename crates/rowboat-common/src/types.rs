//! Policy enums governing session scope behavior.

use serde::{Deserialize, Serialize};

/// When pending in-memory changes are written to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Flush pending writes before queries and again when the scope closes.
    #[default]
    Auto,
    /// Flush pending writes only when the scope closes.
    Commit,
    /// Never flush; pending writes are discarded when the scope closes.
    /// Under join nesting they are left to the outer scope instead.
    Never,
}

/// What happens when a scope is opened while another is already current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NestingMode {
    /// The inner open joins the existing unit of work; flushing happens when
    /// the outermost handle closes.
    #[default]
    Join,
    /// The inner scope gets its own sessions and connections.
    Independent,
}

/// How "current scope" is expected to be managed for a logical context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStrategy {
    /// The application opens and closes scopes explicitly.
    #[default]
    Manual,
    /// The web pipeline opens one scope per inbound HTTP request and closes
    /// it at request end. Required by the request lifecycle middleware.
    PerRequest,
}
