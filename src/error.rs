use std::path::PathBuf;

use thiserror::Error;

use crate::template::model::LocatorSpec;

// ============================================================================
// Parse-time errors (route table + templates)
// ============================================================================

/// A routing declaration or a component template could not be interpreted.
///
/// Fatal for the single generation target it belongs to; the run carries on
/// with the remaining pages and reports every failure at the end.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed routing declarations in {}: {reason}", path.display())]
    MalformedRoutes { path: PathBuf, reason: String },

    #[error("duplicate route path '{url_path}' in {}", path.display())]
    DuplicateRoute { path: PathBuf, url_path: String },

    #[error("component '{component}' used in {} is never imported", path.display())]
    UnresolvedImport { path: PathBuf, component: String },

    #[error("{}:{line}: {reason}", path.display())]
    Markup {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("template for component '{component}' not found (expected {})", expected.display())]
    MissingTemplate { component: String, expected: PathBuf },

    #[error("duplicate column '{label}' in table '{table}' of {}", path.display())]
    DuplicateColumn {
        path: PathBuf,
        table: String,
        label: String,
    },
}

// ============================================================================
// Generation errors
// ============================================================================

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Two components import each other (directly or transitively).
    #[error("cyclic component import: {}", chain.join(" -> "))]
    CyclicImport { chain: Vec<String> },

    #[error("duplicate field '{field}' in page object '{page}'")]
    DuplicateField { page: String, field: String },

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render source: {0}")]
    Render(#[from] std::fmt::Error),
}

impl GenerateError {
    /// Whether this error must abort the whole run instead of being
    /// collected with the other per-page failures.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, GenerateError::CyclicImport { .. })
    }
}

// ============================================================================
// Runtime errors (descriptor resolution against a live session)
// ============================================================================

/// Failure reported by a `BrowserDriver` implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The element handle no longer refers to a node in the live document.
    #[error("stale element reference")]
    StaleElement,

    #[error("no such element")]
    NoSuchElement,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("element '{field}' not found by {locator}")]
    ElementNotFound { field: String, locator: LocatorSpec },

    #[error("timed out after {timeout_ms}ms waiting for {condition}")]
    WaitTimeout { condition: String, timeout_ms: u64 },

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("descriptor '{field}' is not bound to a page")]
    Unbound { field: String },

    #[error("descriptor '{field}' is already bound to another page")]
    AlreadyBound { field: String },

    #[error("index {index} out of range for '{field}' ({len} items, indexes start at 1)")]
    IndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("column '{label}' not found in table '{table}'")]
    ColumnNotFound { table: String, label: String },

    #[error("'{field}' expects {expected} index parts, got {got}")]
    InvalidListArgs {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate field '{field}' declared on '{owner}'")]
    DuplicateField { owner: String, field: String },

    #[error("page not opened: expected url containing '{expected}', current url is '{actual}'")]
    PageNotOpened { expected: String, actual: String },

    #[error("no value for route parameter ':{param}' of '{route}'")]
    MissingUrlParam { route: String, param: String },

    #[error("route '{route}' has no parameter ':{param}'")]
    UnknownUrlParam { route: String, param: String },
}
