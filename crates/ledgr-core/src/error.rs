//! Error types for the ledgr-core library.

use thiserror::Error;

/// Main error type for the ledgr library.
#[derive(Error, Debug)]
pub enum LedgrError {
    /// A single extraction provider failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Journal construction or state violation.
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// Review queue transition error.
    #[error("review error: {0}")]
    Review(#[from] ReviewError),

    /// Persistence collaborator error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by a single text extraction provider.
///
/// These never reach callers of the orchestrator; they are recorded as
/// attempt diagnostics and trigger the next provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider is not configured or its resources are absent.
    #[error("{0} is unavailable")]
    Unavailable(String),

    /// Provider did not answer within its time budget.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Remote service rejected the request (quota, auth, 5xx).
    #[error("request failed: {0}")]
    Request(String),

    /// Input could not be decoded (bad image, encrypted PDF).
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Provider ran but produced no usable text.
    #[error("no text extracted")]
    EmptyText,
}

/// Journal invariant and lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JournalError {
    /// Debits and credits differ by more than the rounding tolerance.
    #[error("entry is unbalanced: debit {debit} != credit {credit}")]
    Unbalanced {
        debit: rust_decimal::Decimal,
        credit: rust_decimal::Decimal,
    },

    /// The invoice lacks an amount required to build the entry.
    #[error("missing amount: {0}")]
    MissingAmount(String),

    /// A line carries both a debit and a credit, or neither.
    #[error("malformed line for account {0}")]
    MalformedLine(String),

    /// Operation not permitted in the entry's current status.
    #[error("entry {id} is {status}, cannot {action}")]
    InvalidStatus {
        id: String,
        status: String,
        action: &'static str,
    },
}

/// Review queue errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    /// Transition not allowed from the item's current state.
    #[error("cannot move review item from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Another reviewer claimed the item first.
    #[error("review item {0} was already claimed")]
    AlreadyClaimed(String),

    /// Only the assigned reviewer may decide on an item.
    #[error("review item {item} is assigned to {assigned}, not {reviewer}")]
    NotAssignee {
        item: String,
        assigned: String,
        reviewer: String,
    },
}

/// Persistence collaborator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Record not found.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A write referenced an entity owned by another tenant.
    #[error("cross-tenant reference: {0}")]
    CrossTenant(String),

    /// Optimistic concurrency check failed.
    #[error("conflicting write on {0}")]
    Conflict(String),

    /// Backend failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result type for the ledgr library.
pub type Result<T> = std::result::Result<T, LedgrError>;
