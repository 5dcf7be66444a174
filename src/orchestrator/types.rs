//! Public types for the sync orchestrator.

use serde::Serialize;

use crate::resilience::circuit_breaker::CircuitError;
use crate::storage::traits::StoreError;

/// A downstream store the orchestrator fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTarget {
    Graph,
    Vector,
    Analytics,
}

impl SyncTarget {
    pub const ALL: [SyncTarget; 3] = [Self::Graph, Self::Vector, Self::Analytics];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Vector => "vector",
            Self::Analytics => "analytics",
        }
    }
}

impl std::fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified failure kind for one target (or the whole event).
///
/// Variants are ordered by ascending severity so the aggregate kind is
/// simply the per-target maximum: validation outranks authorization,
/// which outranks unavailability, which outranks timeouts. A rejection
/// from an open circuit sits at the bottom; it means no call was made at
/// all this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    CircuitOpen,
    Timeout,
    Unavailable,
    Unauthorized,
    Validation,
}

impl SyncErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CircuitOpen => "circuit_open",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Unauthorized => "unauthorized",
            Self::Validation => "validation",
        }
    }
}

impl From<&StoreError> for SyncErrorKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => Self::Unavailable,
            StoreError::Timeout(_) => Self::Timeout,
            StoreError::Rejected(_) => Self::Validation,
            StoreError::Unauthorized(_) => Self::Unauthorized,
        }
    }
}

impl From<&CircuitError<StoreError>> for SyncErrorKind {
    fn from(err: &CircuitError<StoreError>) -> Self {
        match err {
            CircuitError::Rejected => Self::CircuitOpen,
            CircuitError::Inner(e) => Self::from(e),
        }
    }
}

/// Result of one target's sync attempt for one event.
#[derive(Debug, Clone, Serialize)]
pub struct SyncAttemptResult {
    pub target: SyncTarget,
    pub succeeded: bool,
    /// Store calls actually made (0 when the circuit rejected outright)
    pub attempts: u32,
    /// Last error message, for logs; never exposed in HTTP responses
    pub last_error: Option<String>,
    pub error_kind: Option<SyncErrorKind>,
    pub duration_ms: u64,
}

impl SyncAttemptResult {
    pub(crate) fn success(target: SyncTarget, attempts: u32, duration_ms: u64) -> Self {
        Self {
            target,
            succeeded: true,
            attempts,
            last_error: None,
            error_kind: None,
            duration_ms,
        }
    }

    pub(crate) fn failure(
        target: SyncTarget,
        attempts: u32,
        duration_ms: u64,
        kind: SyncErrorKind,
        message: String,
    ) -> Self {
        Self {
            target,
            succeeded: false,
            attempts,
            last_error: Some(message),
            error_kind: Some(kind),
            duration_ms,
        }
    }
}

/// Aggregate outcome of one event's fan-out across all targets.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub all_succeeded: bool,
    pub per_target: Vec<SyncAttemptResult>,
    /// Most severe failure kind across targets, `None` on full success
    pub overall_error_kind: Option<SyncErrorKind>,
}

impl SyncOutcome {
    /// Fold per-target results into the aggregate.
    #[must_use]
    pub fn aggregate(per_target: Vec<SyncAttemptResult>) -> Self {
        let all_succeeded = per_target.iter().all(|r| r.succeeded);
        let overall_error_kind = per_target.iter().filter_map(|r| r.error_kind).max();

        Self {
            all_succeeded,
            per_target,
            overall_error_kind,
        }
    }

    /// Result for one target, if present.
    #[must_use]
    pub fn target(&self, target: SyncTarget) -> Option<&SyncAttemptResult> {
        self.per_target.iter().find(|r| r.target == target)
    }
}
