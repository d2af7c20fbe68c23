use thiserror::Error;

/// Failure of a single route computation or of the service plumbing around it.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Trace matched {0} distinct edge(s), at least 2 are required")]
    InsufficientMatches(usize),
    #[error("No path between node {start} and node {end}")]
    NoPath { start: u64, end: u64 },
    #[error("Could not anchor time windows (highest index {highest_index}, resolved {resolved:?})")]
    UnfillableGap {
        highest_index: usize,
        resolved: Vec<usize>,
    },
    #[error("Reference data unavailable: {0}")]
    ReferenceDataUnavailable(String),
    #[error("Broker connection failed after {attempts} attempt(s): {reason}")]
    ConnectionFailure { attempts: u32, reason: String },
    #[error("Road graph inconsistency: {0}")]
    Graph(String),
    #[error("Route computation exceeded {0:?}")]
    ComputationTimeout(std::time::Duration),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RouteError {
    /// Stable label used when logging failed traces.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::InvalidInput(_) => "InvalidInput",
            RouteError::InsufficientMatches(_) => "InsufficientMatches",
            RouteError::NoPath { .. } => "NoPath",
            RouteError::UnfillableGap { .. } => "UnfillableGap",
            RouteError::ReferenceDataUnavailable(_) => "ReferenceDataUnavailable",
            RouteError::ConnectionFailure { .. } => "ConnectionFailure",
            RouteError::Graph(_) => "Graph",
            RouteError::ComputationTimeout(_) => "ComputationTimeout",
            RouteError::Snapshot(_) => "Snapshot",
            RouteError::Transport(_) => "Transport",
        }
    }

    /// Network failures may be retried; algorithmic failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RouteError::ReferenceDataUnavailable(_) | RouteError::Transport(_)
        )
    }
}

impl From<std::io::Error> for RouteError {
    fn from(value: std::io::Error) -> Self {
        RouteError::Transport(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
