//! Typed error hierarchy for the rotator.
//!
//! Each collaborator has its own enum so callers can tell a fatal
//! configuration problem apart from a per-repository I/O failure:
//! - `ConfigError`: invalid configuration, aborts the run before any mutation
//! - `HostError`: source-host reads and writes
//! - `StateError`: rotation state persistence
//! - `RenderError`: ownership file rendering
//! - `TransportError` / `NotificationError`: chat dispatch
//! - `RotationError`: the failure reason recorded for one repository

use thiserror::Error;

/// Invalid configuration. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Reviewer pool is empty")]
    EmptyPool,

    #[error("Reviewer '{0}' appears more than once in the pool")]
    DuplicateReviewer(String),

    #[error("Invalid reviewer count {slots}: must be between 1 and the pool size ({pool_size})")]
    InvalidSlotCount { slots: usize, pool_size: usize },

    #[error("No repositories configured")]
    NoRepositories,

    #[error("Invalid repository name '{0}': expected namespace/name")]
    InvalidRepository(String),

    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures talking to the source-control host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{operation} request for {repository} failed: {source}")]
    Request {
        repository: String,
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} for {repository} returned HTTP {status}: {body}")]
    Status {
        repository: String,
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unexpected {operation} response for {repository}: {message}")]
    Decode {
        repository: String,
        operation: &'static str,
        message: String,
    },

    #[error("Host rejected {operation} for {repository}: {reason}")]
    Rejected {
        repository: String,
        operation: &'static str,
        reason: String,
    },
}

/// Failures reading or writing rotation state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state blob {name}: {message}")]
    Read { name: String, message: String },

    #[error("Failed to write state blob {name}: {message}")]
    Write { name: String, message: String },

    #[error("State blob {name} is not valid JSON: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode state blob {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Managed section opened on line {line} is never closed")]
    UnterminatedSection { line: usize },
}

/// Failures delivering a single chat message.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Chat API rejected message to {target}: {error}")]
    Api { target: String, error: String },
}

/// Failures of a notification run as a whole.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("No reviewers found for {repository}")]
    NoOwners { repository: String },

    #[error("No fallback channel configured; could not notify: {}", .undelivered.join(", "))]
    NoFallbackChannel { undelivered: Vec<String> },

    #[error("Failed to dispatch notification to {target}: {source}")]
    Dispatch {
        target: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Why a single repository's rotation failed.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(
        "State for {repository} is behind its ownership file (file already assigns {})",
        .selected.join(", ")
    )]
    StateDrift {
        repository: String,
        selected: Vec<String>,
    },
}

impl RotationError {
    /// Short machine-friendly label for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RotationError::Config(_) => "config",
            RotationError::Host(_) => "host",
            RotationError::State(_) => "state",
            RotationError::Render(_) => "render",
            RotationError::StateDrift { .. } => "state-drift",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_slot_count_mentions_both_numbers() {
        let err = ConfigError::InvalidSlotCount {
            slots: 5,
            pool_size: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn rotation_error_converts_from_state_error() {
        let inner = StateError::Write {
            name: "repos/group/app.json".to_string(),
            message: "disk full".to_string(),
        };
        let err: RotationError = inner.into();
        match &err {
            RotationError::State(StateError::Write { name, .. }) => {
                assert_eq!(name, "repos/group/app.json");
            }
            _ => panic!("Expected RotationError::State(Write)"),
        }
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn rotation_error_drift_lists_selection() {
        let err = RotationError::StateDrift {
            repository: "group/app".to_string(),
            selected: vec!["alice".to_string(), "bob".to_string()],
        };
        assert!(err.to_string().contains("alice, bob"));
        assert_eq!(err.kind(), "state-drift");
    }

    #[test]
    fn notification_error_names_undelivered_owners() {
        let err = NotificationError::NoFallbackChannel {
            undelivered: vec!["carol".to_string(), "dave".to_string()],
        };
        assert!(err.to_string().contains("carol, dave"));
    }

    #[test]
    fn host_error_status_is_matchable() {
        let err = HostError::Status {
            repository: "group/app".to_string(),
            operation: "get file",
            status: 500,
            body: "boom".to_string(),
        };
        assert!(matches!(err, HostError::Status { status: 500, .. }));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::EmptyPool);
        assert_std_error(&RenderError::UnterminatedSection { line: 1 });
        assert_std_error(&NotificationError::NoOwners {
            repository: "a/b".into(),
        });
        assert_std_error(&RotationError::Config(ConfigError::NoRepositories));
    }
}
