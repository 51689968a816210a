use crate::utility::{Format, JobState};
use thiserror::Error;

/// Failure of the packet transport underneath a job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("failed to write packet: {0}")]
    Write(String),

    #[error("no response within {waited_ms}ms")]
    Timeout { waited_ms: u64 },
}

/// Error raised by a utility job. Every variant is terminal for the job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("device reported job error{}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    DeviceError { code: Option<i32> },

    #[error("response out of order: expected sub-id {expected}, got {received}")]
    OutOfOrder { expected: u8, received: u8 },

    #[error("malformed response: {0}")]
    Malformed(&'static str),

    #[error("device has no log data")]
    NoData,

    #[error("unexpected response while job is {state:?}")]
    UnexpectedResponse { state: JobState },

    #[error("format {0:?} not supported by this job")]
    UnsupportedFormat(Format),

    #[error("job ended in state {state:?} without finishing")]
    NotFinished { state: JobState },

    #[error("cannot allocate {requested} bytes for the result")]
    OutOfMemory { requested: u32 },

    #[error("window overrun: requested {window} bytes, device sent {received}")]
    Overrun { window: u32, received: u32 },
}

impl JobError {
    /// Lifecycle state a job records when it fails with this error.
    pub fn state(&self) -> JobState {
        match self {
            JobError::Transport(_) => JobState::TransportError,
            JobError::NoData => JobState::NoData,
            JobError::OutOfMemory { .. } => JobState::OutOfMemory,
            JobError::NotFinished { state } => *state,
            _ => JobState::ProtocolError,
        }
    }
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T, E = JobError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_display() {
        let err = JobError::OutOfOrder {
            expected: 3,
            received: 5,
        };
        assert_eq!(
            err.to_string(),
            "response out of order: expected sub-id 3, got 5"
        );

        let err = JobError::DeviceError { code: Some(-2) };
        assert_eq!(err.to_string(), "device reported job error (code -2)");

        let err = JobError::DeviceError { code: None };
        assert_eq!(err.to_string(), "device reported job error");

        let err = JobError::from(TransportError::Timeout { waited_ms: 2000 });
        assert_eq!(err.to_string(), "transport error: no response within 2000ms");
    }

    #[test]
    fn test_job_error_state() {
        assert_eq!(
            JobError::Transport(TransportError::Disconnected).state(),
            JobState::TransportError
        );
        assert_eq!(JobError::NoData.state(), JobState::NoData);
        assert_eq!(
            JobError::Malformed("short").state(),
            JobState::ProtocolError
        );
        assert_eq!(
            JobError::DeviceError { code: None }.state(),
            JobState::ProtocolError
        );
        assert_eq!(
            JobError::NotFinished {
                state: JobState::Canceled
            }
            .state(),
            JobState::Canceled
        );
    }
}
