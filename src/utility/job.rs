//! Job contract shared by every utility job.
//!
//! A job is a bounded request/response exchange. The owner calls
//! [`UtilityJob::start`] once, then hands each inbound packet to
//! [`UtilityJob::handle_response`] in arrival order until the job reaches a
//! terminal [`JobState`]. Jobs are not reusable.

use crate::error::{JobError, Result};
use crate::utility::protocol::{FormatSet, Response};
use crate::utility::sequence::SequenceGuard;
use crate::utility::transport::PacketSink;
use bytes::Bytes;

/// Externally observable lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Initial,
    Running,
    Finished,
    Canceled,

    None,
    TransportError,
    UnsupportedVersion,
    ServiceUnavailable,
    ProtocolError,
    NoData,
    OutOfMemory,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Initial | JobState::Running)
    }

    pub fn is_error(&self) -> bool {
        self.is_terminal() && !matches!(self, JobState::Finished | JobState::Canceled)
    }
}

pub trait UtilityJob: Send {
    /// Job identifier carried in byte 0 of every request.
    fn identity(&self) -> u8;

    fn state(&self) -> JobState;

    /// Bytes accumulated so far.
    fn result(&self) -> &[u8];

    /// Completion percentage, 0 until the job knows its total size.
    fn progress(&self) -> u8;

    fn allowed_formats(&self) -> FormatSet;

    /// Send the first request. A no-op unless the job is still `Initial`.
    fn start(&mut self, sink: &mut dyn PacketSink) -> Result<()>;

    /// Consume one inbound packet and send a follow-up request if one is due.
    fn handle_response(&mut self, data: &[u8], sink: &mut dyn PacketSink) -> Result<()>;

    /// Owner-driven termination, e.g. `Canceled` on disconnect. Ignored once
    /// terminal, and for a `reason` that is not itself terminal.
    fn abort(&mut self, reason: JobState);
}

/// State and sequencing common to all job variants.
#[derive(Debug)]
pub(crate) struct JobCore {
    pub(crate) id: u8,
    pub(crate) state: JobState,
    pub(crate) guard: SequenceGuard,
    pub(crate) reset_per_request: bool,
}

impl JobCore {
    pub(crate) fn new(id: u8, reset_per_request: bool) -> Self {
        Self {
            id,
            state: JobState::Initial,
            guard: SequenceGuard::new(),
            reset_per_request,
        }
    }

    /// Record the terminal state for `err` and hand it back for propagation.
    pub(crate) fn fail(&mut self, err: JobError) -> JobError {
        tracing::warn!("Job 0x{:02x} failed: {}", self.id, err);
        self.state = err.state();
        err
    }

    /// Push a request through the sink. Any sink failure ends the job.
    pub(crate) fn send(&mut self, sink: &mut dyn PacketSink, packet: Bytes) -> Result<()> {
        if self.reset_per_request {
            self.guard.reset();
        }
        tracing::debug!("Job 0x{:02x} request 0x{}", self.id, hex::encode(&packet));
        sink.send(packet).map_err(|e| self.fail(e.into()))
    }

    /// Gate an inbound packet: job must be running, header must be in sequence.
    pub(crate) fn accept<'a>(&mut self, data: &'a [u8]) -> Result<Response<'a>> {
        if self.state != JobState::Running {
            tracing::warn!(
                "Job 0x{:02x} got a response while {:?}, ignoring",
                self.id,
                self.state
            );
            return Err(JobError::UnexpectedResponse { state: self.state });
        }
        tracing::debug!("Job 0x{:02x} response 0x{}", self.id, hex::encode(data));

        let response = Response::decode(data).map_err(|e| self.fail(e))?;
        if response.is_device_error() {
            let code = response.error_code();
            return Err(self.fail(JobError::DeviceError { code }));
        }
        self.guard
            .validate(response.sub_id)
            .map_err(|e| self.fail(e))?;
        Ok(response)
    }

    /// Returns false, with a diagnostic, when `start` is called out of turn.
    pub(crate) fn can_start(&self) -> bool {
        if self.state != JobState::Initial {
            tracing::warn!(
                "Expected job 0x{:02x} to be {:?}, yet it is {:?}",
                self.id,
                JobState::Initial,
                self.state
            );
            return false;
        }
        true
    }

    pub(crate) fn abort(&mut self, reason: JobState) -> bool {
        if !reason.is_terminal() {
            tracing::warn!(
                "Job 0x{:02x} cannot be aborted into {:?}, ignoring",
                self.id,
                reason
            );
            return false;
        }
        if self.state.is_terminal() {
            return false;
        }
        tracing::warn!("Job 0x{:02x} aborted: {:?}", self.id, reason);
        self.state = reason;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn test_state_classification() {
        assert!(!JobState::Initial.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Finished.is_terminal());
        assert!(!JobState::Finished.is_error());
        assert!(!JobState::Canceled.is_error());
        assert!(JobState::NoData.is_error());
        assert!(JobState::None.is_error());
    }

    #[test]
    fn test_accept_requires_running() {
        let mut core = JobCore::new(0x10, false);
        assert_eq!(
            core.accept(&[0x00]),
            Err(JobError::UnexpectedResponse {
                state: JobState::Initial
            })
        );
        assert_eq!(core.state, JobState::Initial);
    }

    #[test]
    fn test_accept_device_error_records_code() {
        let mut core = JobCore::new(0x10, false);
        core.state = JobState::Running;
        let err = core.accept(&[0x1F, 0xFE, 0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err, JobError::DeviceError { code: Some(-2) });
        assert_eq!(core.state, JobState::ProtocolError);
    }

    #[test]
    fn test_send_failure_is_transport_error() {
        let mut core = JobCore::new(0x10, false);
        let mut sink = |_: Bytes| -> std::result::Result<(), TransportError> {
            Err(TransportError::Write("gatt busy".to_string()))
        };
        let err = core.send(&mut sink, Bytes::from_static(&[0])).unwrap_err();
        assert!(matches!(err, JobError::Transport(TransportError::Write(_))));
        assert_eq!(core.state, JobState::TransportError);
    }

    #[test]
    fn test_abort_ignores_live_reasons() {
        let mut core = JobCore::new(0x10, false);
        core.state = JobState::Running;
        assert!(!core.abort(JobState::Initial));
        assert!(!core.abort(JobState::Running));
        assert_eq!(core.state, JobState::Running);
    }

    #[test]
    fn test_abort_once() {
        let mut core = JobCore::new(0x10, false);
        assert!(core.abort(JobState::Canceled));
        assert!(!core.abort(JobState::TransportError));
        assert_eq!(core.state, JobState::Canceled);
    }
}
