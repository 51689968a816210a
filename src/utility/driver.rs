//! Async owner for a single job.
//!
//! Feeds inbound notifications to the job one at a time and enforces the
//! per-response watchdog. The job itself never waits or retries.

use crate::config::UtilityConfig;
use crate::error::{JobError, Result, TransportError};
use crate::utility::job::{JobState, UtilityJob};
use crate::utility::transport::PacketSink;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct JobDriver<S> {
    job: Box<dyn UtilityJob>,
    sink: S,
    inbound: mpsc::Receiver<Bytes>,
    timeout: Duration,
}

impl<S: PacketSink> JobDriver<S> {
    pub fn new(
        job: Box<dyn UtilityJob>,
        sink: S,
        inbound: mpsc::Receiver<Bytes>,
        config: &UtilityConfig,
    ) -> Self {
        Self {
            job,
            sink,
            inbound,
            timeout: config.response_timeout(),
        }
    }

    pub fn job(&self) -> &dyn UtilityJob {
        self.job.as_ref()
    }

    /// Run the job to a terminal state and return its result buffer.
    ///
    /// A closed inbound channel cancels the job; a silent device past the
    /// timeout fails it with `TransportError`. A job that was already
    /// terminal before `run` yields `NotFinished` carrying its state.
    pub async fn run(&mut self) -> Result<Vec<u8>> {
        self.job.start(&mut self.sink)?;

        let mut last_progress = 0;
        while self.job.state() == JobState::Running {
            let packet = match tokio::time::timeout(self.timeout, self.inbound.recv()).await {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    self.job.abort(JobState::Canceled);
                    return Err(TransportError::Disconnected.into());
                }
                Err(_) => {
                    tracing::warn!("Job 0x{:02x} timed out", self.job.identity());
                    self.job.abort(JobState::TransportError);
                    return Err(TransportError::Timeout {
                        waited_ms: self.timeout.as_millis() as u64,
                    }
                    .into());
                }
            };

            self.job.handle_response(&packet, &mut self.sink)?;

            let progress = self.job.progress();
            if progress != last_progress {
                tracing::debug!("Job 0x{:02x} progress {}%", self.job.identity(), progress);
                last_progress = progress;
            }
        }

        match self.job.state() {
            JobState::Finished => Ok(self.job.result().to_vec()),
            state => Err(JobError::NotFinished { state }),
        }
    }
}
