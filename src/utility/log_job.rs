//! Log retrieval job.
//!
//! Two phases: ask the device for the total log length, then pull the log
//! in windows of at most `window_ceiling` bytes. Each Data-Read request
//! carries `(offset, window, total)`; the device answers a window with as
//! many notifications as it needs, and the job only asks for the next
//! window once the current one is exactly filled.

use crate::config::UtilityConfig;
use crate::error::{JobError, Result};
use crate::utility::job::{JobCore, JobState, UtilityJob};
use crate::utility::protocol::{decode_length, Format, FormatSet, LogRequest, Response};
use crate::utility::transport::PacketSink;

/// Minimum Length reply: header byte plus a u32 length
const MIN_LENGTH_REPLY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogPhase {
    Length,
    Data,
    Complete,
}

/// The Data-Read request currently outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWindow {
    /// Result length when the window was requested
    pub offset: u32,
    /// Bytes the device owes for this window
    pub size: u32,
    /// Bytes received so far in this window
    pub received: u32,
}

impl BatchWindow {
    fn is_filled(&self) -> bool {
        self.received == self.size
    }
}

#[derive(Debug)]
pub struct LogJob {
    core: JobCore,
    phase: LogPhase,
    format: Format,
    window_ceiling: u32,
    total: Option<u32>,
    window: BatchWindow,
    result: Vec<u8>,
}

impl LogJob {
    pub fn new(id: u8, format: Format) -> Self {
        Self::with_config(id, format, &UtilityConfig::default())
    }

    pub fn with_config(id: u8, format: Format, config: &UtilityConfig) -> Self {
        Self {
            core: JobCore::new(id, config.sequence_reset_per_request),
            phase: LogPhase::Length,
            format,
            window_ceiling: config.window_ceiling().max(1),
            total: None,
            window: BatchWindow::default(),
            result: Vec::new(),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Log length reported by the device, once known.
    pub fn total_length(&self) -> Option<u32> {
        self.total
    }

    /// Window being filled, once the data phase has begun.
    pub fn window(&self) -> Option<BatchWindow> {
        (self.phase == LogPhase::Data).then_some(self.window)
    }

    pub fn into_result(self) -> Vec<u8> {
        self.result
    }

    fn handle_length(&mut self, data: &[u8], response: Response<'_>) -> Result<()> {
        if data.len() < MIN_LENGTH_REPLY {
            return Err(self.fail(JobError::Malformed("log length reply truncated")));
        }

        let total = decode_length(response.payload);
        if total == 0 {
            return Err(self.fail(JobError::NoData));
        }
        if self.result.try_reserve_exact(total as usize).is_err() {
            return Err(self.fail(JobError::OutOfMemory { requested: total }));
        }

        tracing::debug!("Job 0x{:02x} log length {}", self.core.id, total);
        self.total = Some(total);
        self.phase = LogPhase::Data;
        Ok(())
    }

    fn handle_data(&mut self, response: Response<'_>) -> Result<bool> {
        let chunk = response.payload;
        if chunk.is_empty() {
            return Err(self.fail(JobError::Malformed("no log data in response")));
        }

        let received = self.window.received as u64 + chunk.len() as u64;
        if received > self.window.size as u64 {
            let window = self.window.size;
            return Err(self.fail(JobError::Overrun {
                window,
                received: received.min(u32::MAX as u64) as u32,
            }));
        }

        self.result.extend_from_slice(chunk);
        self.window.received = received as u32;

        if !self.window.is_filled() {
            return Ok(false);
        }

        if self.result.len() as u64 >= self.total.unwrap_or(0) as u64 {
            self.phase = LogPhase::Complete;
            self.core.state = JobState::Finished;
            tracing::info!(
                "Job 0x{:02x} retrieved {} log bytes",
                self.core.id,
                self.result.len()
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Open the next window and request it.
    fn request_next_window(&mut self, sink: &mut dyn PacketSink) -> Result<()> {
        let total = self.total.unwrap_or(0);
        let offset = self.result.len() as u32;
        let size = total.saturating_sub(offset).min(self.window_ceiling);
        self.window = BatchWindow {
            offset,
            size,
            received: 0,
        };

        let packet = LogRequest::Read {
            offset,
            window: size,
            total,
        }
        .encode(self.core.id, self.format);
        self.core.send(sink, packet)
    }

    fn fail(&mut self, err: JobError) -> JobError {
        self.phase = LogPhase::Complete;
        self.core.fail(err)
    }
}

impl UtilityJob for LogJob {
    fn identity(&self) -> u8 {
        self.core.id
    }

    fn state(&self) -> JobState {
        self.core.state
    }

    fn result(&self) -> &[u8] {
        &self.result
    }

    fn progress(&self) -> u8 {
        match self.total {
            Some(total) if total > 0 => {
                let pct = self.result.len() as u64 * 100 / total as u64;
                pct.min(100) as u8
            }
            _ => 0,
        }
    }

    fn allowed_formats(&self) -> FormatSet {
        FormatSet::HEADERED_HTML | FormatSet::PLAIN_HTML | FormatSet::CSV
    }

    fn start(&mut self, sink: &mut dyn PacketSink) -> Result<()> {
        if !self.core.can_start() || self.phase != LogPhase::Length {
            return Ok(());
        }
        if !self.allowed_formats().allows(self.format) {
            return Err(JobError::UnsupportedFormat(self.format));
        }

        let packet = LogRequest::Length.encode(self.core.id, self.format);
        if let Err(e) = self.core.send(sink, packet) {
            self.phase = LogPhase::Complete;
            return Err(e);
        }
        self.core.state = JobState::Running;
        Ok(())
    }

    fn handle_response(&mut self, data: &[u8], sink: &mut dyn PacketSink) -> Result<()> {
        let response = match self.core.accept(data) {
            Ok(response) => response,
            Err(e) => {
                if self.core.state.is_terminal() {
                    self.phase = LogPhase::Complete;
                }
                return Err(e);
            }
        };

        let next = match self.phase {
            LogPhase::Length => {
                self.handle_length(data, response)?;
                true
            }
            LogPhase::Data => self.handle_data(response)?,
            LogPhase::Complete => {
                return Err(JobError::UnexpectedResponse {
                    state: self.core.state,
                })
            }
        };

        if next {
            if let Err(e) = self.request_next_window(sink) {
                self.phase = LogPhase::Complete;
                return Err(e);
            }
        }
        Ok(())
    }

    fn abort(&mut self, reason: JobState) {
        if self.core.abort(reason) {
            self.phase = LogPhase::Complete;
        }
    }
}
