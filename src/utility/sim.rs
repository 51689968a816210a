//! Simulated utility service.
//!
//! Answers encoded log requests the way the device firmware does, with
//! optional fault injection. Used by the tests and by `utility-sim`.

use crate::config::UtilityConfig;
use crate::error::Result;
use crate::utility::protocol::{
    decode_request, encode_response, DecodedRequest, LogRequest, SUB_ID_ERROR,
};
use crate::utility::sequence::SubId;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Fault applied to the nth response packet the device emits (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Replace the packet with a device error carrying this code
    JobError { at: usize, code: i32 },
    /// Send the packet twice
    Duplicate { at: usize },
    /// Never send the packet
    Drop { at: usize },
}

#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    log: Vec<u8>,
    packet_payload: usize,
    reset_per_request: bool,
    sub_id: SubId,
    emitted: usize,
    fault: Option<Fault>,
    requests: Vec<DecodedRequest>,
}

impl SimulatedDevice {
    pub fn new(log: Vec<u8>) -> Self {
        Self::with_config(log, &UtilityConfig::default())
    }

    pub fn with_config(log: Vec<u8>, config: &UtilityConfig) -> Self {
        Self {
            log,
            packet_payload: config.packet_payload.max(1) as usize,
            reset_per_request: config.sequence_reset_per_request,
            sub_id: SubId::ZERO,
            emitted: 0,
            fault: None,
            requests: Vec::new(),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> &[DecodedRequest] {
        &self.requests
    }

    pub fn log(&self) -> &[u8] {
        &self.log
    }

    /// Answer one request packet with zero or more response packets.
    pub fn respond(&mut self, packet: &[u8]) -> Result<Vec<Bytes>> {
        let request = decode_request(packet)?;
        self.requests.push(request);
        if self.reset_per_request {
            self.sub_id = SubId::ZERO;
        }

        let job = request.job_id;
        let payloads: Vec<Vec<u8>> = match request.request {
            LogRequest::Length => vec![(self.log.len() as u32).to_le_bytes().to_vec()],
            LogRequest::Read { offset, window, .. } => {
                let start = (offset as usize).min(self.log.len());
                let end = start.saturating_add(window as usize).min(self.log.len());
                self.log[start..end]
                    .chunks(self.packet_payload)
                    .map(<[u8]>::to_vec)
                    .collect()
            }
        };

        let mut out = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let packet = encode_response(job, self.sub_id.get(), &payload);
            self.sub_id = self.sub_id.next();

            let index = self.emitted;
            self.emitted += 1;
            match self.fault {
                Some(Fault::JobError { at, code }) if at == index => {
                    out.push(encode_response(job, SUB_ID_ERROR, &code.to_le_bytes()));
                }
                Some(Fault::Duplicate { at }) if at == index => {
                    out.push(packet.clone());
                    out.push(packet);
                }
                Some(Fault::Drop { at }) if at == index => {}
                _ => out.push(packet),
            }
        }
        Ok(out)
    }

    /// Serve requests until the request channel closes, then hand the device back.
    pub async fn serve(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Bytes>,
        responses: mpsc::Sender<Bytes>,
    ) -> Self {
        while let Some(packet) = requests.recv().await {
            let replies = match self.respond(&packet) {
                Ok(replies) => replies,
                Err(e) => {
                    tracing::warn!("Simulated device rejected request: {}", e);
                    break;
                }
            };
            for reply in replies {
                if responses.send(reply).await.is_err() {
                    return self;
                }
            }
        }
        self
    }
}
