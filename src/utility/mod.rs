//! Utility job protocol.
//!
//! The device exposes a "utility" characteristic: the client writes a
//! request packet, the device answers with one or more notifications. A job
//! owns one such exchange from its first request until it terminates.
//!
//! # Flow
//!
//! ```text
//! owner --start--> Job --request--> PacketSink --> device
//! owner <--notify-- device
//! owner --handle_response--> Job --(next request)--> PacketSink
//! ```
//!
//! Responses carry a rolling sub-id (0..=14, 15 = device error) that the
//! [`SequenceGuard`] checks before any job sees the payload.

pub mod driver;
pub mod job;
pub mod log_job;
pub mod protocol;
pub mod sequence;
pub mod sim;
pub mod transport;

pub use driver::JobDriver;
pub use job::{JobState, UtilityJob};
pub use log_job::{BatchWindow, LogJob};
pub use protocol::{
    decode_length, decode_request, encode_request, encode_response, DecodedRequest, Format,
    FormatSet, LogRequest, RequestType, Response, REQUEST_HEADER_LEN, SUB_ID_ERROR, SUB_ID_MAX,
};
pub use sequence::{SequenceGuard, SubId};
pub use sim::{Fault, SimulatedDevice};
pub use transport::{ChannelSink, PacketSink};
