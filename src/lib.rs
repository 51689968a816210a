//! Utility job protocol engine for Calliope mini / micro:bit devices.
//!
//! A job drives a strictly ordered request/response exchange over a
//! channel of small notification packets. The log job retrieves the
//! device's data log in bounded windows.

pub mod config;
pub mod error;
pub mod utility;

pub use config::UtilityConfig;
pub use error::{ConfigError, JobError, Result, TransportError};
pub use utility::{
    Format, FormatSet, JobDriver, JobState, LogJob, PacketSink, SimulatedDevice, UtilityJob,
};
