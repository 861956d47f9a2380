//! sonde-core — shared data model, wire records, configuration, and the
//! transport capability. All other Sonde crates depend on this one.

pub mod config;
pub mod packet;
pub mod transport;

pub use packet::{unix_nanos, Ack, Packet};
pub use transport::Transport;
