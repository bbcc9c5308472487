//! Uniform send/receive surface across TCP, UDP and serial transports, with
//! lazy connect, reconnect, and two streaming-framing contracts.

pub mod config;
mod connection;
pub mod framing;
mod tcp;
mod tty;
mod udp;

pub use config::{ConnectionParam, FlowControl, Parity, TcpClientConfig, TcpServerConfig, TtyConfig, UdpConnectedConfig, UdpToConfig};
pub use connection::{Connection, ConnectionState};
pub use framing::{StreamOutcome, WaitOutcome};
