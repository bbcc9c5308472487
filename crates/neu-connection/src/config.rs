//! Per-kind connection configuration. The five kinds are a closed set; a new
//! transport needs a new `ConnectionParam` variant, not a generic builder.

use neu_core::error::{ErrorCode, NeuError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    Off,
    On,
}

#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    pub ip: String,
    pub port: u16,
    /// `0` means non-blocking (fire-and-forget on EAGAIN); `> 0` sets
    /// `SO_RCVTIMEO`/`SO_SNDTIMEO`-equivalent blocking behaviour.
    pub timeout_ms: u32,
}

#[derive(Clone)]
pub struct TcpServerConfig {
    pub ip: String,
    pub port: u16,
    pub max_link: usize,
    pub timeout_ms: u32,
}

impl std::fmt::Debug for TcpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServerConfig")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("max_link", &self.max_link)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UdpConnectedConfig {
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
    pub timeout_ms: u32,
}

#[derive(Debug, Clone)]
pub struct UdpToConfig {
    pub src_ip: String,
    pub src_port: u16,
    pub timeout_ms: u32,
}

#[derive(Debug, Clone)]
pub struct TtyConfig {
    pub device: String,
    pub baud: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow: FlowControl,
    pub timeout_ms: u32,
    /// Issue `TIOCSRS485` before the first `start()` takes effect (§2B).
    pub smart_link: bool,
}

const VALID_BAUDS: &[u32] = &[150, 300, 600, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

impl TtyConfig {
    pub fn validate(&self) -> Result<()> {
        if !VALID_BAUDS.contains(&self.baud) {
            return Err(NeuError::domain(
                ErrorCode::ParamIsWrong,
                format!("unsupported baud rate {}", self.baud),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(NeuError::domain(ErrorCode::ParamIsWrong, "data bits must be 5..=8"));
        }
        if self.stop_bits != 1 && self.stop_bits != 2 {
            return Err(NeuError::domain(ErrorCode::ParamIsWrong, "stop bits must be 1 or 2"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub enum ConnectionParam {
    TcpClient(TcpClientConfig),
    TcpServer(TcpServerConfig),
    UdpConnected(UdpConnectedConfig),
    UdpTo(UdpToConfig),
    Tty(TtyConfig),
}

impl ConnectionParam {
    pub fn validate(&self) -> Result<()> {
        match self {
            ConnectionParam::TcpServer(cfg) if cfg.max_link == 0 => Err(NeuError::domain(
                ErrorCode::ParamIsWrong,
                "tcp_server max_link must be > 0",
            )),
            ConnectionParam::Tty(cfg) => cfg.validate(),
            _ => Ok(()),
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        match self {
            ConnectionParam::TcpClient(c) => c.timeout_ms,
            ConnectionParam::TcpServer(c) => c.timeout_ms,
            ConnectionParam::UdpConnected(c) => c.timeout_ms,
            ConnectionParam::UdpTo(c) => c.timeout_ms,
            ConnectionParam::Tty(c) => c.timeout_ms,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.timeout_ms() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tty_rejects_unsupported_baud() {
        let cfg = TtyConfig {
            device: "/dev/ttyS0".into(),
            baud: 1_000_000,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow: FlowControl::Off,
            timeout_ms: 0,
            smart_link: false,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tcp_server_rejects_zero_capacity() {
        let param = ConnectionParam::TcpServer(TcpServerConfig {
            ip: "0.0.0.0".into(),
            port: 502,
            max_link: 0,
            timeout_ms: 0,
        });
        assert!(param.validate().is_err());
    }
}
