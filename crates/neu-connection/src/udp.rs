//! UDP connected (fixed peer) and UDP-to (per-send destination) transports.

use std::net::SocketAddr;

use neu_core::error::{ErrorCode, NeuError, Result};
use tokio::net::UdpSocket;

use crate::config::{UdpConnectedConfig, UdpToConfig};

pub struct UdpConnectedTransport {
    pub socket: Option<UdpSocket>,
}

impl UdpConnectedTransport {
    pub fn new() -> Self {
        Self { socket: None }
    }

    pub async fn open(&mut self, cfg: &UdpConnectedConfig) -> Result<()> {
        let socket = UdpSocket::bind(format!("{}:{}", cfg.src_ip, cfg.src_port))
            .await
            .map_err(|e| NeuError::domain(ErrorCode::EAddrInUse, e.to_string()))?;
        socket.set_broadcast(true).ok();
        socket
            .connect(format!("{}:{}", cfg.dst_ip, cfg.dst_port))
            .await
            .map_err(|e| NeuError::domain(ErrorCode::EUnreachable, e.to_string()))?;
        self.socket = Some(socket);
        Ok(())
    }

    pub async fn send(&self, buf: &[u8]) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not open"))?;
        socket.send(buf).await.map_err(|e| NeuError::domain(ErrorCode::EClosed, e.to_string()))
    }

    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not open"))?;
        socket.recv(buf).await.map_err(|e| NeuError::domain(ErrorCode::EClosed, e.to_string()))
    }
}

impl Default for UdpConnectedTransport {
    fn default() -> Self {
        Self::new()
    }
}

pub struct UdpToTransport {
    pub socket: Option<UdpSocket>,
}

impl UdpToTransport {
    pub fn new() -> Self {
        Self { socket: None }
    }

    pub async fn open(&mut self, cfg: &UdpToConfig) -> Result<()> {
        let socket = UdpSocket::bind(format!("{}:{}", cfg.src_ip, cfg.src_port))
            .await
            .map_err(|e| NeuError::domain(ErrorCode::EAddrInUse, e.to_string()))?;
        self.socket = Some(socket);
        Ok(())
    }

    pub async fn send_to(&self, buf: &[u8], dst: SocketAddr) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not open"))?;
        socket.send_to(buf, dst).await.map_err(|e| NeuError::domain(ErrorCode::EClosed, e.to_string()))
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let socket = self.socket.as_ref().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not open"))?;
        socket.recv_from(buf).await.map_err(|e| NeuError::domain(ErrorCode::EClosed, e.to_string()))
    }
}

impl Default for UdpToTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn udp_to_round_trips_a_datagram() {
        let mut a = UdpToTransport::new();
        a.open(&UdpToConfig { src_ip: "127.0.0.1".into(), src_port: 0, timeout_ms: 0 })
            .await
            .unwrap();
        let mut b = UdpToTransport::new();
        b.open(&UdpToConfig { src_ip: "127.0.0.1".into(), src_port: 0, timeout_ms: 0 })
            .await
            .unwrap();

        let b_addr = b.socket.as_ref().unwrap().local_addr().unwrap();
        a.send_to(b"hello", b_addr).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, _from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }
}
