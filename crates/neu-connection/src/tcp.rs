//! TCP client and TCP server transports.

use std::collections::VecDeque;
use std::net::SocketAddr;

use neu_core::error::{ErrorCode, NeuError, Result};
use tokio::net::{TcpListener, TcpStream};

use crate::config::TcpClientConfig;

pub struct TcpClientTransport {
    pub stream: Option<TcpStream>,
}

impl TcpClientTransport {
    pub fn new() -> Self {
        Self { stream: None }
    }

    pub async fn connect(&mut self, cfg: &TcpClientConfig) -> Result<()> {
        let addr = format!("{}:{}", cfg.ip, cfg.port);
        let connect = TcpStream::connect(&addr);
        let stream = if cfg.timeout_ms > 0 {
            tokio::time::timeout(std::time::Duration::from_millis(cfg.timeout_ms as u64), connect)
                .await
                .map_err(|_| NeuError::domain(ErrorCode::ETimedOut, "tcp connect timed out"))?
        } else {
            connect.await
        }
        .map_err(|e| map_connect_err(e))?;
        stream.set_nodelay(true).ok();
        self.stream = Some(stream);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn send(&mut self, buf: &[u8]) -> Result<usize> {
        use tokio::io::AsyncWriteExt;
        let stream = self.stream.as_mut().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not connected"))?;
        stream.write(buf).await.map_err(map_io_err)
    }

    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        use tokio::io::AsyncReadExt;
        let stream = self.stream.as_mut().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not connected"))?;
        let n = stream.read(buf).await.map_err(map_io_err)?;
        if n == 0 {
            return Err(NeuError::domain(ErrorCode::EClosed, "peer closed"));
        }
        Ok(n)
    }

    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl Default for TcpClientTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_connect_err(e: std::io::Error) -> NeuError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::ConnectionRefused => NeuError::domain(ErrorCode::EConnRefused, e.to_string()),
        ErrorKind::TimedOut => NeuError::domain(ErrorCode::ETimedOut, e.to_string()),
        _ => NeuError::domain(ErrorCode::EUnreachable, e.to_string()),
    }
}

fn map_io_err(e: std::io::Error) -> NeuError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::WouldBlock => NeuError::domain(ErrorCode::EAgain, e.to_string()),
        ErrorKind::ConnectionReset => NeuError::domain(ErrorCode::EConnReset, e.to_string()),
        ErrorKind::ConnectionAborted => NeuError::domain(ErrorCode::EConnAborted, e.to_string()),
        _ => NeuError::domain(ErrorCode::EClosed, e.to_string()),
    }
}

/// A single accepted client slot in the server's fixed-capacity table.
pub struct ClientSlot {
    pub fd: u32,
    pub stream: TcpStream,
    pub addr: SocketAddr,
}

/// Fixed-capacity client table. When full, the oldest-by-insertion-sequence
/// slot is evicted (not by array index) to make room for a new accept.
pub struct TcpServerTransport {
    pub listener: Option<TcpListener>,
    max_link: usize,
    clients: VecDeque<ClientSlot>,
    next_fd: u32,
}

impl TcpServerTransport {
    pub fn new(max_link: usize) -> Self {
        Self {
            listener: None,
            max_link,
            clients: VecDeque::new(),
            next_fd: 1,
        }
    }

    pub async fn listen(&mut self, ip: &str, port: u16) -> Result<()> {
        let listener = TcpListener::bind(format!("{ip}:{port}"))
            .await
            .map_err(|e| NeuError::domain(ErrorCode::EAddrInUse, e.to_string()))?;
        self.listener = Some(listener);
        Ok(())
    }

    pub async fn accept(&mut self) -> Result<u32> {
        let listener = self.listener.as_ref().ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not listening"))?;
        let (stream, addr) = listener.accept().await.map_err(map_io_err)?;
        stream.set_nodelay(true).ok();

        if self.clients.len() >= self.max_link {
            if let Some(evicted) = self.clients.pop_front() {
                tracing::warn!(fd = evicted.fd, addr = %evicted.addr, "tcp server table full, evicting oldest client");
            }
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.clients.push_back(ClientSlot { fd, stream, addr });
        Ok(fd)
    }

    fn find_mut(&mut self, fd: u32) -> Result<&mut ClientSlot> {
        self.clients
            .iter_mut()
            .find(|c| c.fd == fd)
            .ok_or_else(|| NeuError::domain(ErrorCode::ENoEnt, "no such client fd"))
    }

    pub async fn send(&mut self, fd: u32, buf: &[u8]) -> Result<usize> {
        use tokio::io::AsyncWriteExt;
        self.find_mut(fd)?.stream.write(buf).await.map_err(map_io_err)
    }

    pub async fn recv(&mut self, fd: u32, buf: &mut [u8]) -> Result<usize> {
        use tokio::io::AsyncReadExt;
        let n = self.find_mut(fd)?.stream.read(buf).await.map_err(map_io_err)?;
        if n == 0 {
            self.close_client(fd);
            return Err(NeuError::domain(ErrorCode::EClosed, "peer closed"));
        }
        Ok(n)
    }

    pub fn close_client(&mut self, fd: u32) {
        self.clients.retain(|c| c.fd != fd);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_evicts_oldest_client_when_table_is_full() {
        let mut server = TcpServerTransport::new(1);
        server.listen("127.0.0.1", 0).await.unwrap();
        let addr = server.listener.as_ref().unwrap().local_addr().unwrap();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let fd1 = server.accept().await.unwrap();
        assert_eq!(server.client_count(), 1);

        let _c2 = TcpStream::connect(addr).await.unwrap();
        let fd2 = server.accept().await.unwrap();
        assert_eq!(server.client_count(), 1);
        assert_ne!(fd1, fd2);
        assert!(server.find_mut(fd1).is_err());
        assert!(server.find_mut(fd2).is_ok());
    }
}
