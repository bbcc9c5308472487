//! Unified connection handle. A single mutex guards the full transport state
//! (including the recv scratch buffer); every public operation takes it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use neu_core::error::{ErrorCode, NeuError, Result};
use neu_core::node::LinkState;
use tokio::sync::Mutex;

use crate::config::ConnectionParam;
use crate::framing::{RecvScratch, StreamOutcome, WaitOutcome};
use crate::tcp::{TcpClientTransport, TcpServerTransport};
use crate::tty::TtyTransport;
use crate::udp::{UdpConnectedTransport, UdpToTransport};

const MAX_SEND_RETRIES: u32 = 10;
const SEND_RETRY_BACKOFF: Duration = Duration::from_millis(50);

enum Transport {
    TcpClient(TcpClientTransport),
    TcpServer(TcpServerTransport),
    UdpConnected(UdpConnectedTransport),
    UdpTo(UdpToTransport),
    Tty(TtyTransport),
}

struct Inner {
    param: ConnectionParam,
    transport: Transport,
    state: LinkState,
    recv_scratch: RecvScratch,
    send_bytes: u64,
    recv_bytes: u64,
    connected_fired: bool,
}

/// A single transport of one of the five closed kinds, reachable through one
/// uniform send/recv/state surface plus kind-specific operations.
pub struct Connection {
    inner: Mutex<Inner>,
    connected_cb: Arc<dyn Fn() + Send + Sync>,
    disconnected_cb: Arc<dyn Fn() + Send + Sync>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionState {
    pub send_bytes: u64,
    pub recv_bytes: u64,
    pub link_state: LinkState,
}

impl Connection {
    pub fn new(
        param: ConnectionParam,
        connected_cb: impl Fn() + Send + Sync + 'static,
        disconnected_cb: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self> {
        param.validate()?;
        let transport = match &param {
            ConnectionParam::TcpClient(_) => Transport::TcpClient(TcpClientTransport::new()),
            ConnectionParam::TcpServer(cfg) => Transport::TcpServer(TcpServerTransport::new(cfg.max_link)),
            ConnectionParam::UdpConnected(_) => Transport::UdpConnected(UdpConnectedTransport::new()),
            ConnectionParam::UdpTo(_) => Transport::UdpTo(UdpToTransport::new()),
            ConnectionParam::Tty(_) => Transport::Tty(TtyTransport::new()),
        };
        Ok(Self {
            inner: Mutex::new(Inner {
                param,
                transport,
                state: LinkState::Disconnected,
                recv_scratch: RecvScratch::new(),
                send_bytes: 0,
                recv_bytes: 0,
                connected_fired: false,
            }),
            connected_cb: Arc::new(connected_cb),
            disconnected_cb: Arc::new(disconnected_cb),
        })
    }

    /// Zero the byte counters and mark the transport enabled. Does not
    /// itself connect; kinds that need an eager socket (tcp_server's listen)
    /// do so here, everything else connects lazily on first `send`.
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.send_bytes = 0;
        guard.recv_bytes = 0;

        if let ConnectionParam::TcpServer(cfg) = guard.param.clone() {
            if let Transport::TcpServer(server) = &mut guard.transport {
                server.listen(&cfg.ip, cfg.port).await?;
            }
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        disconnect_transport(&mut guard.transport);
        guard.state = LinkState::Disconnected;
        Ok(())
    }

    /// Atomically tear down and rebuild with new parameters, preserving the
    /// connected/disconnected callbacks already installed.
    pub async fn reconfig(&self, param: ConnectionParam) -> Result<()> {
        param.validate()?;
        let mut guard = self.inner.lock().await;
        disconnect_transport(&mut guard.transport);
        guard.transport = match &param {
            ConnectionParam::TcpClient(_) => Transport::TcpClient(TcpClientTransport::new()),
            ConnectionParam::TcpServer(cfg) => Transport::TcpServer(TcpServerTransport::new(cfg.max_link)),
            ConnectionParam::UdpConnected(_) => Transport::UdpConnected(UdpConnectedTransport::new()),
            ConnectionParam::UdpTo(_) => Transport::UdpTo(UdpToTransport::new()),
            ConnectionParam::Tty(_) => Transport::Tty(TtyTransport::new()),
        };
        guard.param = param;
        guard.state = LinkState::Disconnected;
        guard.connected_fired = false;
        guard.recv_scratch = RecvScratch::new();
        Ok(())
    }

    pub async fn destroy(&self) {
        let mut guard = self.inner.lock().await;
        disconnect_transport(&mut guard.transport);
        guard.state = LinkState::Disconnected;
    }

    pub async fn state(&self) -> ConnectionState {
        let guard = self.inner.lock().await;
        ConnectionState {
            send_bytes: guard.send_bytes,
            recv_bytes: guard.recv_bytes,
            link_state: guard.state,
        }
    }

    /// Lazily connects on first call; retries up to `MAX_SEND_RETRIES` times
    /// on a short non-blocking write before surfacing an error.
    pub async fn send(&self, buf: &[u8]) -> Result<usize> {
        let mut guard = self.inner.lock().await;
        self.ensure_connected(&mut guard).await?;

        let mut sent = 0usize;
        let mut attempts = 0u32;
        while sent < buf.len() {
            let result = match &mut guard.transport {
                Transport::TcpClient(t) => t.send(&buf[sent..]).await,
                Transport::UdpConnected(t) => t.send(&buf[sent..]).await,
                Transport::Tty(t) => t.send(buf[sent..].to_vec()).await,
                Transport::TcpServer(_) | Transport::UdpTo(_) => {
                    return Err(NeuError::domain(ErrorCode::ENotSup, "use the per-peer send variant for this kind"))
                }
            };
            match result {
                Ok(0) if attempts < MAX_SEND_RETRIES => {
                    attempts += 1;
                    tokio::time::sleep(SEND_RETRY_BACKOFF).await;
                }
                Ok(0) => {
                    self.note_disconnect(&mut guard);
                    return Err(NeuError::domain(ErrorCode::EMsgSize, "short write exhausted retries"));
                }
                Ok(n) => {
                    sent += n;
                    attempts = 0;
                }
                Err(e) if e.code() == ErrorCode::EAgain && attempts < MAX_SEND_RETRIES => {
                    attempts += 1;
                    tokio::time::sleep(SEND_RETRY_BACKOFF).await;
                }
                Err(e) => {
                    self.note_disconnect(&mut guard);
                    return Err(e);
                }
            }
        }
        guard.send_bytes += sent as u64;
        Ok(sent)
    }

    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.inner.lock().await;
        self.ensure_connected(&mut guard).await?;
        let result = match &mut guard.transport {
            Transport::TcpClient(t) => t.recv(buf).await,
            Transport::UdpConnected(t) => t.recv(buf).await,
            Transport::Tty(t) => t.recv(buf.len()).await.map(|data| {
                let n = data.len();
                buf[..n].copy_from_slice(&data);
                n
            }),
            Transport::TcpServer(_) | Transport::UdpTo(_) => {
                return Err(NeuError::domain(ErrorCode::ENotSup, "use the per-peer recv variant for this kind"))
            }
        };
        match result {
            Ok(n) => {
                guard.recv_bytes += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.note_disconnect(&mut guard);
                Err(e)
            }
        }
    }

    pub async fn tcp_server_accept(&self) -> Result<u32> {
        let mut guard = self.inner.lock().await;
        match &mut guard.transport {
            Transport::TcpServer(server) => server.accept().await,
            _ => Err(NeuError::domain(ErrorCode::ENotSup, "not a tcp_server connection")),
        }
    }

    pub async fn tcp_server_send(&self, fd: u32, buf: &[u8]) -> Result<usize> {
        let mut guard = self.inner.lock().await;
        match &mut guard.transport {
            Transport::TcpServer(server) => {
                let n = server.send(fd, buf).await?;
                guard.send_bytes += n as u64;
                Ok(n)
            }
            _ => Err(NeuError::domain(ErrorCode::ENotSup, "not a tcp_server connection")),
        }
    }

    pub async fn tcp_server_recv(&self, fd: u32, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.inner.lock().await;
        match &mut guard.transport {
            Transport::TcpServer(server) => {
                let n = server.recv(fd, buf).await?;
                guard.recv_bytes += n as u64;
                Ok(n)
            }
            _ => Err(NeuError::domain(ErrorCode::ENotSup, "not a tcp_server connection")),
        }
    }

    pub async fn tcp_server_close_client(&self, fd: u32) -> Result<()> {
        let mut guard = self.inner.lock().await;
        match &mut guard.transport {
            Transport::TcpServer(server) => {
                server.close_client(fd);
                Ok(())
            }
            _ => Err(NeuError::domain(ErrorCode::ENotSup, "not a tcp_server connection")),
        }
    }

    pub async fn udp_sendto(&self, buf: &[u8], dst: SocketAddr) -> Result<usize> {
        let mut guard = self.inner.lock().await;
        match &mut guard.transport {
            Transport::UdpTo(t) => {
                let n = t.send_to(buf, dst).await?;
                guard.send_bytes += n as u64;
                Ok(n)
            }
            _ => Err(NeuError::domain(ErrorCode::ENotSup, "not a udp_to connection")),
        }
    }

    pub async fn udp_recvfrom(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let mut guard = self.inner.lock().await;
        match &mut guard.transport {
            Transport::UdpTo(t) => {
                let (n, from) = t.recv_from(buf).await?;
                guard.recv_bytes += n as u64;
                Ok((n, from))
            }
            _ => Err(NeuError::domain(ErrorCode::ENotSup, "not a udp_to connection")),
        }
    }

    /// Streaming read: pull whatever is available, append it, then drive the
    /// framer until it asks for more.
    pub async fn stream_consume(&self, framer: impl FnMut(&[u8]) -> StreamOutcome) -> Result<()> {
        let mut guard = self.inner.lock().await;
        self.ensure_connected(&mut guard).await?;
        let mut chunk = [0u8; 2048];
        let n = read_chunk(&mut guard.transport, &mut chunk).await?;
        guard.recv_bytes += n as u64;
        guard.recv_scratch.append(&chunk[..n])?;
        let still_open = guard.recv_scratch.drive_stream_consume(framer)?;
        if !still_open {
            self.note_disconnect(&mut guard);
        }
        Ok(())
    }

    /// Blocking request/response form: repeatedly read `need` bytes until
    /// the framer reports completion (`need == Some(0)`) or disconnect.
    pub async fn wait_msg(&self, min_bytes: usize, mut framer: impl FnMut(&[u8]) -> WaitOutcome) -> Result<Vec<u8>> {
        let mut guard = self.inner.lock().await;
        self.ensure_connected(&mut guard).await?;

        let mut need = min_bytes;
        loop {
            guard.recv_scratch.reserve_need(need, 1 << 20)?;
            let mut chunk = vec![0u8; need];
            let n = read_chunk(&mut guard.transport, &mut chunk).await?;
            guard.recv_bytes += n as u64;
            guard.recv_scratch.append(&chunk[..n])?;

            let outcome = framer(guard.recv_scratch.as_slice());
            guard.recv_scratch.consume(outcome.used);
            match outcome.need {
                Some(0) => return Ok(guard.recv_scratch.as_slice().to_vec()),
                Some(more) => need = more,
                None => {
                    self.note_disconnect(&mut guard);
                    return Err(NeuError::domain(ErrorCode::EProto, "wait_msg framer forced disconnect"));
                }
            }
        }
    }

    async fn ensure_connected(&self, guard: &mut Inner) -> Result<()> {
        if guard.state == LinkState::Connected {
            return Ok(());
        }
        guard.state = LinkState::Connecting;
        let result = match (&mut guard.transport, &guard.param) {
            (Transport::TcpClient(t), ConnectionParam::TcpClient(cfg)) => t.connect(cfg).await,
            (Transport::UdpConnected(t), ConnectionParam::UdpConnected(cfg)) => t.open(cfg).await,
            (Transport::UdpTo(t), ConnectionParam::UdpTo(cfg)) => t.open(cfg).await,
            (Transport::Tty(t), ConnectionParam::Tty(cfg)) => t.open(cfg.clone()).await,
            (Transport::TcpServer(_), _) => Ok(()),
            _ => unreachable!("transport/param kind mismatch"),
        };
        match result {
            Ok(()) => {
                guard.state = LinkState::Connected;
                if !guard.connected_fired {
                    guard.connected_fired = true;
                    (self.connected_cb)();
                }
                Ok(())
            }
            Err(e) => {
                guard.state = LinkState::Disconnected;
                Err(e)
            }
        }
    }

    fn note_disconnect(&self, guard: &mut Inner) {
        if guard.state != LinkState::Disconnected {
            guard.state = LinkState::Disconnected;
            guard.connected_fired = false;
            (self.disconnected_cb)();
        }
    }
}

async fn read_chunk(transport: &mut Transport, buf: &mut [u8]) -> Result<usize> {
    match transport {
        Transport::TcpClient(t) => t.recv(buf).await,
        Transport::UdpConnected(t) => t.recv(buf).await,
        Transport::Tty(t) => t.recv(buf.len()).await.map(|data| {
            let n = data.len();
            buf[..n].copy_from_slice(&data);
            n
        }),
        Transport::TcpServer(_) | Transport::UdpTo(_) => {
            Err(NeuError::domain(ErrorCode::ENotSup, "framing helpers need a peer-addressed kind"))
        }
    }
}

fn disconnect_transport(transport: &mut Transport) {
    match transport {
        Transport::TcpClient(t) => t.close(),
        Transport::TcpServer(_) => {}
        Transport::UdpConnected(_) | Transport::UdpTo(_) => {}
        Transport::Tty(t) => t.close(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TcpClientConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_lazily_connects_and_fires_connected_cb_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut s, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    use tokio::io::AsyncReadExt;
                    let mut buf = [0u8; 64];
                    let _ = s.read(&mut buf).await;
                });
            }
        });

        let connected = Arc::new(AtomicBool::new(false));
        let c = Arc::clone(&connected);
        let conn = Connection::new(
            ConnectionParam::TcpClient(TcpClientConfig { ip: addr.ip().to_string(), port: addr.port(), timeout_ms: 500 }),
            move || c.store(true, Ordering::SeqCst),
            || {},
        )
        .unwrap();

        conn.send(b"hi").await.unwrap();
        assert!(connected.load(Ordering::SeqCst));
        assert_eq!(conn.state().await.send_bytes, 2);
    }
}
