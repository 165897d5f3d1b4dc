//! Local-socket [`CommandSource`] implementation.
//!
//! Binds a Unix stream socket (a loopback TCP port where Unix sockets are
//! unavailable) and serves every accepted connection in its own task.
//! Each line received is parsed as a JSON-encoded [`Command`] and answered
//! with one JSON-encoded [`Reply`] line once the service has handled it.
//!
//! # Wire format
//!
//! ```json
//! {"ListWindows":{"extra_apps":["Code"]}}
//! {"SetVisibility":{"visible":true}}
//! "Links"
//! "Subscribe"
//! ```
//!
//! After `"Subscribe"` the connection only receives `{"Links":{...}}`
//! lines, one per published change, starting with the current report.

use crate::command::{Command, Envelope, Reply};
use crate::config::IpcConfig;
use crate::reconcile::LinkReport;
use crate::traits::CommandSource;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};

/// Loopback port used when no socket path is available.
pub const DEFAULT_TCP_PORT: u16 = 47_800;

/// Where the listener binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    #[cfg(unix)]
    Unix(PathBuf),
    Tcp(u16),
}

/// Default socket path: `$XDG_RUNTIME_DIR/cardwin.sock`, or `/tmp`.
pub fn default_socket_path() -> PathBuf {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(runtime).join("cardwin.sock")
}

impl Endpoint {
    #[cfg(unix)]
    pub fn from_config(config: &IpcConfig) -> Self {
        Endpoint::Unix(config.socket_path.clone().unwrap_or_else(default_socket_path))
    }

    #[cfg(not(unix))]
    pub fn from_config(config: &IpcConfig) -> Self {
        Endpoint::Tcp(config.tcp_port.unwrap_or(DEFAULT_TCP_PORT))
    }
}

/// Errors produced by the socket listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A [`CommandSource`] serving newline-delimited JSON on a local socket.
pub struct SocketListener {
    endpoint: Endpoint,
    links: watch::Receiver<LinkReport>,
}

impl SocketListener {
    /// `links` feeds connections that subscribe to link reports.
    pub fn new(endpoint: Endpoint, links: watch::Receiver<LinkReport>) -> Self {
        Self { endpoint, links }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn serve<S>(&self, stream: S, sink: &mpsc::Sender<Envelope>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let sink = sink.clone();
        let links = self.links.clone();
        tokio::spawn(async move {
            debug!("client connected");
            if let Err(e) = serve_connection(stream, sink, links).await {
                warn!("connection error: {}", e);
            }
            debug!("client disconnected");
        });
    }
}

#[async_trait]
impl CommandSource for SocketListener {
    type Error = ListenerError;

    /// Bind the socket and accept connections until the sink closes.
    async fn run(&mut self, sink: mpsc::Sender<Envelope>) -> Result<(), Self::Error> {
        match &self.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                // Remove stale socket if present.
                let _ = tokio::fs::remove_file(path).await;
                let listener = tokio::net::UnixListener::bind(path)?;
                info!("listening on {}", path.display());
                while !sink.is_closed() {
                    match listener.accept().await {
                        Ok((stream, _)) => self.serve(stream, &sink),
                        Err(e) => error!("accept error: {}", e),
                    }
                }
            }
            Endpoint::Tcp(port) => {
                let listener = tokio::net::TcpListener::bind(("127.0.0.1", *port)).await?;
                info!("listening on {}", listener.local_addr()?);
                while !sink.is_closed() {
                    match listener.accept().await {
                        Ok((stream, _)) => self.serve(stream, &sink),
                        Err(e) => error!("accept error: {}", e),
                    }
                }
            }
        }
        info!("sink closed, shutting down");
        Ok(())
    }
}

async fn write_reply<W>(write: &mut W, reply: &Reply) -> Result<(), ListenerError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(reply)?;
    line.push('\n');
    write.write_all(line.as_bytes()).await?;
    write.flush().await?;
    Ok(())
}

async fn serve_connection<S>(
    stream: S,
    sink: mpsc::Sender<Envelope>,
    mut links: watch::Receiver<LinkReport>,
) -> Result<(), ListenerError>
where
    S: AsyncRead + AsyncWrite,
{
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let command = match serde_json::from_str::<Command>(text) {
            Ok(command) => command,
            Err(e) => {
                warn!("bad command: {} ({})", text, e);
                write_reply(&mut write, &Reply::error(format!("bad command: {}", e))).await?;
                continue;
            }
        };
        debug!("received {:?}", command);

        if command == Command::Subscribe {
            let current = links.borrow_and_update().clone();
            write_reply(&mut write, &Reply::Links(current)).await?;
            loop {
                tokio::select! {
                    changed = links.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                        let report = links.borrow_and_update().clone();
                        write_reply(&mut write, &Reply::Links(report)).await?;
                    }
                    // Input after subscribing is ignored; EOF ends the stream.
                    line = lines.next_line() => {
                        if line?.is_none() {
                            return Ok(());
                        }
                    }
                }
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            command,
            reply: reply_tx,
        };
        if sink.send(envelope).await.is_err() {
            return Ok(());
        }
        let reply = reply_rx
            .await
            .unwrap_or_else(|_| Reply::error("command was dropped"));
        write_reply(&mut write, &reply).await?;
    }
    Ok(())
}

//  Tests

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("cardwin-test-{}-{}.sock", std::process::id(), id))
    }

    /// Answer every command with `Ok`, except `Links`.
    fn spawn_responder(mut rx: mpsc::Receiver<Envelope>) {
        tokio::spawn(async move {
            while let Some(env) = rx.recv().await {
                let reply = match env.command {
                    Command::Links => Reply::Links(LinkReport::default()),
                    _ => Reply::Ok,
                };
                let _ = env.reply.send(reply);
            }
        });
    }

    async fn connect(path: &Path) -> UnixStream {
        for _ in 0..100 {
            if let Ok(stream) = UnixStream::connect(path).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("listener never bound {}", path.display());
    }

    fn start(path: &Path, links: watch::Receiver<LinkReport>) {
        let (tx, rx) = mpsc::channel(8);
        spawn_responder(rx);
        let mut listener = SocketListener::new(Endpoint::Unix(path.to_path_buf()), links);
        tokio::spawn(async move {
            let _ = listener.run(tx).await;
        });
    }

    async fn read_reply<R>(lines: &mut tokio::io::Lines<R>) -> Reply
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("reply timed out")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn commands_get_one_reply_each() {
        let path = tmp_socket_path();
        let (_links_tx, links_rx) = watch::channel(LinkReport::default());
        start(&path, links_rx);

        let (read, mut write) = connect(&path).await.into_split();
        let mut lines = BufReader::new(read).lines();
        write
            .write_all(b"{\"SetVisibility\":{\"visible\":true}}\n\"Links\"\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut lines).await, Reply::Ok);
        assert_eq!(read_reply(&mut lines).await, Reply::Links(LinkReport::default()));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn malformed_json_is_answered_and_connection_survives() {
        let path = tmp_socket_path();
        let (_links_tx, links_rx) = watch::channel(LinkReport::default());
        start(&path, links_rx);

        let (read, mut write) = connect(&path).await.into_split();
        let mut lines = BufReader::new(read).lines();
        write
            .write_all(b"not json at all\n\n\"GetDisplays\"\n")
            .await
            .unwrap();
        assert!(matches!(read_reply(&mut lines).await, Reply::Error { .. }));
        assert_eq!(read_reply(&mut lines).await, Reply::Ok);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn subscribe_streams_changes() {
        let path = tmp_socket_path();
        let (links_tx, links_rx) = watch::channel(LinkReport::default());
        start(&path, links_rx);

        let (read, mut write) = connect(&path).await.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"\"Subscribe\"\n").await.unwrap();
        assert_eq!(read_reply(&mut lines).await, Reply::Links(LinkReport::default()));

        let report = LinkReport {
            active_app: "Terminal".into(),
            broken: vec!["c1".into()],
            ..LinkReport::default()
        };
        links_tx.send_replace(report.clone());
        assert_eq!(read_reply(&mut lines).await, Reply::Links(report));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn endpoint_prefers_configured_socket() {
        let config = IpcConfig {
            socket_path: Some(PathBuf::from("/run/user/1000/board.sock")),
            tcp_port: None,
        };
        assert_eq!(
            Endpoint::from_config(&config),
            Endpoint::Unix(PathBuf::from("/run/user/1000/board.sock"))
        );
        assert!(default_socket_path().ends_with("cardwin.sock"));
    }
}
