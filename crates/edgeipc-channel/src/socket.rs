use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use edgeipc_frame::{FrameReader, FrameWriter};
use edgeipc_transport::{IpcStream, UnixDomainSocket};
use tracing::{debug, info, warn};

use crate::config::{clamp_timeout, ChannelConfig, ServeOptions};
use crate::error::{ChannelError, ErrorKind, Result};

/// A bound, listening socket that hands out one [`Connection`] per accept.
#[derive(Debug)]
pub struct SocketServer {
    socket: UnixDomainSocket,
    config: ChannelConfig,
}

impl SocketServer {
    /// Bind a server at `path`, replacing any stale entry there.
    pub fn create(path: impl AsRef<Path>, config: ChannelConfig) -> Result<Self> {
        let socket = UnixDomainSocket::bind_with_mode(path, config.socket_mode)?;
        info!(path = ?socket.path(), "listening");
        Ok(Self { socket, config })
    }

    /// Wait up to `timeout` for one client.
    pub fn accept_one(&self, timeout: Duration) -> Result<Connection> {
        let stream = self.socket.accept_timeout(timeout)?;
        Connection::from_stream(stream, &self.config)
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

/// Bind a server at `path` with default settings.
pub fn create_server(path: impl AsRef<Path>) -> Result<SocketServer> {
    SocketServer::create(path, ChannelConfig::default())
}

/// One accepted or connected stream.
///
/// The stream is shut down when the connection is dropped.
pub struct Connection {
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
}

impl Connection {
    /// Connect to the server listening at `path`.
    pub fn connect(path: impl AsRef<Path>, config: &ChannelConfig) -> Result<Self> {
        let stream = UnixDomainSocket::connect(path)?;
        Self::from_stream(stream, config)
    }

    fn from_stream(stream: IpcStream, config: &ChannelConfig) -> Result<Self> {
        let frame_config = config.frame_config();
        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_ipc(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_ipc(stream, frame_config)?;
        Ok(Self { reader, writer })
    }

    /// Read one frame, waiting at most `timeout`.
    pub fn receive_frame(&mut self, timeout: Duration) -> Result<Bytes> {
        self.reader
            .get_ref()
            .set_read_timeout(Some(clamp_timeout(timeout)))?;
        let frame = self.reader.read_frame()?;
        debug!(len = frame.payload.len(), "received frame");
        Ok(frame.payload)
    }

    /// Read the raw `len`-byte trailer that follows a frame.
    pub fn receive_trailer(&mut self, len: usize, timeout: Duration) -> Result<Bytes> {
        self.reader
            .get_ref()
            .set_read_timeout(Some(clamp_timeout(timeout)))?;
        Ok(self.reader.read_trailer(len)?)
    }

    /// Write `payload` as one frame.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.send(payload)?;
        debug!(len = payload.len(), "sent frame");
        Ok(())
    }

    /// Write raw bytes with no length prefix.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.writer.send_raw(bytes)?)
    }

    /// Shut the stream down in both directions.
    pub fn close(self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("stream", self.writer.get_ref())
            .field("max_payload_size", &self.reader.config().max_payload_size)
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.writer.get_ref().shutdown();
    }
}

/// Connect to `path`, send one frame and close.
pub fn connect_and_send(path: impl AsRef<Path>, payload: &[u8], timeout: Duration) -> Result<()> {
    let mut conn = Connection::connect(path, &ChannelConfig::with_timeout(timeout))?;
    conn.send_frame(payload)?;
    conn.close()
}

/// Connect to `path`, send one frame followed by an unprefixed trailer, and close.
pub fn connect_send_with_trailer(
    path: impl AsRef<Path>,
    payload: &[u8],
    trailer: &[u8],
    timeout: Duration,
) -> Result<()> {
    let mut conn = Connection::connect(path, &ChannelConfig::with_timeout(timeout))?;
    conn.send_frame(payload)?;
    conn.send_raw(trailer)?;
    conn.close()
}

/// Connect to `path`, send one frame, read one response frame and close.
pub fn request(path: impl AsRef<Path>, payload: &[u8], timeout: Duration) -> Result<Bytes> {
    let mut conn = Connection::connect(path, &ChannelConfig::with_timeout(timeout))?;
    conn.send_frame(payload)?;
    let response = conn.receive_frame(timeout)?;
    conn.close()?;
    Ok(response)
}

/// Accept connections one at a time until `running` is cleared.
///
/// Each connection is handed to `handler` and closed when it returns.
/// Handler errors are logged and do not stop the loop. Returns the number of
/// connections handled.
pub fn serve_connections<F>(
    server: &SocketServer,
    options: &ServeOptions,
    running: &AtomicBool,
    mut handler: F,
) -> Result<usize>
where
    F: FnMut(&mut Connection) -> Result<()>,
{
    let mut handled = 0;
    while running.load(Ordering::SeqCst) {
        let mut conn = match server.accept_one(options.accept_timeout) {
            Ok(conn) => conn,
            Err(err) if err.kind() == ErrorKind::Timeout => continue,
            Err(err) => return Err(err),
        };

        handled += 1;
        if let Err(err) = handler(&mut conn) {
            warn!(error = %err, "connection failed");
        }
    }
    debug!(handled, "serve loop stopped");
    Ok(handled)
}

/// Accept loop answering one request frame per connection.
///
/// `handler` receives each request payload; a returned payload is sent back
/// as the response frame.
pub fn serve<F>(
    server: &SocketServer,
    options: &ServeOptions,
    running: &AtomicBool,
    mut handler: F,
) -> Result<usize>
where
    F: FnMut(Bytes) -> Option<Bytes>,
{
    serve_connections(server, options, running, |conn| {
        let request = conn.receive_frame(options.receive_timeout)?;
        if let Some(response) = handler(request) {
            conn.send_frame(&response)?;
        }
        Ok::<(), ChannelError>(())
    })
}
