//! Connection events and the stream loops that raise them

use bytes::Bytes;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::address::{Channel, HardwareAddress};

/// The four events a wireless connection reports.
///
/// Handlers run on the hive pump thread and must not block it for long.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// An inbound connection request was accepted
    fn on_accept(&self, peer: HardwareAddress, channel: Channel);

    /// An outbound connect handshake completed
    fn on_connect(&self, peer: HardwareAddress, channel: Channel);

    /// A chunk of bytes arrived
    fn on_recv(&self, chunk: &[u8]);

    /// The link failed
    fn on_error(&self, error: &io::Error);

    /// The peer closed the link cleanly
    fn on_close(&self) {}
}

/// Read until the peer closes, re-arming the next read after every chunk.
///
/// Returns `Ok(())` on a clean end of stream.
pub async fn recv_loop<R, H>(mut reader: R, chunk_size: usize, handler: &H) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    H: ConnectionHandler + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size];

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        handler.on_recv(&buffer[..read]);
    }
}

/// Write queued payloads in order until the queue closes.
pub async fn send_loop<W>(mut writer: W, mut outgoing: mpsc::Receiver<Bytes>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = outgoing.recv().await {
        writer.write_all(&payload).await?;
        writer.flush().await?;
    }

    writer.shutdown().await
}
