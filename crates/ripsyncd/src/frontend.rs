//! Receive loop: one advertisement datagram at a time.
//!
//! The only suspension point in the daemon is the receive below. Everything
//! that happens to a datagram runs to completion before the next receive,
//! so every kernel effect of one advertisement is observable before the
//! next one is processed.

use async_trait::async_trait;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info};

use crate::engine::Reconciler;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::model::UnixSecs;
use crate::rip::{RipPacket, PASSWORD_LEN};

/// Largest datagram the listener will accept (IP_MAXPACKET).
pub const MAX_PACKET: usize = 65535;

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> UnixSecs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A source of advertisement frames: the multicast socket in normal
/// operation, a framed capture file in replay mode.
#[async_trait]
pub trait PacketSource {
    /// Receives one frame into `buf` and returns its length, or `None`
    /// once the source is exhausted. Only file replay ever returns `None`.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

/// Live multicast listener.
pub struct UdpSource {
    socket: tokio::net::UdpSocket,
}

impl UdpSource {
    /// Wraps an already bound and multicast-joined datagram socket.
    pub fn new(socket: std::net::UdpSocket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(UdpSource {
            socket: tokio::net::UdpSocket::from_std(socket)?,
        })
    }
}

#[async_trait]
impl PacketSource for UdpSource {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let (n, from) = self.socket.recv_from(buf).await?;
        debug!("received {} bytes from {}", n, from);
        Ok(Some(n))
    }
}

/// Replay source reading length-framed packets: each frame is a 2-byte
/// big-endian length followed by the raw packet bytes.
pub struct FileSource<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin + Send> FileSource<R> {
    pub fn new(reader: R) -> Self {
        FileSource {
            reader: BufReader::new(reader),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PacketSource for FileSource<R> {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut header = [0u8; 2];
        match self.reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let len = u16::from_be_bytes(header) as usize;
        if len > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds the receive buffer", len),
            ));
        }
        self.reader.read_exact(&mut buf[..len]).await?;
        Ok(Some(len))
    }
}

/// Runs the receive loop until the source is exhausted (replay) or a fatal
/// error surfaces. The socket path never returns `Ok`.
pub async fn run<K, S>(
    source: &mut S,
    reconciler: &mut Reconciler<K>,
    password: &[u8; PASSWORD_LEN],
) -> Result<()>
where
    K: Kernel,
    S: PacketSource + ?Sized,
{
    let mut buf = vec![0u8; MAX_PACKET];
    loop {
        let Some(n) = source.recv(&mut buf).await? else {
            info!("advertisement input exhausted");
            return Ok(());
        };
        process_datagram(&buf[..n], reconciler, password, unix_now())?;
    }
}

/// Handles one datagram: parse, authenticate, reconcile every response,
/// then run one expiry pass. Unparseable or unauthenticated packets are
/// dropped; bad entries are skipped; only kernel failures propagate.
pub fn process_datagram<K: Kernel>(
    datagram: &[u8],
    reconciler: &mut Reconciler<K>,
    password: &[u8; PASSWORD_LEN],
    now: UnixSecs,
) -> Result<()> {
    let packet = match RipPacket::parse(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            info!("dropping packet: {}", e);
            return Ok(());
        }
    };
    if let Err(e) = packet.verify_auth(password) {
        info!("dropping packet: {}", e);
        return Ok(());
    }
    for index in 0..packet.responses() {
        match packet.response(index) {
            Ok(response) => reconciler.process_response(&response, now)?,
            Err(e) => info!("bad response, index {}: {}", index, e),
        }
    }
    reconciler.expire(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_source_framing() {
        let mut data = Vec::new();
        for frame in [&b"abc"[..], &b"defgh"[..]] {
            data.extend_from_slice(&(frame.len() as u16).to_be_bytes());
            data.extend_from_slice(frame);
        }
        let mut source = FileSource::new(std::io::Cursor::new(data));
        let mut buf = [0u8; 64];
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some(5));
        assert_eq!(&buf[..5], b"defgh");
        assert_eq!(source.recv(&mut buf).await.unwrap(), None);
        // EOF is sticky
        assert_eq!(source.recv(&mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_source_truncated_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(&10u16.to_be_bytes());
        data.extend_from_slice(b"shor");
        let mut source = FileSource::new(std::io::Cursor::new(data));
        let mut buf = [0u8; 64];
        assert!(source.recv(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_oversized_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(&100u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 100]);
        let mut source = FileSource::new(std::io::Cursor::new(data));
        let mut buf = [0u8; 8];
        let err = source.recv(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
