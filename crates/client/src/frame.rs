//! The outermost wire framing: `protocol_tag u8 | length u32 LE | payload`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Cap on a single frame, far above any real message. A length beyond this
/// means a corrupt or hostile stream.
pub const MAX_FRAME_PAYLOAD: usize = 64 << 20;

pub const HEADER_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Key = 0x01,
    Rsa = 0x02,
    Aes = 0x03,
    ConnectionResponse = 0x04,
    Disconnect = 0x05,
    Heartbeat = 0x06,
}

impl FrameKind {
    pub fn from_u8(value: u8) -> Result<Self, FrameError> {
        Ok(match value {
            0x01 => Self::Key,
            0x02 => Self::Rsa,
            0x03 => Self::Aes,
            0x04 => Self::ConnectionResponse,
            0x05 => Self::Disconnect,
            0x06 => Self::Heartbeat,
            other => return Err(FrameError::InvalidKind(other)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame kind byte {0:#04x}")]
    InvalidKind(u8),
    #[error("frame payload of {0} bytes exceeds the limit")]
    Oversized(usize),
    #[error("stream closed mid-frame")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

pub fn encode(kind: FrameKind, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_u8(kind as u8);
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Incremental deframer for the non-blocking receive path: feed it whatever
/// the socket produced and pull complete frames out as they materialize.
#[derive(Debug, Default)]
pub struct Deframer {
    buf: BytesMut,
}

impl Deframer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let kind = FrameKind::from_u8(self.buf[0])?;
        let len = u32::from_le_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(FrameError::Oversized(len));
        }
        if self.buf.len() < HEADER_SIZE + len {
            return Ok(None);
        }
        self.buf.advance(HEADER_SIZE);
        let payload = self.buf.split_to(len).freeze();
        Ok(Some(Frame { kind, payload }))
    }
}

/// Reads one complete frame, waiting for it. Used during the handshake,
/// where the protocol is strictly turn-based.
pub async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Frame, FrameError> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await.map_err(eof_as_closed)?;

    let kind = FrameKind::from_u8(header[0])?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_FRAME_PAYLOAD {
        return Err(FrameError::Oversized(len));
    }

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(eof_as_closed)?;
    Ok(Frame {
        kind,
        payload: payload.into(),
    })
}

fn eof_as_closed(err: std::io::Error) -> FrameError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::Closed
    } else {
        FrameError::Io(err)
    }
}
