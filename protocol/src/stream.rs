//! Length+sequence framing over a byte stream.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_packets.html

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_native_tls::{TlsAcceptor, TlsStream};

use mimic_common::err::{ServerError, SqlResult};

use crate::codec::put_u24;
use crate::{MAX_PAYLOAD_LEN, PACKET_HEADER_SIZE};

/// A transport that may have been upgraded to TLS in place.
pub enum MaybeTls<T> {
    Plain(T),
    Tls(Box<TlsStream<T>>),
}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncRead for MaybeTls<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(t) => Pin::new(t).poll_read(cx, buf),
            MaybeTls::Tls(t) => Pin::new(t.as_mut()).poll_read(cx, buf),
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncWrite for MaybeTls<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTls::Plain(t) => Pin::new(t).poll_write(cx, buf),
            MaybeTls::Tls(t) => Pin::new(t.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(t) => Pin::new(t).poll_flush(cx),
            MaybeTls::Tls(t) => Pin::new(t.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTls::Plain(t) => Pin::new(t).poll_shutdown(cx),
            MaybeTls::Tls(t) => Pin::new(t.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Packet framing over a transport. Reads verify the sequence counter;
/// writes buffer until [`PacketStream::flush`].
pub struct PacketStream<T> {
    io: Option<MaybeTls<T>>,
    seq: u8,
    wbuf: BytesMut,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> PacketStream<T> {
    pub fn new(io: T) -> Self {
        PacketStream {
            io: Some(MaybeTls::Plain(io)),
            seq: 0,
            wbuf: BytesMut::new(),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.io, Some(MaybeTls::Tls(_)))
    }

    /// Read one logical payload, reassembling frames split at the 16 MiB - 1
    /// boundary. A clean EOF before any header byte is reported as
    /// [`ServerError::ConnectionClosed`].
    pub async fn read_packet(&mut self) -> SqlResult<Vec<u8>> {
        let mut payload: Vec<u8> = Vec::new();

        loop {
            let io = self.io.as_mut().ok_or(ServerError::ConnectionClosed)?;

            let mut header = [0u8; PACKET_HEADER_SIZE];
            let mut filled = 0;
            while filled < PACKET_HEADER_SIZE {
                let n = io.read(&mut header[filled..]).await?;
                if n == 0 {
                    if filled == 0 && payload.is_empty() {
                        return Err(ServerError::ConnectionClosed);
                    }
                    return Err(ServerError::malformed("eof inside packet header"));
                }
                filled += n;
            }

            let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
            let seq = header[3];
            if seq != self.seq {
                return Err(ServerError::malformed(format!(
                    "expected seq({}) got seq({})",
                    self.seq, seq
                )));
            }
            self.seq = self.seq.wrapping_add(1);

            if len == 0 {
                return Ok(payload);
            }

            let start = payload.len();
            payload.resize(start + len, 0);
            io.read_exact(&mut payload[start..]).await.map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    ServerError::malformed("eof inside packet payload")
                } else {
                    ServerError::from(e)
                }
            })?;

            if len < MAX_PAYLOAD_LEN {
                return Ok(payload);
            }
        }
    }

    /// Queue one logical payload, splitting it into frames as needed. A
    /// payload that ends exactly on the frame boundary is terminated with
    /// an empty frame.
    pub fn write_packet(&mut self, payload: &[u8]) {
        let mut data = payload;
        loop {
            let chunk_len = data.len().min(MAX_PAYLOAD_LEN);
            let (chunk, rest) = data.split_at(chunk_len);

            put_u24(&mut self.wbuf, chunk_len as u32);
            self.wbuf.put_u8(self.seq);
            self.seq = self.seq.wrapping_add(1);
            self.wbuf.put_slice(chunk);

            data = rest;
            if chunk_len != MAX_PAYLOAD_LEN {
                return;
            }
        }
    }

    pub async fn flush(&mut self) -> SqlResult<()> {
        let io = self.io.as_mut().ok_or(ServerError::ConnectionClosed)?;
        if !self.wbuf.is_empty() {
            let buf = self.wbuf.split();
            io.write_all(&buf).await?;
        }
        io.flush().await?;
        Ok(())
    }

    /// Sequence numbers restart at every command boundary.
    pub fn reset_seq(&mut self) {
        self.seq = 0;
    }

    /// Wrap the transport in a server-side TLS session. Must complete
    /// before the next read or write.
    pub async fn upgrade_tls(&mut self, acceptor: &TlsAcceptor) -> SqlResult<()> {
        self.flush().await?;
        match self.io.take().ok_or(ServerError::ConnectionClosed)? {
            MaybeTls::Plain(t) => {
                let tls = acceptor
                    .accept(t)
                    .await
                    .map_err(|e| ServerError::Tls(e.to_string()))?;
                self.io = Some(MaybeTls::Tls(Box::new(tls)));
                Ok(())
            }
            tls @ MaybeTls::Tls(_) => {
                self.io = Some(tls);
                Ok(())
            }
        }
    }

    pub async fn shutdown(&mut self) -> SqlResult<()> {
        if let Some(io) = self.io.as_mut() {
            io.shutdown().await.ok();
        }
        self.io = None;
        Ok(())
    }
}
