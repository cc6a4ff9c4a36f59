//! Framed duplex channel over a pair of byte streams.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use travel_common::constants::HEADER_LEN;

use super::{ChannelError, Message, decode_frame, encode_frame};

/// One end of a coordinator/worker pipe pair.
///
/// `recv` is cancel safe: bytes are only ever moved into the channel's own
/// buffer, so a `recv` dropped by `tokio::select!` loses nothing and can be
/// retried.
pub struct Channel<R, W> {
    reader: R,
    writer: W,
    buffer_size: usize,
    inbound: BytesMut,
}

impl<R, W> Channel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a channel. Until `set_buffer_size` is called, I/O happens in
    /// header-sized chunks.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buffer_size: HEADER_LEN,
            inbound: BytesMut::new(),
        }
    }

    pub fn with_buffer_size(reader: R, writer: W, buffer_size: usize) -> Self {
        let mut channel = Self::new(reader, writer);
        channel.set_buffer_size(buffer_size);
        channel
    }

    /// Apply the buffer size negotiated at bootstrap
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size.max(HEADER_LEN);
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Write one message, `buffer_size` bytes at a time.
    pub async fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        let frame = encode_frame(message)?;
        for chunk in frame.chunks(self.buffer_size) {
            self.writer.write_all(chunk).await.map_err(closed_or_io)?;
        }
        self.writer.flush().await.map_err(closed_or_io)?;
        Ok(())
    }

    /// Read the next message.
    ///
    /// A clean end of stream between frames is `Closed`; one inside a frame
    /// is `ShortRead`.
    pub async fn recv(&mut self) -> Result<Message, ChannelError> {
        loop {
            if let Some(message) = decode_frame(&mut self.inbound)? {
                return Ok(message);
            }

            self.inbound.reserve(self.buffer_size);
            let read = (&mut self.reader)
                .take(self.buffer_size as u64)
                .read_buf(&mut self.inbound)
                .await?;
            if read == 0 {
                return Err(if self.inbound.is_empty() {
                    ChannelError::Closed
                } else {
                    ChannelError::ShortRead
                });
            }
        }
    }
}

fn closed_or_io(err: std::io::Error) -> ChannelError {
    match err.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => ChannelError::Closed,
        _ => ChannelError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageKind;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};

    type TestChannel = Channel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn pair(buffer_size: usize) -> (TestChannel, TestChannel) {
        let (a, b) = duplex(64);
        let (ar, aw) = split(a);
        let (br, bw) = split(b);
        (
            Channel::with_buffer_size(ar, aw, buffer_size),
            Channel::with_buffer_size(br, bw, buffer_size),
        )
    }

    #[tokio::test]
    async fn test_messages_arrive_in_send_order() {
        let (mut left, mut right) = pair(8);

        let sender = async {
            left.send(&Message::Assign {
                country_dir: "input/Greece".into(),
            })
            .await
            .unwrap();
            left.send(&Message::Done).await.unwrap();
        };
        let receiver = async {
            let first = right.recv().await.unwrap();
            let second = right.recv().await.unwrap();
            (first, second)
        };

        let ((), (first, second)) = tokio::join!(sender, receiver);
        assert_eq!(
            first,
            Message::Assign {
                country_dir: "input/Greece".into()
            }
        );
        assert_eq!(second, Message::Done);
    }

    #[tokio::test]
    async fn test_large_payload_crosses_small_pipe() {
        let (mut left, mut right) = pair(16);
        let bits: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let snapshot = Message::BloomSnapshot {
            virus: "COVID19".into(),
            bits,
        };

        let expected = snapshot.clone();
        let (sent, received) = tokio::join!(left.send(&snapshot), right.recv());
        sent.unwrap();
        assert_eq!(received.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_send_writes_buffer_sized_chunks() {
        let message = Message::Assign {
            country_dir: "input/Greece".into(),
        };
        let frame = encode_frame(&message).unwrap();

        let mut writer = tokio_test::io::Builder::new();
        for chunk in frame.chunks(8) {
            writer.write(chunk);
        }
        let reader = tokio_test::io::Builder::new().build();

        let mut channel = Channel::with_buffer_size(reader, writer.build(), 8);
        channel.send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let message = Message::PersonVacc {
            virus: "H1N1".into(),
            status: travel_common::VaccinationStatus::NotVaccinated,
        };
        let frame = encode_frame(&message).unwrap();

        let reader = tokio_test::io::Builder::new()
            .read(&frame[..2])
            .read(&frame[2..7])
            .read(&frame[7..])
            .build();
        let writer = tokio_test::io::Builder::new().build();

        let mut channel = Channel::new(reader, writer);
        assert_eq!(channel.recv().await.unwrap(), message);
    }

    /// Serves a fixed byte string and remembers the largest read it was asked for
    struct RecordingReader {
        data: Vec<u8>,
        largest_read: usize,
    }

    impl AsyncRead for RecordingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            self.largest_read = self.largest_read.max(buf.remaining());
            let n = buf.remaining().min(self.data.len());
            let chunk: Vec<u8> = self.data.drain(..n).collect();
            buf.put_slice(&chunk);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_reads_never_exceed_buffer_size() {
        let message = Message::BloomSnapshot {
            virus: "COVID19".into(),
            bits: vec![0xAB; 300],
        };
        let reader = RecordingReader {
            data: encode_frame(&message).unwrap().to_vec(),
            largest_read: 0,
        };
        let writer = tokio_test::io::Builder::new().build();

        let mut channel = Channel::with_buffer_size(reader, writer, 16);
        assert_eq!(channel.recv().await.unwrap(), message);
        assert!(channel.reader.largest_read <= 16);
        assert!(channel.reader.largest_read > 0);
    }

    #[tokio::test]
    async fn test_closed_peer() {
        let (left, mut right) = pair(16);
        drop(left);
        assert!(matches!(right.recv().await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_eof_inside_frame_is_short_read() {
        let (a, b) = duplex(64);
        let (ar, mut aw) = split(a);
        let (br, bw) = split(b);
        let mut channel = Channel::new(br, bw);

        aw.write_all(&[MessageKind::Init as u8, 0, 0]).await.unwrap();
        drop(aw);
        drop(ar);

        assert!(matches!(channel.recv().await, Err(ChannelError::ShortRead)));
    }

    #[tokio::test]
    async fn test_cancelled_recv_loses_nothing() {
        let (mut left, mut right) = pair(8);

        // Nothing to read yet: the select falls through to the ready branch
        tokio::select! {
            biased;
            _ = right.recv() => panic!("no data was sent"),
            _ = std::future::ready(()) => {}
        }

        left.send(&Message::OutcomeNotice { accepted: true }).await.unwrap();
        assert_eq!(
            right.recv().await.unwrap(),
            Message::OutcomeNotice { accepted: true }
        );
    }
}
