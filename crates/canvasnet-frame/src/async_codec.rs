//! `tokio_util` codec for canvasnet frames.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_message, encode_message};
use crate::error::FrameError;
use crate::message::{Message, MessagePtr};

/// Frame codec for `tokio_util::codec::Framed`.
///
/// A frame with a valid length but an undecodable payload is consumed and
/// returned as an error; polling again yields the next frame. An invalid
/// declared length leaves the stream unsynchronized and should be treated
/// as fatal.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_message(src)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_message(&item, dst)
    }
}

impl Encoder<MessagePtr> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: MessagePtr, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_message(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::message::DisconnectReason;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(client, MessageCodec::new());
        let mut reader = FramedRead::new(server, MessageCodec::new());

        let sent = vec![
            Message::command(1, "join"),
            Message::opaque(40, 1, vec![7u8; 300]).unwrap(),
            Message::disconnect(0, DisconnectReason::Shutdown, "done"),
        ];

        let expected = sent.clone();
        let send_task = tokio::spawn(async move {
            for msg in sent {
                writer.send(msg).await.unwrap();
            }
        });

        for want in expected {
            let got = reader.next().await.unwrap().unwrap();
            assert_eq!(got, want);
        }
        send_task.await.unwrap();
    }

    #[tokio::test]
    async fn shared_handles_encode_identically() {
        let msg = Message::ping(0, true);
        let mut codec = MessageCodec::new();

        let mut owned = BytesMut::new();
        codec.encode(msg.clone(), &mut owned).unwrap();
        let mut shared = BytesMut::new();
        codec.encode(msg.into_ptr(), &mut shared).unwrap();

        assert_eq!(owned, shared);
    }
}
