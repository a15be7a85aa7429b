//! Chunk-oriented links shared by the relay listeners and the client dialers.
//!
//! Every transport kind is reduced to the same pair of halves: a sink that
//! takes byte chunks and a stream that yields them. Handshake and bridge code
//! only ever sees [`Link`].

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{future, Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::codec::{BytesCodec, Decoder, Encoder, Framed, LengthDelimitedCodec};

/// How a client reaches the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One WebSocket message per chunk.
    #[default]
    WebSocket,
    /// Length-prefixed frames over TCP, one frame per chunk.
    Framed,
    /// Plain TCP; chunk boundaries are whatever the socket returns.
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "websocket"),
            TransportKind::Framed => write!(f, "framed"),
            TransportKind::Tcp => write!(f, "tcp"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

type ChunkSink = Pin<Box<dyn Sink<Bytes, Error = LinkError> + Send>>;
type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, LinkError>> + Send>>;

pub struct Link {
    sink: ChunkSink,
    stream: ChunkStream,
}

impl Link {
    pub fn websocket<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(LinkError::from)
            .with(|chunk: Bytes| future::ready(Ok::<_, LinkError>(ws_message(chunk))));
        let stream = stream
            .try_filter_map(|msg| {
                future::ready(Ok(match msg {
                    Message::Text(text) => Some(Bytes::from(text)),
                    Message::Binary(data) => Some(Bytes::from(data)),
                    // Control frames are answered by tungstenite itself.
                    _ => None,
                }))
            })
            .map_err(LinkError::from);
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// Length-delimited frames.
    pub fn framed<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::from_codec(io, LengthDelimitedCodec::new())
    }

    /// Raw byte stream.
    pub fn raw<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::from_codec(io, BytesCodec::new())
    }

    fn from_codec<S, C>(io: S, codec: C) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        C: Decoder<Item = BytesMut, Error = io::Error>
            + Encoder<Bytes, Error = io::Error>
            + Send
            + 'static,
    {
        let (sink, stream) = Framed::new(io, codec).split();
        Self {
            sink: Box::pin(sink.sink_map_err(LinkError::from)),
            stream: Box::pin(stream.map_ok(BytesMut::freeze).map_err(LinkError::from)),
        }
    }

    pub async fn send(&mut self, chunk: Bytes) -> Result<(), LinkError> {
        self.sink.send(chunk).await
    }

    /// `None` once the peer has closed the link.
    pub async fn recv(&mut self) -> Option<Result<Bytes, LinkError>> {
        self.stream.next().await
    }

    pub async fn close(&mut self) -> Result<(), LinkError> {
        self.sink.close().await
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Text frames for UTF-8 chunks so browser peers can read them directly.
fn ws_message(chunk: Bytes) -> Message {
    match String::from_utf8(chunk.to_vec()) {
        Ok(text) => Message::Text(text),
        Err(err) => Message::Binary(err.into_bytes()),
    }
}
