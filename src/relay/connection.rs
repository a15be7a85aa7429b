//! One accepted client: handshake, upstream dial, then the byte bridge.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::link::Link;
use crate::proxy::digest::generate_nonce;
use crate::proxy::{ConnectionWork, RelayAction};
use crate::relay::{RelayError, RelaySettings};

const READ_CHUNK: usize = 16 * 1024;

/// Reported by the upstream task, in order.
#[derive(Debug)]
enum UpstreamEvent {
    Connected(OwnedWriteHalf),
    Data(Bytes),
    Eof,
    Failed(String),
}

/// Aborts the upstream task when the connection ends.
struct UpstreamTask(Option<JoinHandle<()>>);

impl Drop for UpstreamTask {
    fn drop(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

pub(crate) async fn serve(mut link: Link, settings: Arc<RelaySettings>) -> Result<(), RelayError> {
    let mut work = ConnectionWork::new(settings.password.clone(), generate_nonce());
    link.send(Bytes::from(work.greeting(&settings.version))).await?;

    let deadline = tokio::time::sleep(settings.handshake_timeout);
    tokio::pin!(deadline);

    let (upstream_tx, mut upstream_rx) = mpsc::channel(settings.bridge_depth);
    let mut upstream_task = UpstreamTask(None);
    let mut upstream: Option<OwnedWriteHalf> = None;

    loop {
        let actions = tokio::select! {
            chunk = link.recv() => match chunk {
                Some(Ok(chunk)) => work.on_client_chunk(&chunk),
                Some(Err(e)) => {
                    debug!(error = %e, "client link error");
                    break;
                }
                None => {
                    debug!("client closed the connection");
                    break;
                }
            },
            Some(event) = upstream_rx.recv() => match event {
                UpstreamEvent::Connected(writer) => {
                    upstream = Some(writer);
                    work.on_upstream_connected()
                }
                UpstreamEvent::Data(data) => {
                    link.send(data).await?;
                    continue;
                }
                UpstreamEvent::Eof => work.on_upstream_eof(),
                UpstreamEvent::Failed(error) => work.on_upstream_error(&error),
            },
            () = &mut deadline, if !work.is_bridged() && !work.is_closed() => {
                info!("handshake timed out");
                work.on_handshake_timeout()
            }
        };

        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                RelayAction::Reply(line) => link.send(Bytes::from(line)).await?,
                RelayAction::Dial { host, port } => {
                    upstream_task.0 = Some(tokio::spawn(run_upstream(
                        host,
                        port,
                        upstream_tx.clone(),
                    )));
                }
                RelayAction::Forward(data) => {
                    let Some(writer) = upstream.as_mut() else {
                        continue;
                    };
                    if let Err(e) = writer.write_all(&data).await {
                        queue.extend(work.on_upstream_error(&e));
                    }
                }
                RelayAction::Close => {
                    let _ = link.close().await;
                }
            }
        }

        if work.is_closed() {
            break;
        }
    }

    if let Some(mut writer) = upstream {
        let _ = writer.shutdown().await;
    }
    Ok(())
}

async fn run_upstream(host: String, port: u16, events: mpsc::Sender<UpstreamEvent>) {
    let stream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(UpstreamEvent::Failed(e.to_string())).await;
            return;
        }
    };
    let _ = stream.set_nodelay(true);
    let (mut reader, writer) = stream.into_split();
    if events.send(UpstreamEvent::Connected(writer)).await.is_err() {
        return;
    }

    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        buf.reserve(READ_CHUNK);
        let event = match reader.read_buf(&mut buf).await {
            Ok(0) => UpstreamEvent::Eof,
            Ok(_) => UpstreamEvent::Data(buf.split().freeze()),
            Err(e) => UpstreamEvent::Failed(e.to_string()),
        };
        let last = !matches!(event, UpstreamEvent::Data(_));
        // A full channel parks this reader until the client catches up.
        if events.send(event).await.is_err() || last {
            return;
        }
    }
}
