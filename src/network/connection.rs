//! Per-peer connection handling
//!
//! Inbound sockets arrive through axum's upgrade, outbound ones come from
//! tokio-tungstenite. Both are narrowed to a sink and a stream of text
//! frames so a single driver serves either direction.

use crate::network::gossip::PeerNetwork;
use crate::network::message::Message;
use crate::network::peer::PeerHandle;
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures::future;
use futures::sink::{Sink, SinkExt};
use futures::stream::{Stream, StreamExt};
use std::fmt::Display;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message as TungsteniteMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Text frames of an upgraded inbound socket, until close or error
pub fn split_axum(
    socket: WebSocket,
) -> (
    impl Sink<String, Error = axum::Error> + Send + Unpin + 'static,
    impl Stream<Item = String> + Send + Unpin + 'static,
) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(AxumMessage::Text(text.into())))
    });
    let stream = stream
        .take_while(|frame| {
            future::ready(matches!(frame, Ok(msg) if !matches!(msg, AxumMessage::Close(_))))
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(AxumMessage::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        });
    (sink, stream)
}

/// Text frames of a dialed outbound socket, until close or error
pub fn split_tungstenite(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> (
    impl Sink<String, Error = tungstenite::Error> + Send + Unpin + 'static,
    impl Stream<Item = String> + Send + Unpin + 'static,
) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|text: String| {
        future::ready(Ok::<_, tungstenite::Error>(TungsteniteMessage::Text(
            text.into(),
        )))
    });
    let stream = stream
        .take_while(|frame| {
            future::ready(matches!(frame, Ok(msg) if !matches!(msg, TungsteniteMessage::Close(_))))
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(TungsteniteMessage::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        });
    (sink, stream)
}

/// Run a registered peer connection until it closes
///
/// Messages queued on `outbox` are written by a separate task; incoming
/// frames are handled in order. On exit `handle` is unregistered, unless
/// a newer connection has taken its key.
pub async fn drive<S, R>(
    network: PeerNetwork,
    handle: PeerHandle,
    mut sink: S,
    mut stream: R,
    mut outbox: mpsc::Receiver<Message>,
) where
    S: Sink<String> + Send + Unpin + 'static,
    S::Error: Display,
    R: Stream<Item = String> + Send + Unpin,
{
    let key = handle.key.clone();
    let writer_key = key.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            let text = match msg.to_text() {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Failed to encode {}: {}", msg.type_name(), e);
                    continue;
                }
            };
            if let Err(e) = sink.send(text).await {
                log::debug!("Write to {} failed: {}", writer_key, e);
                break;
            }
        }
    });

    while let Some(text) = stream.next().await {
        match Message::from_text(&text) {
            Ok(msg) => {
                log::debug!("Received {} from {}", msg.type_name(), key);
                network.handle_message(&key, msg).await;
            }
            Err(e) => log::warn!("Malformed message from {}: {}", key, e),
        }
    }

    writer.abort();
    network.registry().remove_handle(&handle).await;
    log::info!("Peer {} disconnected", key);
}
