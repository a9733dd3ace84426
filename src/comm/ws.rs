//! WebSocket transport: duplex action requests and pushed events.
//!
//! Text frames carry JSON requests, binary frames carry MessagePack; each is
//! answered in the same encoding. Events are pushed as JSON text frames on
//! the same stream. Only the per-connection writer task sends on the socket.

use crate::action::{retcode, Response};
use crate::error::{OneBotError, Result};
use crate::event::EventSubscription;
use crate::onebot::OneBot;
use crate::types::Encoding;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{Sink, SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Responses waiting for the writer, per connection.
const REPLY_QUEUE_SIZE: usize = 64;

#[derive(Clone)]
struct WsState {
    ob: Arc<OneBot>,
    cancel: CancellationToken,
}

/// Router upgrading `GET /` to a WebSocket connection.
pub fn router(ob: Arc<OneBot>, cancel: CancellationToken) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .with_state(WsState { ob, cancel })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let WsState { ob, cancel } = state;
    let sub = ob.open_listen_chan();
    let sub_id = sub.id();
    info!(subscription = %sub_id, "WebSocket client connected");

    let (sink, mut stream) = socket.split();
    let (reply_tx, reply_rx) = mpsc::channel(REPLY_QUEUE_SIZE);
    let mut writer = tokio::spawn(write_loop(sink, sub, reply_rx));
    let mut writer_done = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            frame = stream.next() => {
                let reply = match frame {
                    Some(Ok(WsMessage::Text(text))) => respond(&ob, text.as_str().as_bytes(), Encoding::Json),
                    Some(Ok(WsMessage::Binary(bytes))) => respond(&ob, &bytes, Encoding::MessagePack),
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!(subscription = %sub_id, "WebSocket client closed the connection");
                        break;
                    }
                    // pings are answered by the socket itself
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(subscription = %sub_id, error = %e, "WebSocket read failed");
                        break;
                    }
                };
                if let Some(reply) = reply {
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // closing the subscription and the reply queue stops the writer
    ob.close_listen_chan(sub_id);
    drop(reply_tx);
    if !writer_done {
        if let Err(e) = writer.await {
            warn!(error = %e, "WebSocket writer panicked");
        }
    }
    info!(subscription = %sub_id, "WebSocket client disconnected");
}

/// Decode, dispatch and encode one inbound frame.
///
/// A frame that fails to decode is answered with a `BAD_REQUEST` failure
/// and the connection stays open.
fn respond(ob: &OneBot, bytes: &[u8], encoding: Encoding) -> Option<WsMessage> {
    let response = match ob.decode_request(bytes, encoding) {
        Ok(request) => ob.handle_request(&request),
        Err(e) => {
            debug!(error = %e, "invalid action request frame");
            Response::failed(retcode::BAD_REQUEST, e)
        }
    };

    let frame = match encoding {
        Encoding::Json => serde_json::to_string(&response)
            .map(|text| WsMessage::Text(text.into()))
            .map_err(OneBotError::from),
        Encoding::MessagePack => response
            .encode(encoding)
            .map(|bytes| WsMessage::Binary(bytes.into())),
    };
    match frame {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "failed to encode response frame");
            None
        }
    }
}

/// Forward replies and events to the socket until either source ends.
///
/// Queued replies go out before events, and replies still queued when the
/// subscription closes are flushed before the sink is closed.
async fn write_loop<S>(
    mut sink: S,
    mut events: EventSubscription,
    mut replies: mpsc::Receiver<WsMessage>,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: fmt::Display,
{
    loop {
        let frame = tokio::select! {
            biased;
            reply = replies.recv() => match reply {
                Some(frame) => frame,
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => WsMessage::Text(event.json.clone().into()),
                None => {
                    debug!(subscription = %events.id(), "event subscription closed");
                    while let Ok(frame) = replies.try_recv() {
                        if sink.send(frame).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            },
        };
        if let Err(e) = sink.send(frame).await {
            debug!(error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = sink.close().await;
}

/// Serve WebSocket connections on an already bound listener until `cancel`
/// fires.
pub async fn serve_ws(listener: TcpListener, ob: Arc<OneBot>, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    let app = router(ob, cancel.clone());

    info!(%addr, "WebSocket transport listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| OneBotError::Serve(format!("WebSocket server on {addr}: {e}")))?;

    info!(%addr, "WebSocket transport stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Broadcaster, NoticeEvent};
    use crate::types::BotSelf;

    fn texts(frames: Vec<WsMessage>) -> Vec<String> {
        frames
            .into_iter()
            .map(|frame| match frame {
                WsMessage::Text(text) => text.as_str().to_string(),
                other => panic!("expected a text frame, got {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_queued_replies_survive_closed_subscription() {
        let broadcaster = Broadcaster::new(8);
        let sub = broadcaster.open_listen_chan();
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_QUEUE_SIZE);
        for i in 0..3 {
            reply_tx.send(WsMessage::Text(format!("reply {i}").into())).await.unwrap();
        }
        broadcaster.close_listen_chan(sub.id());

        let (sink, out) = futures::channel::mpsc::channel(16);
        write_loop(sink, sub, reply_rx).await;

        let sent = texts(out.collect().await);
        assert_eq!(sent, vec!["reply 0", "reply 1", "reply 2"]);
        drop(reply_tx);
    }

    #[tokio::test]
    async fn test_events_and_replies_share_the_sink() {
        let broadcaster = Broadcaster::new(8);
        let sub = broadcaster.open_listen_chan();
        let sub_id = sub.id();
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_QUEUE_SIZE);

        reply_tx.send(WsMessage::Text("reply".into())).await.unwrap();
        let mut event = NoticeEvent::make_friend_increase_notice_event("42");
        event.event.self_ = Some(BotSelf::new("myplat", "bot"));
        assert!(broadcaster.broadcast(&mut event));
        broadcaster.close_listen_chan(sub_id);

        let (sink, out) = futures::channel::mpsc::channel(16);
        write_loop(sink, sub, reply_rx).await;

        let sent = texts(out.collect().await);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], "reply");
        assert!(sent[1].contains("friend_increase"));
        drop(reply_tx);
    }
}
