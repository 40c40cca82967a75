//! WebSocket upgrade handler and per-connection session driver.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use pointer_common::id::{prefix, prefixed_ulid};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::AppState;

use super::room::{Room, RoomError};
use super::session::{CloseReason, SessionCloser, SessionError};
use super::subscriber::{Payload, Subscriber};

/// Subprotocol the browser client requests.
pub const SUBPROTOCOL: &str = "silly-game";

pub fn router() -> Router<AppState> {
    Router::new().route("/subscribe", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| handle_connection(socket, state))
}

/// Unregisters the subscriber however the session future ends, including
/// being dropped mid-flight.
struct Membership {
    room: Arc<Room>,
    subscriber: Arc<Subscriber>,
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.room.leave(&self.subscriber);
    }
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let room = state.room.clone();

    let id = prefixed_ulid(prefix::SUBSCRIBER);
    let name = room.allocate_name(|| state.names.phrase(), state.config.name_retry_limit, &id);
    let closer = Arc::new(SessionCloser::new(&state.shutdown));
    let (subscriber, queue) = Subscriber::new(id, name, room.queue_capacity(), closer);

    let span = tracing::info_span!(
        "session",
        subscriber_id = %subscriber.id,
        name = %subscriber.name,
    );

    if let Err(err) = run_session(&room, subscriber, queue, &mut ws_tx, &mut ws_rx)
        .instrument(span.clone())
        .await
    {
        span.in_scope(|| tracing::error!(%err, "failed to register subscriber"));
    }
}

/// Join `subscriber` to `room`, pump frames both ways until either side
/// ends, deregister, and tell the peer why the session closed.
///
/// Returns the error that ended the session, or the reason the subscriber
/// could not join.
pub(crate) async fn run_session<W, R, E>(
    room: &Arc<Room>,
    subscriber: Arc<Subscriber>,
    queue: mpsc::Receiver<Payload>,
    sink: &mut W,
    stream: &mut R,
) -> Result<SessionError, RoomError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    if let Err(err) = room.join(subscriber.clone()) {
        if let Err(close_err) = send_close(sink, CloseReason::InternalError, room).await {
            tracing::debug!(err = %close_err, "failed to send close frame");
        }
        return Err(err);
    }
    let membership = Membership {
        room: room.clone(),
        subscriber: subscriber.clone(),
    };

    tracing::info!(
        room = %room.name,
        subscribers = room.subscriber_count(),
        "subscriber joined"
    );

    // Whichever loop ends first ends the session; the other is dropped.
    let err = tokio::select! {
        err = room.write_loop(&subscriber, queue, sink) => err,
        err = room.read_loop(&subscriber, stream) => err,
    };

    let closer = subscriber.closer();
    closer.close(err.close_reason());
    drop(membership);

    if err.is_expected() {
        tracing::info!(
            reason = %err,
            connected_secs = subscriber.age().as_secs(),
            "subscriber disconnected"
        );
    } else {
        tracing::warn!(
            error = %err,
            connected_secs = subscriber.age().as_secs(),
            "session ended with error"
        );
    }

    // The peer already closed; there is nobody to tell.
    if !matches!(err, SessionError::RemoteClosed { .. }) {
        let reason = closer.reason().unwrap_or(CloseReason::InternalError);
        if let Err(close_err) = send_close(sink, reason, room).await {
            tracing::debug!(err = %close_err, "failed to send close frame");
        }
    }
    Ok(err)
}

/// Send a WebSocket close frame, bounded by the room's write deadline.
async fn send_close<W>(sink: &mut W, reason: CloseReason, room: &Room) -> Result<(), SessionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let close_msg = Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.text().into(),
    }));
    match tokio::time::timeout(room.write_timeout(), sink.send(close_msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(SessionError::Write(err.to_string())),
        Err(_elapsed) => Err(SessionError::WriteTimeout(room.write_timeout())),
    }
}
