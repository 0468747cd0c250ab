use crate::error::{TailError, TailResult};
use futures_util::{SinkExt, StreamExt};
use ghtail_common::wire::{
    handshake_frame, split_frames, subscribe_frame, InboundMessage, MessageType,
};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a decoded frame asks the read loop to do.
#[derive(Debug)]
enum Flow {
    Continue,
    Closed,
}

/// Connects to the push backend, subscribes to `target` and forwards every
/// invocation argument to `out` in arrival order.
///
/// Returns `Ok(())` when the server closes the subscription and
/// [`TailError::Cancelled`] when `token` fires.
pub async fn connect<T>(
    token: &CancellationToken,
    url: &str,
    target: &str,
    out: &mpsc::Sender<T>,
) -> TailResult<()>
where
    T: DeserializeOwned + Send,
{
    let parsed = Url::parse(url).map_err(|_| TailError::InvalidStreamUrl(url.to_string()))?;
    let (tenant_id, run_id) = subscription_ids(&parsed);

    let mut socket = tokio::select! {
        _ = token.cancelled() => return Err(TailError::Cancelled),
        connected = connect_async(url) => connected?.0,
    };
    debug!(
        hub_target = target,
        host = parsed.host_str().unwrap_or_default(),
        "push connection open"
    );

    socket.send(Message::text(handshake_frame())).await?;
    socket
        .send(Message::text(subscribe_frame(&tenant_id, &run_id, target)))
        .await?;

    loop {
        let message = tokio::select! {
            _ = token.cancelled() => {
                close_quietly(&mut socket).await;
                return Err(TailError::Cancelled);
            }
            message = socket.next() => message,
        };

        let flow = match message {
            Some(Ok(Message::Text(text))) => forward(token, text.as_bytes(), out).await?,
            Some(Ok(Message::Binary(data))) => forward(token, &data, out).await?,
            Some(Ok(Message::Close(frame))) => {
                debug!(hub_target = target, ?frame, "push connection closed by server");
                return Ok(());
            }
            Some(Ok(_)) => Flow::Continue,
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(TailError::ConnectionReset(
                    "stream ended without a close frame".to_string(),
                ))
            }
        };

        if let Flow::Closed = flow {
            debug!(hub_target = target, "hub sent close");
            close_quietly(&mut socket).await;
            return Ok(());
        }
    }
}

/// The hub expects the tenant and run ids carried by the stream URL.
fn subscription_ids(url: &Url) -> (String, String) {
    let mut tenant_id = String::new();
    let mut run_id = String::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "tenantId" => tenant_id = value.into_owned(),
            "runId" => run_id = value.into_owned(),
            _ => {}
        }
    }
    (tenant_id, run_id)
}

async fn forward<T>(
    token: &CancellationToken,
    buffer: &[u8],
    out: &mpsc::Sender<T>,
) -> TailResult<Flow>
where
    T: DeserializeOwned + Send,
{
    for frame in split_frames(buffer) {
        let message: InboundMessage<serde_json::Value> =
            serde_json::from_slice(frame).map_err(|e| TailError::protocol(frame, e))?;

        match message.message_type {
            MessageType::Invocation => {
                for argument in message.arguments {
                    let item: T = serde_json::from_value(argument)
                        .map_err(|e| TailError::protocol(frame, e))?;
                    tokio::select! {
                        _ = token.cancelled() => return Err(TailError::Cancelled),
                        sent = out.send(item) => sent.map_err(|_| TailError::OutputClosed)?,
                    }
                }
            }
            MessageType::Close => return Ok(Flow::Closed),
            other => trace!(?other, "ignoring frame"),
        }
    }
    Ok(Flow::Continue)
}

async fn close_quietly(socket: &mut Socket) {
    if let Err(e) = socket.close(None).await {
        debug!(error = %e, "error closing push connection");
    }
}
