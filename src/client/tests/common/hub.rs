use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// One step of what the hub does on a connection after the subscription.
#[derive(Debug, Clone)]
pub enum HubAction {
    /// Send a raw text message.
    Send(String),
    /// Drop the TCP connection without a closing handshake.
    Reset,
    /// Send a websocket close frame.
    CloseSocket,
    /// Pause before the next action.
    Sleep(Duration),
}

/// A local websocket server speaking the hub framing.
///
/// Connections are served in order from a per-target script; once a script
/// runs out the connection is held open until the client goes away.
pub struct TestHub {
    addr: SocketAddr,
    subscriptions: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl TestHub {
    pub async fn launch(scripts: Vec<(&str, Vec<HubAction>)>) -> Self {
        let mut by_target: HashMap<String, VecDeque<Vec<HubAction>>> = HashMap::new();
        for (target, actions) in scripts {
            by_target
                .entry(target.to_string())
                .or_default()
                .push_back(actions);
        }
        let scripts = Arc::new(Mutex::new(by_target));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = {
            let scripts = scripts.clone();
            let subscriptions = subscriptions.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream, scripts.clone(), subscriptions.clone()));
                }
            })
        };

        Self {
            addr,
            subscriptions,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/hub?tenantId=tenant-1&runId=77", self.addr)
    }

    /// Subscribe frames received so far, separator stripped.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn subscriptions_to(&self, target: &str) -> usize {
        self.subscriptions()
            .iter()
            .filter(|frame| target_of(frame) == target)
            .count()
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    stream: TcpStream,
    scripts: Arc<Mutex<HashMap<String, VecDeque<Vec<HubAction>>>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    // handshake, then subscribe
    let _ = ws.next().await;
    let Some(Ok(Message::Text(subscribe))) = ws.next().await else {
        return;
    };
    let subscribe = subscribe.trim_end_matches('\u{1e}').to_string();
    let target = target_of(&subscribe);
    subscriptions.lock().unwrap().push(subscribe);

    let actions = scripts
        .lock()
        .unwrap()
        .get_mut(&target)
        .and_then(VecDeque::pop_front)
        .unwrap_or_default();

    for action in actions {
        match action {
            HubAction::Send(text) => {
                if ws.send(Message::text(text)).await.is_err() {
                    return;
                }
            }
            HubAction::Reset => {
                drop(ws);
                return;
            }
            HubAction::CloseSocket => {
                let _ = ws.close(None).await;
                return;
            }
            HubAction::Sleep(pause) => tokio::time::sleep(pause).await,
        }
    }

    hold(ws).await;
}

async fn hold(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn target_of(subscribe: &str) -> String {
    serde_json::from_str::<Value>(subscribe)
        .ok()
        .and_then(|frame| frame["target"].as_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn frame(value: Value) -> String {
    format!("{}\u{1e}", value)
}

pub fn invocation(target: &str, arguments: Value) -> String {
    frame(json!({"type": 1, "target": target, "arguments": arguments}))
}

pub fn ping() -> String {
    frame(json!({"type": 6}))
}

pub fn close() -> String {
    frame(json!({"type": 7}))
}

pub fn log_batch(timeline_record_id: &str, step_record_id: &str, lines: &[&str]) -> Value {
    json!({
        "RunId": 77,
        "timelineId": "timeline",
        "timelineRecordId": timeline_record_id,
        "stepRecordId": step_record_id,
        "startLine": 1,
        "lines": lines,
    })
}

pub fn step_progress(step_record_id: &str, step_number: i64) -> Value {
    json!({
        "RunId": 77,
        "timelineId": "timeline",
        "parentRecordId": "record-1",
        "stepRecordId": step_record_id,
        "stepNumber": step_number,
        "changeId": 1,
        "stepCompleted": false,
    })
}
