use super::*;
use crate::realtime::envelope::{ClientMessage, ServerEvent};
use crate::session::StaticToken;
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Remote side of a link opened through [`MemoryConnector`]
struct Remote {
    url: String,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl Remote {
    fn push(&self, text: &str) {
        self.to_client
            .send(TransportEvent::Text(text.to_string()))
            .unwrap();
    }

    fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed {
            code: Some(1000),
            reason: "bye".to_string(),
        });
    }
}

/// In-memory connector; each successful open hands its remote end to the test
struct MemoryConnector {
    opens: AtomicU64,
    fail: AtomicBool,
    remotes: mpsc::UnboundedSender<Remote>,
}

impl MemoryConnector {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                opens: AtomicU64::new(0),
                fail: AtomicBool::new(false),
                remotes: tx,
            }),
            rx,
        )
    }

    fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<Link> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        let (link, to_client, from_client) = Link::pair();
        let _ = self.remotes.send(Remote {
            url: url.to_string(),
            to_client,
            from_client,
        });
        Ok(link)
    }
}

/// Listener recording every frame it receives
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Inbound>>,
}

impl Recorder {
    fn seen(&self) -> Vec<Inbound> {
        self.seen.lock().unwrap().clone()
    }
}

impl Listener for Recorder {
    fn on_message(&self, inbound: &Inbound) -> Result<()> {
        self.seen.lock().unwrap().push(inbound.clone());
        Ok(())
    }
}

fn client_with(
    connector: Arc<MemoryConnector>,
    token: StaticToken,
    policy: ReconnectPolicy,
) -> RealtimeClient {
    RealtimeClient::with_connector("ws://test/ws", Arc::new(token), connector, policy)
}

/// Let spawned tasks run without advancing the paused clock
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn new_message_frame(id: &str) -> String {
    json!({
        "type": "new_message",
        "message": {
            "id": id,
            "chatId": "chat_1",
            "senderId": "user_456",
            "content": "Hey! How are you doing?",
            "timestamp": "2025-08-24T10:00:00Z",
            "type": "text",
            "status": "sent"
        }
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_connect_passes_token_and_opens() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok one"),
        ReconnectPolicy::default(),
    );
    let mut states = client.subscribe_state();

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;

    assert_eq!(remote.url, "ws://test/ws?token=tok%20one");
    assert_eq!(client.state(), ConnectionState::Open);
    assert!(client.is_running());
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_idempotent() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );

    client.connect();
    client.connect();
    let _remote = remotes.recv().await.unwrap();
    client.connect();
    settle().await;

    assert_eq!(connector.opens(), 1);
    assert_eq!(client.stats().connect_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_frame_delivered_to_all_listeners_once() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    client.add_listener(a.clone());
    client.add_listener(b.clone());
    // Re-registering must not duplicate delivery
    client.add_listener(a.clone());
    assert_eq!(client.listener_count(), 2);

    client.connect();
    let remote = remotes.recv().await.unwrap();
    remote.push(&new_message_frame("m1"));
    settle().await;

    let seen_a = a.seen();
    let seen_b = b.seen();
    assert_eq!(seen_a.len(), 1);
    assert_eq!(seen_a, seen_b);
    match seen_a[0].event() {
        Some(ServerEvent::NewMessage { message }) => assert_eq!(message.id, "m1"),
        other => panic!("expected new_message, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_frames_delivered_in_transport_order() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());
    let recorder = Arc::new(Recorder::default());
    client.add_listener(recorder.clone());

    client.connect();
    let remote = remotes.recv().await.unwrap();
    for id in ["m1", "m2", "m3"] {
        remote.push(&new_message_frame(id));
    }
    settle().await;

    let ids: Vec<String> = recorder
        .seen()
        .iter()
        .filter_map(|i| match i.event() {
            Some(ServerEvent::NewMessage { message }) => Some(message.id.clone()),
            None => None,
        })
        .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test(start_paused = true)]
async fn test_removed_listener_stops_receiving() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());
    let a = Arc::new(Recorder::default());
    let a_dyn: Arc<dyn Listener> = a.clone();
    client.add_listener(Arc::clone(&a_dyn));

    client.connect();
    let remote = remotes.recv().await.unwrap();
    remote.push(&new_message_frame("m1"));
    settle().await;

    assert!(client.remove_listener(&a_dyn));
    assert!(!client.remove_listener(&a_dyn));
    remote.push(&new_message_frame("m2"));
    settle().await;

    assert_eq!(a.seen().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_listener_by_id() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    let a_id = client.add_listener(a.clone());
    client.add_listener(b.clone());
    assert_eq!(client.listener_count(), 2);

    assert!(client.remove_listener_by_id(a_id));
    assert!(!client.remove_listener_by_id(a_id));
    assert_eq!(client.listener_count(), 1);

    client.connect();
    let remote = remotes.recv().await.unwrap();
    remote.push(&new_message_frame("m1"));
    settle().await;

    assert!(a.seen().is_empty());
    assert_eq!(b.seen().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_contained() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );
    let recorder = Arc::new(Recorder::default());
    client.add_listener(recorder.clone());

    client.connect();
    let remote = remotes.recv().await.unwrap();
    remote.push("this is {not json");
    settle().await;

    assert!(recorder.seen().is_empty());
    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(connector.opens(), 1);

    // Connection still usable afterwards
    remote.push(&new_message_frame("m2"));
    settle().await;
    assert_eq!(recorder.seen().len(), 1);

    let stats = client.stats();
    assert_eq!(stats.frames_received, 2);
    assert_eq!(stats.frames_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_frames_still_delivered() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());
    let recorder = Arc::new(Recorder::default());
    client.add_listener(recorder.clone());

    client.connect();
    let remote = remotes.recv().await.unwrap();
    remote.push(r#"{"type":"typing","chatId":"chat_1"}"#);
    settle().await;

    let seen = recorder.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind(), Some("typing"));
    assert!(seen[0].event().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_send_when_open_writes_json() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());

    client.connect();
    let mut remote = remotes.recv().await.unwrap();
    settle().await;

    assert_eq!(client.send(&ClientMessage::Ping), SendOutcome::Sent);
    match remote.from_client.recv().await {
        Some(OutboundFrame::Text(text)) => {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value, json!({"type": "ping"}));
        }
        other => panic!("expected text frame, got {:?}", other),
    }
    assert_eq!(client.stats().messages_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_when_not_open_is_dropped() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );

    // Never connected
    assert_eq!(client.send(&json!({"type": "ping"})), SendOutcome::Dropped);

    // Connected, then closed by the server
    client.connect();
    let mut remote = remotes.recv().await.unwrap();
    settle().await;
    remote.close();
    settle().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.send(&ClientMessage::Ping), SendOutcome::Dropped);
    assert!(remote.from_client.try_recv().is_err());
    assert_eq!(client.stats().messages_dropped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_once_after_fixed_delay() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::fixed(Duration::from_millis(5000)),
    );

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;
    remote.close();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(connector.opens(), 1);

    tokio::time::advance(Duration::from_millis(4999)).await;
    settle().await;
    assert_eq!(connector.opens(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(connector.opens(), 2);
    assert_eq!(client.state(), ConnectionState::Open);

    // Nothing further is scheduled while the new connection stays open
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(connector.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_policy_retries_without_bound() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::fixed(Duration::from_secs(5)),
    );

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;

    connector.set_failing(true);
    remote.close();
    settle().await;

    for expected in 2..=12 {
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(connector.opens(), expected);
    }
    assert!(client.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_bounded_policy_gives_up() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::fixed(Duration::from_secs(1)).with_max_attempts(2),
    );

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;

    connector.set_failing(true);
    remote.close();
    settle().await;

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(connector.opens(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(connector.opens(), 3);

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(connector.opens(), 3);
    assert!(!client.is_running());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_attempt_budget() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::fixed(Duration::from_secs(1)).with_max_attempts(1),
    );

    client.connect();
    for _ in 0..3 {
        let remote = remotes.recv().await.unwrap();
        settle().await;
        remote.close();
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
    assert_eq!(connector.opens(), 4);
    assert!(client.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;
    remote.close();
    settle().await;

    client.disconnect().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;

    assert_eq!(connector.opens(), 1);
    assert!(!client.is_running());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_open_link() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());

    client.connect();
    let mut remote = remotes.recv().await.unwrap();
    settle().await;

    client.disconnect().await;
    assert_eq!(remote.from_client.recv().await, Some(OutboundFrame::Close));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.send(&ClientMessage::Ping), SendOutcome::Dropped);
}

#[tokio::test(start_paused = true)]
async fn test_connect_during_disconnect_keeps_new_connection() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );

    client.connect();
    let mut first = remotes.recv().await.unwrap();
    settle().await;

    let closing = client.clone();
    let disconnecting = tokio::spawn(async move { closing.disconnect().await });
    // Reconnect as soon as disconnect has taken the running task
    while client.is_running() {
        tokio::task::yield_now().await;
    }
    client.connect();

    let mut second = remotes.recv().await.unwrap();
    disconnecting.await.unwrap();
    settle().await;

    assert_eq!(first.from_client.recv().await, Some(OutboundFrame::Close));
    assert!(second.from_client.try_recv().is_err());
    assert_eq!(connector.opens(), 2);
    assert!(client.is_running());
    assert_eq!(client.state(), ConnectionState::Open);
    assert!(client.send(&ClientMessage::Ping).is_sent());
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_is_not_retried() {
    let (connector, _remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::none(),
        ReconnectPolicy::default(),
    );

    client.connect();
    settle().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;

    assert_eq!(connector.opens(), 0);
    assert!(!client.is_running());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_waits_for_close() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;

    remote
        .to_client
        .send(TransportEvent::Error("reset by peer".to_string()))
        .unwrap();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Open);

    remote.close();
    settle().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_failing_listener_isolated() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(connector, StaticToken::new("tok"), ReconnectPolicy::default());
    let failing: Arc<dyn Listener> =
        Arc::new(|_: &Inbound| -> Result<()> { Err(anyhow!("listener failed")) });
    let recorder = Arc::new(Recorder::default());
    client.add_listener(failing);
    client.add_listener(recorder.clone());

    client.connect();
    let remote = remotes.recv().await.unwrap();
    remote.push(&new_message_frame("m1"));
    settle().await;

    assert_eq!(recorder.seen().len(), 1);
    assert_eq!(client.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_state_transitions_observed() {
    let (connector, mut remotes) = MemoryConnector::new();
    let client = client_with(
        connector.clone(),
        StaticToken::new("tok"),
        ReconnectPolicy::default(),
    );
    let mut states = client.subscribe_state();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            sink.lock().unwrap().push(state);
        }
    });

    client.connect();
    let remote = remotes.recv().await.unwrap();
    settle().await;
    remote.close();
    settle().await;

    // watch coalesces intermediate states; Open and the final state are stable
    let seen = observed.lock().unwrap().clone();
    assert!(seen.contains(&ConnectionState::Open));
    assert_eq!(seen.last(), Some(&ConnectionState::Disconnected));
    watcher.abort();
}
