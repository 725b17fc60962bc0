use anyhow::{Context, Result};
use courier::api::ApiClient;
use courier::chat::ChatBoard;
use courier::config::{self, new_shared_preferences};
use courier::model::{LoginRequest, LoginResponse};
use courier::realtime::RealtimeClient;
use courier::session::{SessionStore, StaticToken};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info".into()),
        )
        .init();

    info!("Courier starting...");

    let config_path =
        std::env::var("COURIER_CONFIG").unwrap_or_else(|_| "courier.toml".to_string());
    let config = config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    info!(
        api = %config.api.base_url,
        realtime = %config.realtime.url,
        "Configuration loaded"
    );

    let session = Arc::new(SessionStore::new());
    let api = Arc::new(ApiClient::new(&config.api, session.clone())?);

    match std::env::var("COURIER_TOKEN") {
        Ok(token) => {
            let probe = ApiClient::new(&config.api, Arc::new(StaticToken::new(token.clone())))?;
            session.sign_in(LoginResponse {
                user: probe.current_user().await,
                token,
            });
        }
        Err(_) => {
            let credentials = LoginRequest {
                email: std::env::var("COURIER_EMAIL")
                    .unwrap_or_else(|_| "demo@example.com".to_string()),
                password: std::env::var("COURIER_PASSWORD").unwrap_or_default(),
            };
            session.sign_in(api.login(&credentials).await);
        }
    }

    let own_id = session.current_user().map(|u| u.id);
    let preferences = new_shared_preferences(config.preferences.clone());
    let board = Arc::new(ChatBoard::new(own_id, preferences));
    board.set_chats(api.get_chats().await);
    info!(chats = board.chats().len(), "Chat list loaded");

    let client = RealtimeClient::new(&config.realtime, session.clone())?;
    client.add_listener(board.clone());

    let mut states = client.subscribe_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!(state = %state, "Realtime connection state changed");
        }
    });

    let mut notifications = board.subscribe_notifications();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => info!(
                    chat_id = %notification.chat_id,
                    sound = notification.sound,
                    desktop = notification.desktop,
                    "{}: {}",
                    notification.title,
                    notification.body
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Notification receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // stdin: `/open <chat id>` opens a chat, any other line is sent to it
    let input_board = board.clone();
    let input_api = api.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(chat_id) = line.strip_prefix("/open ") {
                let chat_id = chat_id.trim();
                if !input_board.select_chat(chat_id) {
                    warn!(chat_id = %chat_id, "Unknown chat");
                    continue;
                }
                input_board.mark_read(chat_id);
                input_board.set_messages(chat_id, input_api.get_messages(chat_id).await);
                info!(chat_id = %chat_id, messages = input_board.messages().len(), "Chat opened");
            } else if input_board.send(&input_api, &line).await.is_none() {
                debug!("Nothing sent");
            }
        }
    });

    client.connect();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    client.disconnect().await;
    if !api.logout().await.success {
        warn!("Server did not acknowledge logout");
    }
    session.sign_out();

    Ok(())
}
