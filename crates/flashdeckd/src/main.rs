//! flashdeckd - The flashdeck background service
//!
//! This is the main entry point for the flashdeckd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Scheduling service
//! - IPC server

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use flashdeck_api::{
    API_VERSION, CardView, Command, ErrorCode, ErrorInfo, Event, EventPayload, Request, Response,
    ResponsePayload,
};
use flashdeck_config::load_config_or_default;
use flashdeck_core::{CoreEvent, SchedulingService, StudyQuery};
use flashdeck_ipc::{IpcServer, ServerMessage};
use flashdeck_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use flashdeck_util::{default_config_path, ClientId, FlashdeckError, RateLimiter, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle rate-limiter buckets are dropped
const LIMITER_CLEANUP_EVERY: Duration = Duration::from_secs(60);

/// flashdeckd - Spaced-repetition scheduling service
#[derive(Parser, Debug)]
#[command(name = "flashdeckd")]
#[command(about = "Spaced-repetition scheduling service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/flashdeck/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set FLASHDECK_SOCKET env var)
    #[arg(short, long, env = "FLASHDECK_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set FLASHDECK_DATA_DIR env var)
    #[arg(short, long, env = "FLASHDECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    scheduler: Arc<SchedulingService>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter<ClientId>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("flashdeck.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        if flashdeck_util::is_mock_time_active() {
            warn!(now = %flashdeck_util::now(), "Mock time is active");
        }

        let scheduler = Arc::new(SchedulingService::new(
            &settings,
            store.clone(),
            Arc::new(SystemClock),
        ));

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let rate_limiter = RateLimiter::new(
            settings.service.requests_per_second,
            Duration::from_secs(1),
        );

        Ok(Self {
            scheduler,
            ipc: Arc::new(ipc),
            store,
            rate_limiter,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .ok_or_else(|| anyhow!("IPC message receiver already taken"))?;

        let scheduler = self.scheduler.clone();
        let rate_limiter = Arc::new(Mutex::new(self.rate_limiter));
        let store = self.store.clone();

        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        let mut cleanup_timer = tokio::time::interval(LIMITER_CLEANUP_EVERY);

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = cleanup_timer.tick() => {
                    let mut limiter = rate_limiter.lock().await;
                    limiter.cleanup(LIMITER_CLEANUP_EVERY * 5);
                    debug!(tracked = limiter.tracked(), "Rate limiter cleanup");
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&scheduler, &ipc_ref, &store, &rate_limiter, msg).await;
                }
            }
        }

        info!("Shutting down flashdeckd");

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        ipc_ref.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(
        scheduler: &Arc<SchedulingService>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        rate_limiter: &Arc<Mutex<RateLimiter<ClientId>>>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                let (response, event) = handle_request(scheduler, &client_id, request);
                if let Err(e) = ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
                if let Some(event) = event {
                    ipc.broadcast_event(event);
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(client_id = %client_id, uid = ?info.uid, "Client connected");

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                }));

                rate_limiter.lock().await.remove(&client_id);
            }
        }
    }
}

/// Execute one request for its user, returning the response and any event to publish
fn handle_request(
    scheduler: &SchedulingService,
    client_id: &ClientId,
    request: Request,
) -> (Response, Option<Event>) {
    let Request {
        request_id,
        api_version,
        user_id,
        command,
    } = request;

    if api_version != API_VERSION {
        let error = ErrorInfo::new(
            ErrorCode::InvalidRequest,
            format!("Unsupported API version {api_version} (expected {API_VERSION})"),
        );
        return (Response::error(request_id, error), None);
    }

    let result = match command {
        Command::Review { card_id, rating } => scheduler
            .review(user_id, card_id, &rating)
            .map(|(card, event)| (ResponsePayload::Card(CardView::from(&card)), Some(event))),

        Command::Due { limit } => scheduler
            .due(user_id, limit)
            .map(|cards| (ResponsePayload::Cards(cards.iter().map(CardView::from).collect()), None)),

        Command::Study {
            strategy,
            limit,
            tag_ids,
            seed,
        } => {
            let query = StudyQuery {
                strategy,
                limit,
                tag_ids,
                seed,
            };
            scheduler
                .study(user_id, &query)
                .map(|cards| (ResponsePayload::Cards(cards.iter().map(CardView::from).collect()), None))
        }

        Command::GetCard { card_id } => scheduler
            .get_card(user_id, card_id)
            .map(|card| (ResponsePayload::Card(CardView::from(&card)), None)),

        Command::CreateCard { content, tags } => scheduler
            .create_card(user_id, content, &tags)
            .map(|(card, event)| (ResponsePayload::Card(CardView::from(&card)), Some(event))),

        Command::DeleteCard { card_id } => scheduler
            .delete_card(user_id, card_id)
            .map(|event| (ResponsePayload::Deleted, Some(event))),

        Command::ListTags => scheduler
            .list_tags(user_id)
            .map(|tags| (ResponsePayload::Tags(tags), None)),

        Command::CreateTag { name } => scheduler
            .create_tag(user_id, &name)
            .map(|tag| (ResponsePayload::Tag(tag), None)),

        Command::DeleteTag { tag_id } => scheduler
            .delete_tag(user_id, tag_id)
            .map(|()| (ResponsePayload::Deleted, None)),

        Command::SubscribeEvents => Ok((
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },
            None,
        )),

        Command::UnsubscribeEvents => Ok((ResponsePayload::Unsubscribed, None)),

        Command::GetHealth => Ok((ResponsePayload::Health(scheduler.health()), None)),

        Command::Ping => Ok((ResponsePayload::Pong, None)),
    };

    match result {
        Ok((payload, event)) => (
            Response::success(request_id, payload),
            event.map(event_for_clients),
        ),
        Err(e) => {
            if e.is_transient() {
                warn!(request_id, error = %e, "Request failed");
            } else {
                debug!(request_id, error = %e, "Request rejected");
            }
            (Response::error(request_id, error_info(&e)), None)
        }
    }
}

fn error_info(e: &FlashdeckError) -> ErrorInfo {
    let code = match e {
        FlashdeckError::ValidationError(_) => ErrorCode::ValidationFailed,
        FlashdeckError::NotFound(_) => ErrorCode::NotFound,
        FlashdeckError::Conflict(_) => ErrorCode::Conflict,
        FlashdeckError::StorageError(_) => ErrorCode::StorageUnavailable,
        FlashdeckError::RateLimited => ErrorCode::RateLimited,
        FlashdeckError::ConfigError(_)
        | FlashdeckError::IpcError(_)
        | FlashdeckError::Internal(_) => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, e.to_string())
}

fn event_for_clients(event: CoreEvent) -> Event {
    let user_id = event.user_id();
    let payload = match event {
        CoreEvent::CardReviewed {
            card_id,
            rating,
            schedule,
            ..
        } => EventPayload::CardReviewed {
            card_id,
            rating: rating.to_string(),
            interval: schedule.interval,
            ease_factor: schedule.ease_factor,
            next_review: schedule.next_review,
        },
        CoreEvent::CardCreated { card_id, .. } => EventPayload::CardCreated { card_id },
        CoreEvent::CardDeleted { card_id, .. } => EventPayload::CardDeleted { card_id },
    };
    Event::new(user_id, payload)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "flashdeckd starting");

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use flashdeck_api::{CardContent, CardType, ResponseResult};
    use flashdeck_config::Settings;
    use flashdeck_util::{FixedClock, UserId};

    fn scheduler() -> SchedulingService {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        SchedulingService::new(&Settings::default(), store, clock)
    }

    fn create(scheduler: &SchedulingService, user: UserId) -> (CardView, Option<Event>) {
        let content = CardContent {
            card_type: CardType::Phrase,
            target_text: "on thin ice".into(),
            target_meaning: "at risk".into(),
            context_sentence: String::new(),
            context_translation: String::new(),
            cloze_sentence: String::new(),
        };
        let request = Request::new(1, user, Command::CreateCard { content, tags: vec![] });
        let (response, event) = handle_request(scheduler, &ClientId::new(), request);
        match response.result {
            ResponseResult::Ok(ResponsePayload::Card(view)) => (view, event),
            other => panic!("unexpected response {other:?}"),
        }
    }

    fn error_code(response: &Response) -> Option<ErrorCode> {
        match &response.result {
            ResponseResult::Err(e) => Some(e.code),
            ResponseResult::Ok(_) => None,
        }
    }

    #[test]
    fn review_returns_card_and_user_scoped_event() {
        let scheduler = scheduler();
        let user = UserId::new();
        let (card, created) = create(&scheduler, user);
        assert!(matches!(
            created.map(|e| e.payload),
            Some(EventPayload::CardCreated { .. })
        ));

        let request = Request::new(
            2,
            user,
            Command::Review {
                card_id: card.card_id,
                rating: "easy".into(),
            },
        );
        let (response, event) = handle_request(&scheduler, &ClientId::new(), request);

        match response.result {
            ResponseResult::Ok(ResponsePayload::Card(view)) => {
                assert_eq!(view.interval, 1);
                assert_eq!(view.interval_display, "1d");
                assert_eq!(view.ease_factor, 2.55);
            }
            other => panic!("unexpected response {other:?}"),
        }

        let event = event.unwrap();
        assert_eq!(event.user_id, user);
        assert!(matches!(
            event.payload,
            EventPayload::CardReviewed { interval: 1, ref rating, .. } if rating == "easy"
        ));
    }

    #[test]
    fn errors_map_to_protocol_codes() {
        let scheduler = scheduler();
        let user = UserId::new();
        let (card, _) = create(&scheduler, user);
        let client = ClientId::new();

        let bad_rating = Request::new(
            2,
            user,
            Command::Review {
                card_id: card.card_id,
                rating: "meh".into(),
            },
        );
        let (response, event) = handle_request(&scheduler, &client, bad_rating);
        assert_eq!(error_code(&response), Some(ErrorCode::ValidationFailed));
        assert!(event.is_none());

        let foreign = Request::new(3, UserId::new(), Command::GetCard { card_id: card.card_id });
        let (response, _) = handle_request(&scheduler, &client, foreign);
        assert_eq!(error_code(&response), Some(ErrorCode::NotFound));

        let empty_tags = Request::new(
            4,
            user,
            Command::Study {
                strategy: "tag".into(),
                limit: None,
                tag_ids: vec![],
                seed: None,
            },
        );
        let (response, _) = handle_request(&scheduler, &client, empty_tags);
        assert_eq!(error_code(&response), Some(ErrorCode::ValidationFailed));
        assert_eq!(response.request_id, 4);
    }

    #[test]
    fn version_mismatch_rejected() {
        let scheduler = scheduler();
        let mut request = Request::new(9, UserId::new(), Command::Ping);
        request.api_version = API_VERSION + 1;

        let (response, _) = handle_request(&scheduler, &ClientId::new(), request);
        assert_eq!(error_code(&response), Some(ErrorCode::InvalidRequest));
    }

    #[test]
    fn transient_errors_stay_retryable() {
        let storage = error_info(&FlashdeckError::storage("disk full"));
        assert_eq!(storage.code, ErrorCode::StorageUnavailable);
        assert!(storage.code.is_retryable());

        let conflict = error_info(&FlashdeckError::conflict("raced"));
        assert!(conflict.code.is_retryable());

        let internal = error_info(&FlashdeckError::internal("bug"));
        assert_eq!(internal.code, ErrorCode::InternalError);
    }
}
