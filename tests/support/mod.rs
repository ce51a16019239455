#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use mentorbook::{
    config::{PaymentConfig, ReconciliationConfig},
    domain::{Caller, Role},
    error::{AppError, Result},
    notifications::{Notification, NotificationDispatcher, NotificationKind, NotificationSink},
    payments::{
        CreatedSession, ProviderEvent, ProviderEventKind, ProviderGateway, ProviderPaymentStatus,
        ProviderRefund, ProviderSessionState, SessionRequest, SessionSnapshot,
    },
    service::{CheckoutRequest, CheckoutSession, PaymentServices},
};

pub const PACKAGE_PRICE: i64 = 12000;

/// Gateway double: sessions live in memory and webhook payloads are plain
/// JSON signed with [`FakeGateway::SIGNATURE`].
#[derive(Default)]
pub struct FakeGateway {
    sessions: Mutex<HashMap<String, SessionSnapshot>>,
    pub session_requests: Mutex<Vec<SessionRequest>>,
    pub fail_sessions: AtomicBool,
    pub fail_refunds: AtomicBool,
    pub retrieve_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeGateway {
    pub const SIGNATURE: &'static str = "t=1,v1=test";

    fn set_session(&self, session_id: &str, status: ProviderPaymentStatus, state: ProviderSessionState, intent_id: Option<&str>) {
        let mut sessions = self.sessions.lock().unwrap();
        let snapshot = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSnapshot {
                session_id: session_id.to_string(),
                payment_status: status,
                state: Some(state),
                intent_id: None,
            });
        snapshot.payment_status = status;
        snapshot.state = Some(state);
        if let Some(intent_id) = intent_id {
            snapshot.intent_id = Some(intent_id.to_string());
        }
    }

    /// The buyer completes the hosted page and the charge goes through.
    pub fn pay(&self, session_id: &str, intent_id: &str) {
        self.set_session(session_id, ProviderPaymentStatus::Paid, ProviderSessionState::Complete, Some(intent_id));
    }

    /// The session times out without a payment.
    pub fn expire(&self, session_id: &str) {
        self.set_session(session_id, ProviderPaymentStatus::Unpaid, ProviderSessionState::Expired, None);
    }
}

#[async_trait]
impl ProviderGateway for FakeGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<CreatedSession> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(AppError::ProviderUnavailable("connection refused".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("cs_test_{}", n);
        self.set_session(&session_id, ProviderPaymentStatus::Unpaid, ProviderSessionState::Open, None);
        self.session_requests.lock().unwrap().push(request);

        Ok(CreatedSession {
            redirect_url: format!("https://checkout.test/pay/{}", session_id),
            session_id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::ProviderUnavailable(format!("No such session: {}", session_id)))
    }

    async fn create_refund(&self, intent_id: &str, _reason: &str, _idempotency_key: &str) -> Result<ProviderRefund> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(AppError::RefundFailed("charge already disputed".to_string()));
        }

        Ok(ProviderRefund {
            refund_id: format!("re_{}", intent_id),
            amount_cents: PACKAGE_PRICE,
        })
    }

    fn verify_event(&self, payload: &str, signature: &str) -> Result<ProviderEvent> {
        if signature != Self::SIGNATURE {
            return Err(AppError::InvalidSignature);
        }

        let value: Value = serde_json::from_str(payload).map_err(|_| AppError::InvalidSignature)?;
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        let payment_id = field("payment_id").and_then(|raw| Uuid::parse_str(&raw).ok());
        let id = field("id").ok_or(AppError::InvalidSignature)?;
        let kind = field("type").ok_or(AppError::InvalidSignature)?;

        let kind = match kind.as_str() {
            "checkout.session.completed" => ProviderEventKind::SessionCompleted {
                session_id: field("session_id").unwrap_or_default(),
                intent_id: field("intent_id"),
            },
            "checkout.session.expired" => ProviderEventKind::SessionExpired {
                session_id: field("session_id").unwrap_or_default(),
            },
            "payment_intent.succeeded" => ProviderEventKind::IntentSucceeded {
                intent_id: field("intent_id").unwrap_or_default(),
                payment_id,
            },
            "payment_intent.payment_failed" => ProviderEventKind::IntentFailed {
                intent_id: field("intent_id").unwrap_or_default(),
                payment_id,
            },
            _ => ProviderEventKind::Other(kind),
        };

        Ok(ProviderEvent { id, kind })
    }
}

pub fn session_completed(event_id: &str, session_id: &str, intent_id: &str) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "session_id": session_id,
        "intent_id": intent_id,
    })
    .to_string()
}

pub fn session_expired(event_id: &str, session_id: &str) -> String {
    json!({ "id": event_id, "type": "checkout.session.expired", "session_id": session_id }).to_string()
}

pub fn intent_succeeded(event_id: &str, intent_id: &str) -> String {
    json!({ "id": event_id, "type": "payment_intent.succeeded", "intent_id": intent_id }).to_string()
}

pub fn intent_failed(event_id: &str, intent_id: &str) -> String {
    json!({ "id": event_id, "type": "payment_intent.payment_failed", "intent_id": intent_id }).to_string()
}

/// Intent event carrying the payment id tagged on the intent at checkout.
pub fn tagged_intent_succeeded(event_id: &str, intent_id: &str, payment_id: Uuid) -> String {
    json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "intent_id": intent_id,
        "payment_id": payment_id.to_string(),
    })
    .to_string()
}

pub fn tagged_intent_failed(event_id: &str, intent_id: &str, payment_id: Uuid) -> String {
    json!({
        "id": event_id,
        "type": "payment_intent.payment_failed",
        "intent_id": intent_id,
        "payment_id": payment_id.to_string(),
    })
    .to_string()
}

#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn count(&self, recipient_id: Uuid, kind: NotificationKind) -> usize {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && n.kind == kind)
            .count()
    }

    pub fn total(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// One in-memory database; a single connection so every repository sees
/// the same data.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub struct Harness {
    pub pool: SqlitePool,
    pub gateway: Arc<FakeGateway>,
    pub sink: Arc<RecordingSink>,
    pub services: Arc<PaymentServices>,
    pub seller_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Uuid,
    pub buyer: Caller,
}

impl Harness {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_reconciliation(ReconciliationConfig::default()).await
    }

    pub async fn with_reconciliation(reconciliation: ReconciliationConfig) -> anyhow::Result<Self> {
        let pool = test_pool().await?;
        let gateway = Arc::new(FakeGateway::default());
        let sink = Arc::new(RecordingSink::default());

        let notifier = Arc::new(NotificationDispatcher::new());
        notifier.register(sink.clone()).await;

        let services = Arc::new(PaymentServices::from_pool(
            pool.clone(),
            gateway.clone(),
            notifier,
            &PaymentConfig::default(),
            &reconciliation,
        ));

        let seller_id = Uuid::new_v4();
        let service_id = seed_service(&pool, seller_id, true).await?;
        let package_id = seed_package(&pool, service_id, "Resume review", PACKAGE_PRICE, true).await?;

        Ok(Self {
            pool,
            gateway,
            sink,
            services,
            seller_id,
            service_id,
            package_id,
            buyer: Caller::new(Uuid::new_v4(), Role::Mentee),
        })
    }

    pub fn request(&self) -> CheckoutRequest {
        CheckoutRequest {
            service_id: self.service_id,
            package_id: self.package_id,
            scheduled_at: Utc::now() + Duration::days(3),
            duration_minutes: 60,
            notes: Some("Focus on system design".to_string()),
        }
    }

    pub async fn checkout(&self) -> anyhow::Result<CheckoutSession> {
        Ok(self.services.checkout.create_checkout(self.buyer, self.request()).await?)
    }

    pub async fn deliver(&self, payload: String) -> Result<mentorbook::service::WebhookOutcome> {
        self.services.webhooks.handle(&payload, FakeGateway::SIGNATURE).await
    }

    pub async fn booking_count(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub async fn seed_service(pool: &SqlitePool, seller_id: Uuid, published: bool) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO services (id, seller_id, title, is_published) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(seller_id.to_string())
        .bind("Career mentoring")
        .bind(published)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_package(
    pool: &SqlitePool,
    service_id: Uuid,
    name: &str,
    price_cents: i64,
    active: bool,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO service_packages (id, service_id, name, price_cents, is_active) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(id.to_string())
    .bind(service_id.to_string())
    .bind(name)
    .bind(price_cents)
    .bind(active)
    .execute(pool)
    .await?;
    Ok(id)
}
