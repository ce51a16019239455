pub mod booking_service;
pub mod checkout_service;
pub mod reconciliation_service;
pub mod refund_service;
pub mod state_machine;
pub mod verification_service;
pub mod webhook_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::config::{PaymentConfig, ReconciliationConfig};
use crate::notifications::NotificationDispatcher;
use crate::payments::ProviderGateway;
use crate::repository::*;

pub use booking_service::{BookingMaterializer, Materialization};
pub use checkout_service::{CheckoutRequest, CheckoutService, CheckoutSession};
pub use reconciliation_service::{ReconciliationReport, Reconciler};
pub use refund_service::RefundService;
pub use state_machine::{PaymentStateMachine, TransitionResult};
pub use verification_service::{SessionVerifier, VerificationResult};
pub use webhook_service::{WebhookOutcome, WebhookProcessor};

/// The reconciliation engine, wired up once at startup and shared by all
/// request handlers.
pub struct PaymentServices {
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub checkout: CheckoutService,
    pub webhooks: WebhookProcessor,
    pub verifier: Arc<SessionVerifier>,
    pub materializer: Arc<BookingMaterializer>,
    pub refunds: RefundService,
    pub reconciler: Arc<Reconciler>,
}

impl PaymentServices {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        catalog_repo: Arc<dyn CatalogRepository>,
        webhook_event_repo: Arc<dyn WebhookEventRepository>,
        gateway: Arc<dyn ProviderGateway>,
        notifier: Arc<NotificationDispatcher>,
        payments: &PaymentConfig,
        reconciliation: &ReconciliationConfig,
    ) -> Self {
        let materializer = Arc::new(BookingMaterializer::new(
            payment_repo.clone(),
            booking_repo.clone(),
            notifier.clone(),
        ));
        let state_machine = Arc::new(PaymentStateMachine::new(
            payment_repo.clone(),
            materializer.clone(),
            notifier.clone(),
        ));

        let checkout = CheckoutService::new(
            catalog_repo,
            payment_repo.clone(),
            gateway.clone(),
            payments.platform_fee_bps,
            payments.currency.clone(),
        );
        let webhooks = WebhookProcessor::new(
            gateway.clone(),
            payment_repo.clone(),
            webhook_event_repo,
            state_machine.clone(),
        );
        let verifier = Arc::new(SessionVerifier::new(
            gateway.clone(),
            payment_repo.clone(),
            state_machine,
        ));
        let refunds = RefundService::new(
            gateway,
            payment_repo.clone(),
            booking_repo.clone(),
            notifier,
        );
        let reconciler = Arc::new(Reconciler::new(
            payment_repo.clone(),
            materializer.clone(),
            verifier.clone(),
            reconciliation.clone(),
        ));

        Self {
            payment_repo,
            booking_repo,
            checkout,
            webhooks,
            verifier,
            materializer,
            refunds,
            reconciler,
        }
    }

    /// Wire every repository to the same SQLite pool.
    pub fn from_pool(
        pool: SqlitePool,
        gateway: Arc<dyn ProviderGateway>,
        notifier: Arc<NotificationDispatcher>,
        payments: &PaymentConfig,
        reconciliation: &ReconciliationConfig,
    ) -> Self {
        Self::new(
            Arc::new(SqlitePaymentRepository::new(pool.clone())),
            Arc::new(SqliteBookingRepository::new(pool.clone())),
            Arc::new(SqliteCatalogRepository::new(pool.clone())),
            Arc::new(SqliteWebhookEventRepository::new(pool)),
            gateway,
            notifier,
            payments,
            reconciliation,
        )
    }
}
