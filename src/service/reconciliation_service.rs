use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::{
    config::ReconciliationConfig,
    error::Result,
    repository::PaymentRepository,
    service::{booking_service::BookingMaterializer, verification_service::SessionVerifier},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub materialized: usize,
    pub already_materialized: usize,
    pub reverified: usize,
    pub failures: usize,
}

/// Closes the gaps left by crashes and lost webhooks.
///
/// Succeeded payments without a booking get materialized; payments stuck
/// in pending/processing are re-checked against the provider.
pub struct Reconciler {
    payments: Arc<dyn PaymentRepository>,
    materializer: Arc<BookingMaterializer>,
    verifier: Arc<SessionVerifier>,
    config: ReconciliationConfig,
}

impl Reconciler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        materializer: Arc<BookingMaterializer>,
        verifier: Arc<SessionVerifier>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            payments,
            materializer,
            verifier,
            config,
        }
    }

    pub async fn sweep(&self) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport::default();
        let now = Utc::now();

        let unbooked = self.payments
            .list_succeeded_without_booking(
                now - chrono::Duration::seconds(self.config.grace_period_secs),
                self.config.batch_size,
            )
            .await?;

        for payment in unbooked {
            match self.materializer.materialize(payment.id).await {
                Ok(m) if m.created => {
                    tracing::warn!(
                        "Reconciliation materialized booking {} for payment {}",
                        m.booking_id,
                        payment.id
                    );
                    report.materialized += 1;
                }
                Ok(_) => report.already_materialized += 1,
                Err(e) => {
                    tracing::error!("Failed to materialize payment {}: {:?}", payment.id, e);
                    report.failures += 1;
                }
            }
        }

        let stale = self.payments
            .list_open(
                now - chrono::Duration::seconds(self.config.stale_after_secs),
                self.config.batch_size,
            )
            .await?;

        for payment in stale {
            let payment_id = payment.id;
            match self.verifier.reconcile(payment).await {
                Ok((payment, provider_status)) => {
                    tracing::debug!(
                        "Re-verified stale payment {}: provider says {}, now {}",
                        payment_id,
                        provider_status,
                        payment.status.as_str()
                    );
                    report.reverified += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to re-verify payment {}: {:?}", payment_id, e);
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run [`Reconciler::sweep`] on a fixed interval until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(report) if report != ReconciliationReport::default() => {
                        tracing::info!("Reconciliation sweep: {:?}", report);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!("Reconciliation sweep failed: {:?}", e),
                }
            }
        })
    }
}
