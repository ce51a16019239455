use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{BookingMetadata, Payment, PaymentStatus, RefundDetails, Transition},
    error::{AppError, Result},
    repository::PaymentRepository,
};

const PAYMENT_COLUMNS: &str = r#"
    id, provider_session_id, provider_intent_id, buyer_id, seller_id,
    service_id, package_id, package_name, amount_cents, platform_fee_cents,
    seller_amount_cents, currency, status, metadata, booking_id,
    refund_id, refund_amount_cents, refund_reason, paid_at, created_at, updated_at
"#;

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    provider_session_id: String,
    provider_intent_id: Option<String>,
    buyer_id: String,
    seller_id: String,
    service_id: String,
    package_id: String,
    package_name: String,
    amount_cents: i64,
    platform_fee_cents: i64,
    seller_amount_cents: i64,
    currency: String,
    status: String,
    metadata: String,
    booking_id: Option<String>,
    refund_id: Option<String>,
    refund_amount_cents: Option<i64>,
    refund_reason: Option<String>,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        let refund = match (row.refund_id, row.refund_amount_cents) {
            (Some(refund_id), Some(amount_cents)) => Some(RefundDetails {
                refund_id,
                amount_cents,
                reason: row.refund_reason.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Payment {
            id: Self::parse_uuid(&row.id)?,
            provider_session_id: row.provider_session_id,
            provider_intent_id: row.provider_intent_id,
            buyer_id: Self::parse_uuid(&row.buyer_id)?,
            seller_id: Self::parse_uuid(&row.seller_id)?,
            service_id: Self::parse_uuid(&row.service_id)?,
            package_id: Self::parse_uuid(&row.package_id)?,
            package_name: row.package_name,
            amount_cents: row.amount_cents,
            platform_fee_cents: row.platform_fee_cents,
            seller_amount_cents: row.seller_amount_cents,
            currency: row.currency,
            status: PaymentStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            metadata: BookingMetadata::from_json(&row.metadata)?,
            booking_id: row.booking_id.as_deref().map(Self::parse_uuid).transpose()?,
            refund,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Payment>> {
        let query = format!("SELECT {} FROM payments WHERE {} = ?", PAYMENT_COLUMNS, column);
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let metadata = payment.metadata.to_json()?;
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, provider_session_id, provider_intent_id, buyer_id, seller_id,
                service_id, package_id, package_name, amount_cents, platform_fee_cents,
                seller_amount_cents, currency, status, metadata, booking_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#
        )
        .bind(payment.id.to_string())
        .bind(&payment.provider_session_id)
        .bind(&payment.provider_intent_id)
        .bind(payment.buyer_id.to_string())
        .bind(payment.seller_id.to_string())
        .bind(payment.service_id.to_string())
        .bind(payment.package_id.to_string())
        .bind(&payment.package_name)
        .bind(payment.amount_cents)
        .bind(payment.platform_fee_cents)
        .bind(payment.seller_amount_cents)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Payment>> {
        self.find_one("provider_session_id", session_id).await
    }

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>> {
        self.find_one("provider_intent_id", intent_id).await
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        intent_id: Option<&str>,
    ) -> Result<bool> {
        if transition == Transition::Refund {
            return Err(AppError::Internal(
                "Refunds must carry refund details; use mark_refunded".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let paid_at = (transition == Transition::Succeed).then_some(now);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE payments SET status = ");
        query.push_bind(transition.target().as_str());
        query.push(", provider_intent_id = COALESCE(provider_intent_id, ");
        query.push_bind(intent_id);
        query.push("), paid_at = COALESCE(paid_at, ");
        query.push_bind(paid_at);
        query.push("), updated_at = ");
        query.push_bind(now);
        query.push(" WHERE id = ");
        query.push_bind(id.to_string());
        query.push(" AND status IN (");
        let mut sources = query.separated(", ");
        for status in transition.sources() {
            sources.push_bind(status.as_str());
        }
        sources.push_unseparated(")");

        let result = query.build().execute(&self.pool).await?;

        Ok(result.rows_affected() == 1)
    }

    async fn attach_intent(&self, id: Uuid, intent_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET provider_intent_id = ?, updated_at = ?
            WHERE id = ? AND provider_intent_id IS NULL
            "#
        )
        .bind(intent_id)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_refunded(&self, id: Uuid, refund: &RefundDetails) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                refund_id = ?,
                refund_amount_cents = ?,
                refund_reason = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(Transition::Refund.target().as_str())
        .bind(&refund.refund_id)
        .bind(refund.amount_cents)
        .bind(&refund.reason)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .bind(PaymentStatus::Succeeded.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_succeeded_without_booking(
        &self,
        updated_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments
            WHERE status = ? AND booking_id IS NULL AND updated_at < ?
            ORDER BY updated_at ASC
            LIMIT ?
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(PaymentStatus::Succeeded.as_str())
            .bind(updated_before.naive_utc())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn list_open(&self, created_before: DateTime<Utc>, limit: i64) -> Result<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments
            WHERE status IN (?, ?) AND created_at < ?
            ORDER BY created_at ASC
            LIMIT ?
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(PaymentStatus::Pending.as_str())
            .bind(PaymentStatus::Processing.as_str())
            .bind(created_before.naive_utc())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }
}
