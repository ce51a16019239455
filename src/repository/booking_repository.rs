use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, PaymentStatus},
    error::{AppError, Result},
    repository::{BookingRepository, MaterializeOutcome},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    payment_id: String,
    buyer_id: String,
    seller_id: String,
    service_id: String,
    package_id: String,
    package_name: String,
    scheduled_at: NaiveDateTime,
    duration_minutes: i64,
    notes: Option<String>,
    status: String,
    cancellation_reason: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ClaimRow {
    booking_id: Option<String>,
    status: String,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: Self::parse_uuid(&row.id)?,
            payment_id: Self::parse_uuid(&row.payment_id)?,
            buyer_id: Self::parse_uuid(&row.buyer_id)?,
            seller_id: Self::parse_uuid(&row.seller_id)?,
            service_id: Self::parse_uuid(&row.service_id)?,
            package_id: Self::parse_uuid(&row.package_id)?,
            package_name: row.package_name,
            scheduled_at: DateTime::from_naive_utc_and_offset(row.scheduled_at, Utc),
            duration_minutes: u32::try_from(row.duration_minutes)
                .map_err(|e| AppError::Database(e.to_string()))?,
            notes: row.notes,
            status: BookingStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid booking status: {}", row.status)))?,
            cancellation_reason: row.cancellation_reason,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_one(&self, column: &str, value: String) -> Result<Option<Booking>> {
        let query = format!(
            r#"
            SELECT id, payment_id, buyer_id, seller_id, service_id, package_id,
                   package_name, scheduled_at, duration_minutes, notes, status,
                   cancellation_reason, created_at, updated_at
            FROM bookings
            WHERE {} = ?
            "#,
            column
        );
        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_booking).transpose()
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn materialize(&self, booking: Booking) -> Result<MaterializeOutcome> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();
        let payment_id = booking.payment_id.to_string();

        let claimed = sqlx::query(
            r#"
            UPDATE payments
            SET booking_id = ?, updated_at = ?
            WHERE id = ? AND booking_id IS NULL AND status = ?
            "#
        )
        .bind(booking.id.to_string())
        .bind(now)
        .bind(&payment_id)
        .bind(PaymentStatus::Succeeded.as_str())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let current = sqlx::query_as::<_, ClaimRow>(
                "SELECT booking_id, status FROM payments WHERE id = ?"
            )
            .bind(&payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;

            tx.rollback().await?;

            return match current.booking_id {
                Some(existing) => Ok(MaterializeOutcome::Existing(Self::parse_uuid(&existing)?)),
                None => {
                    let status = PaymentStatus::parse(&current.status).ok_or_else(|| {
                        AppError::Database(format!("Invalid payment status: {}", current.status))
                    })?;
                    Ok(MaterializeOutcome::NotEligible(status))
                }
            };
        }

        // Any error from here on drops `tx`, which rolls the claim back.
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, payment_id, buyer_id, seller_id, service_id, package_id,
                package_name, scheduled_at, duration_minutes, notes, status,
                cancellation_reason, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#
        )
        .bind(booking.id.to_string())
        .bind(&payment_id)
        .bind(booking.buyer_id.to_string())
        .bind(booking.seller_id.to_string())
        .bind(booking.service_id.to_string())
        .bind(booking.package_id.to_string())
        .bind(&booking.package_name)
        .bind(booking.scheduled_at.naive_utc())
        .bind(i64::from(booking.duration_minutes))
        .bind(&booking.notes)
        .bind(booking.status.as_str())
        .bind(booking.created_at.naive_utc())
        .bind(booking.updated_at.naive_utc())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(MaterializeOutcome::Created(booking))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        self.find_one("id", id.to_string()).await
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Booking>> {
        self.find_one("payment_id", payment_id.to_string()).await
    }

    async fn cancel(&self, id: Uuid, reason: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = ?, cancellation_reason = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(BookingStatus::Cancelled.as_str())
        .bind(reason)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .bind(BookingStatus::Confirmed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
