use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    reference_number: String,
    member_id: String,
    plan_id: String,
    amount_centavos: i64,
    currency: String,
    contact_number: String,
    status: String,
    otp_code_hash: Option<String>,
    otp_expires_at: Option<NaiveDateTime>,
    otp_attempts: i32,
    otp_max_attempts: i32,
    resend_count: i32,
    resend_max: i32,
    last_resend_at: Option<NaiveDateTime>,
    provider_ref: Option<String>,
    failure_reason: Option<String>,
    created_at: NaiveDateTime,
    verified_at: Option<NaiveDateTime>,
    paid_at: Option<NaiveDateTime>,
    version: i64,
}

const PAYMENT_COLUMNS: &str = r#"
    id, reference_number, member_id, plan_id, amount_centavos, currency,
    contact_number, status, otp_code_hash, otp_expires_at, otp_attempts,
    otp_max_attempts, resend_count, resend_max, last_resend_at,
    provider_ref, failure_reason, created_at, verified_at, paid_at, version
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            reference_number: row.reference_number,
            member_id: Uuid::parse_str(&row.member_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            plan_id: Uuid::parse_str(&row.plan_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            amount_centavos: row.amount_centavos,
            currency: row.currency,
            contact_number: row.contact_number,
            status: Self::parse_status(&row.status)?,
            otp_code_hash: row.otp_code_hash,
            otp_expires_at: row.otp_expires_at.map(to_utc),
            otp_attempts: row.otp_attempts,
            otp_max_attempts: row.otp_max_attempts,
            resend_count: row.resend_count,
            resend_max: row.resend_max,
            last_resend_at: row.last_resend_at.map(to_utc),
            provider_ref: row.provider_ref,
            failure_reason: row.failure_reason,
            created_at: to_utc(row.created_at),
            verified_at: row.verified_at.map(to_utc),
            paid_at: row.paid_at.map(to_utc),
            version: row.version,
        })
    }

    fn parse_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Created" => Ok(PaymentStatus::Created),
            "PendingOtp" => Ok(PaymentStatus::PendingOtp),
            "Verified" => Ok(PaymentStatus::Verified),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Created => "Created",
            PaymentStatus::PendingOtp => "PendingOtp",
            PaymentStatus::Verified => "Verified",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }
}

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, reference_number, member_id, plan_id, amount_centavos,
                currency, contact_number, status, otp_code_hash,
                otp_expires_at, otp_attempts, otp_max_attempts,
                resend_count, resend_max, last_resend_at, provider_ref,
                failure_reason, created_at, verified_at, paid_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(&payment.reference_number)
        .bind(payment.member_id.to_string())
        .bind(payment.plan_id.to_string())
        .bind(payment.amount_centavos)
        .bind(&payment.currency)
        .bind(&payment.contact_number)
        .bind(Self::status_to_str(payment.status))
        .bind(&payment.otp_code_hash)
        .bind(payment.otp_expires_at.map(|dt| dt.naive_utc()))
        .bind(payment.otp_attempts)
        .bind(payment.otp_max_attempts)
        .bind(payment.resend_count)
        .bind(payment.resend_max)
        .bind(payment.last_resend_at.map(|dt| dt.naive_utc()))
        .bind(&payment.provider_ref)
        .bind(&payment.failure_reason)
        .bind(payment.created_at.naive_utc())
        .bind(payment.verified_at.map(|dt| dt.naive_utc()))
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(payment.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE reference_number = ?",
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn update_guarded(&self, payment: &Payment, expected_version: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                otp_code_hash = ?,
                otp_expires_at = ?,
                otp_attempts = ?,
                resend_count = ?,
                last_resend_at = ?,
                provider_ref = ?,
                failure_reason = ?,
                verified_at = ?,
                paid_at = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(Self::status_to_str(payment.status))
        .bind(&payment.otp_code_hash)
        .bind(payment.otp_expires_at.map(|dt| dt.naive_utc()))
        .bind(payment.otp_attempts)
        .bind(payment.resend_count)
        .bind(payment.last_resend_at.map(|dt| dt.naive_utc()))
        .bind(&payment.provider_ref)
        .bind(&payment.failure_reason)
        .bind(payment.verified_at.map(|dt| dt.naive_utc()))
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(payment.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_with_membership(
        &self,
        payment: &Payment,
        expected_version: i64,
        new_membership_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                otp_code_hash = NULL,
                provider_ref = ?,
                paid_at = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(Self::status_to_str(PaymentStatus::Completed))
        .bind(&payment.provider_ref)
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(payment.id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() != 1 {
            tx.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE members
            SET status = 'Active',
                membership_expires_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(new_membership_expires_at.naive_utc())
        .bind(Utc::now().naive_utc())
        .bind(payment.member_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(true)
    }

    async fn fail_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Failed',
                otp_code_hash = NULL,
                failure_reason = 'otp_expired',
                version = version + 1
            WHERE status = 'PendingOtp' AND otp_expires_at < ?
            "#,
        )
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
