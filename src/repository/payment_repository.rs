use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{OrderAction, OrderStatus, Payment, PaymentDecision, PaymentStatus},
    error::{AppError, Result},
    repository::{order_repository, parse_id, utc, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    status: String,
    amount_cents: i64,
    proof_image: Option<String>,
    admin_note: Option<String>,
    verified_by: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    submitted_at: Option<NaiveDateTime>,
    verified_at: Option<NaiveDateTime>,
}

#[derive(FromRow)]
struct ValidationRow {
    subtotal_cents: i64,
    user_id: String,
    status: String,
}

/// What a proof submission is checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentValidationData {
    pub amount_cents: i64,
    pub owner_id: Uuid,
    pub order_status: OrderStatus,
}

const PAYMENT_COLUMNS: &str = "id, order_id, status, amount_cents, proof_image, admin_note, \
                               verified_by, created_at, updated_at, submitted_at, verified_at";

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_payment(row: PaymentRow) -> Result<Payment> {
    Ok(Payment {
        id: parse_id(&row.id)?,
        order_id: parse_id(&row.order_id)?,
        status: parse_payment_status(&row.status)?,
        amount_cents: row.amount_cents,
        proof_image: row.proof_image,
        admin_note: row.admin_note,
        verified_by: row.verified_by.as_deref().map(parse_id).transpose()?,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
        submitted_at: row.submitted_at.map(utc),
        verified_at: row.verified_at.map(utc),
    })
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
    PaymentStatus::from_str(s)
        .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", s)))
}

pub(crate) async fn fetch_by_order(pool: &SqlitePool, order_id: Uuid) -> Result<Option<Payment>> {
    let row = sqlx::query_as::<_, PaymentRow>(
        &format!("SELECT {} FROM payments WHERE order_id = ?", PAYMENT_COLUMNS)
    )
    .bind(order_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(row_to_payment).transpose()
}

async fn payment_status(conn: &mut SqliteConnection, payment_id: Uuid) -> Result<Option<PaymentStatus>> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM payments WHERE id = ?")
        .bind(payment_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    status.as_deref().map(parse_payment_status).transpose()
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            &format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_payment).transpose()
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Payment>> {
        fetch_by_order(&self.pool, order_id).await
    }

    async fn validation_data(&self, order_id: Uuid) -> Result<Option<PaymentValidationData>> {
        let row = sqlx::query_as::<_, ValidationRow>(
            "SELECT subtotal_cents, user_id, status FROM orders WHERE id = ?"
        )
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(PaymentValidationData {
                amount_cents: r.subtotal_cents,
                owner_id: parse_id(&r.user_id)?,
                order_status: order_repository::parse_order_status(&r.status)?,
            })),
            None => Ok(None),
        }
    }

    async fn submit_proof(&self, order_id: Uuid, proof_image: &str, amount_cents: i64) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        // Guarded on the order still being Pending: if the expiry worker
        // cancelled it first, this matches nothing and the submission loses.
        if !order_repository::apply_transition(&mut tx, order_id, OrderAction::SubmitPayment).await? {
            return match order_repository::current_status(&mut tx, order_id).await? {
                None => Err(AppError::NotFound("Order not found".to_string())),
                Some(_) => Err(AppError::Conflict(
                    "The payment window for this order has closed".to_string(),
                )),
            };
        }

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET proof_image = ?,
                status = ?,
                amount_cents = ?,
                submitted_at = ?,
                updated_at = ?
            WHERE order_id = ? AND status = ?
            "#
        )
        .bind(proof_image)
        .bind(PaymentStatus::Submitted.as_str())
        .bind(amount_cents)
        .bind(now)
        .bind(now)
        .bind(order_id.to_string())
        .bind(PaymentStatus::Unpaid.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Payment has already been submitted".to_string()));
        }

        tx.commit().await?;

        self.find_by_order(order_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve submitted payment".to_string())
        })
    }

    async fn decide(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
        decision: PaymentDecision,
    ) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                verified_by = ?,
                admin_note = ?,
                verified_at = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(decision.resulting_status().as_str())
        .bind(admin_id.to_string())
        .bind(&note)
        .bind(now)
        .bind(now)
        .bind(payment_id.to_string())
        .bind(PaymentStatus::Submitted.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return match payment_status(&mut tx, payment_id).await? {
                None => Err(AppError::NotFound("Payment not found".to_string())),
                Some(status) => Err(AppError::Conflict(format!(
                    "Payment is {} and cannot be verified",
                    status.as_str()
                ))),
            };
        }

        let order_id = sqlx::query_scalar::<_, String>("SELECT order_id FROM payments WHERE id = ?")
            .bind(payment_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let order_id = parse_id(&order_id)?;

        match decision {
            PaymentDecision::Approve => {
                if !order_repository::apply_transition(&mut tx, order_id, OrderAction::Confirm).await? {
                    return Err(AppError::Conflict(
                        "Order is no longer awaiting confirmation".to_string(),
                    ));
                }
            }
            PaymentDecision::Reject => {
                if order_repository::cancel_in_tx(&mut tx, order_id, OrderAction::Cancel).await?.is_err() {
                    return Err(AppError::Conflict("Order can no longer be cancelled".to_string()));
                }
            }
        }

        tx.commit().await?;

        self.find_by_id(payment_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve verified payment".to_string())
        })
    }

    async fn list_pending(&self) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            &format!(
                "SELECT {} FROM payments WHERE status = ? ORDER BY submitted_at ASC",
                PAYMENT_COLUMNS
            )
        )
        .bind(PaymentStatus::Submitted.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(row_to_payment)
            .collect()
    }
}
