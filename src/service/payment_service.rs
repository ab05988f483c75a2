use std::sync::Arc;
use uuid::Uuid;
use crate::{
    domain::*,
    error::{AppError, Result},
    repository::PaymentRepository,
    service::expiration::ExpirationRegistry,
    storage::FileStorage,
};

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    storage: Arc<dyn FileStorage>,
    expirations: Arc<ExpirationRegistry>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        storage: Arc<dyn FileStorage>,
        expirations: Arc<ExpirationRegistry>,
    ) -> Self {
        Self { payments, storage, expirations }
    }

    /// Stores the proof image and moves the order to WaitingConfirmation.
    ///
    /// The file is written first so the upload is not held in memory while
    /// the order is checked. If anything after that fails the file is
    /// removed again.
    pub async fn submit_proof(&self, order_id: Uuid, user_id: Uuid, proof: &[u8]) -> Result<Payment> {
        let handle = self.storage.save(proof).await?;

        match self.record_proof(order_id, user_id, &handle).await {
            Ok(payment) => {
                self.expirations.cancel(order_id);
                tracing::info!(%order_id, payment_id = %payment.id, "Payment proof submitted");
                Ok(payment)
            }
            Err(e) => {
                tracing::debug!(%order_id, error = %e, "Discarding proof of failed submission");
                self.storage.delete(&handle).await;
                Err(e)
            }
        }
    }

    async fn record_proof(&self, order_id: Uuid, user_id: Uuid, handle: &str) -> Result<Payment> {
        let data = self
            .payments
            .validation_data(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if data.owner_id != user_id {
            return Err(AppError::Forbidden);
        }

        if data.order_status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order is {} and no longer accepts payment",
                data.order_status.as_str()
            )));
        }

        // The status check above is advisory; the repository re-checks it
        // inside the write so a concurrent expiry cannot slip through.
        self.payments
            .submit_proof(order_id, handle, data.amount_cents)
            .await
    }

    pub async fn approve(&self, payment_id: Uuid, admin_id: Uuid, note: Option<String>) -> Result<Payment> {
        self.decide(payment_id, admin_id, note, PaymentDecision::Approve).await
    }

    /// Rejects the payment, cancels its order and returns the stock.
    pub async fn reject(&self, payment_id: Uuid, admin_id: Uuid, note: Option<String>) -> Result<Payment> {
        self.decide(payment_id, admin_id, note, PaymentDecision::Reject).await
    }

    async fn decide(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
        decision: PaymentDecision,
    ) -> Result<Payment> {
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let payment = self.payments.decide(payment_id, admin_id, note, decision).await?;

        self.expirations.cancel(payment.order_id);

        tracing::info!(
            %payment_id,
            order_id = %payment.order_id,
            %admin_id,
            status = payment.status.as_str(),
            "Payment verified"
        );

        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    /// The admin review queue, oldest submission first.
    pub async fn pending_payments(&self) -> Result<Vec<Payment>> {
        self.payments.list_pending().await
    }
}
