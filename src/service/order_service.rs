use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;
use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{
        order_repository::NewOrderItem, CancelOutcome, NewOrder, OrderRepository, PaymentRepository,
    },
    service::{catalog_service::CatalogService, expiration::ExpirationRegistry},
};

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    catalog: Arc<CatalogService>,
    expirations: Arc<ExpirationRegistry>,
    payment_window: chrono::Duration,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        catalog: Arc<CatalogService>,
        expirations: Arc<ExpirationRegistry>,
        payment_window: chrono::Duration,
    ) -> Self {
        Self { orders, payments, catalog, expirations, payment_window }
    }

    /// Places a single-line order for `user_id`. Stock is taken in the same
    /// transaction that writes the order; the payment window starts now.
    pub async fn create_order(&self, user_id: Uuid, request: CreateOrderRequest) -> Result<Order> {
        request.validate()?;

        let product = self.catalog.product_snapshot(request.product_id).await?;

        // Early answer only; the decrement itself is guarded.
        if product.current_stock < request.quantity {
            return Err(AppError::insufficient_stock(&product.name));
        }

        let new_order = NewOrder {
            user_id,
            notes: request.notes,
            items: vec![NewOrderItem::from_snapshot(&product, request.quantity)],
        };

        let order = self.orders.create(new_order).await?;

        let deadline = Utc::now() + self.payment_window;
        self.expirations.register(order.id, deadline);

        tracing::info!(
            order_id = %order.id,
            %user_id,
            total_cents = order.total_amount_cents,
            %deadline,
            "Order created"
        );

        Ok(order)
    }

    /// Customers see their own orders only; admins see everything.
    pub async fn get_order(&self, order_id: Uuid, caller: &User) -> Result<Order> {
        let order = self.find(order_id).await?;

        if order.user_id != caller.id && !caller.is_admin() {
            return Err(AppError::Forbidden);
        }

        Ok(order)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        self.orders.list_by_user(user_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<Order>> {
        self.orders.list_all().await
    }

    pub async fn list_by_status(&self, status: &str) -> Result<Vec<Order>> {
        let status = OrderStatus::from_str(status)
            .ok_or_else(|| AppError::Validation(format!("Unknown order status: {}", status)))?;
        self.orders.list_by_status(status).await
    }

    /// Admin status write. Order and payment always move together:
    /// confirming approves the submitted payment, cancelling rejects it and
    /// releases stock. WaitingConfirmation is only reachable by submitting
    /// proof, and nothing moves back to Pending.
    pub async fn update_status(&self, order_id: Uuid, status: &str, admin_id: Uuid) -> Result<Order> {
        let target = OrderStatus::from_str(status)
            .ok_or_else(|| AppError::Validation(format!("Unknown order status: {}", status)))?;

        let action = OrderAction::for_target(target).ok_or_else(|| {
            AppError::Conflict(format!("Orders cannot be moved back to {}", target.as_str()))
        })?;

        match action {
            OrderAction::Cancel => self.cancel_order(order_id).await,
            OrderAction::Confirm => self.confirm_order(order_id, admin_id).await,
            OrderAction::SubmitPayment | OrderAction::Expire => Err(AppError::Conflict(format!(
                "{} is only reached by submitting payment proof",
                target.as_str()
            ))),
        }
    }

    async fn confirm_order(&self, order_id: Uuid, admin_id: Uuid) -> Result<Order> {
        let order = self.find(order_id).await?;

        if order.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Order is already {}",
                order.status.as_str()
            )));
        }

        let payment = self
            .payments
            .find_by_order(order_id)
            .await?
            .filter(|payment| payment.status == PaymentStatus::Submitted)
            .ok_or_else(|| {
                AppError::Conflict("Order has no submitted payment to approve".to_string())
            })?;

        self.payments
            .decide(payment.id, admin_id, None, PaymentDecision::Approve)
            .await?;
        self.expirations.cancel(order_id);

        tracing::info!(%order_id, payment_id = %payment.id, %admin_id, "Order confirmed by admin");

        self.find(order_id).await
    }

    /// Cancels the order and puts its stock back. Cancelling an already
    /// cancelled order does nothing and returns it as is.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order> {
        match self.orders.cancel(order_id, OrderAction::Cancel).await? {
            CancelOutcome::Cancelled(order) => {
                self.expirations.cancel(order_id);
                tracing::info!(%order_id, "Order cancelled, stock restored");
                Ok(order)
            }
            CancelOutcome::AlreadyCancelled(order) => {
                tracing::debug!(%order_id, "Order was already cancelled");
                Ok(order)
            }
            CancelOutcome::Illegal(status) => Err(AppError::Conflict(format!(
                "Cannot cancel an order that is {}",
                status.as_str()
            ))),
        }
    }

    async fn find(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }
}
