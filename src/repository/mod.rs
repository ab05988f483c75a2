use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::{AppError, Result};

pub mod user_repository;
pub mod category_repository;
pub mod product_repository;
pub mod order_repository;
pub mod payment_repository;
pub mod inventory;

pub use user_repository::SqliteUserRepository;
pub use category_repository::SqliteCategoryRepository;
pub use product_repository::SqliteProductRepository;
pub use order_repository::{NewOrder, SqliteOrderRepository};
pub use payment_repository::{PaymentValidationData, SqlitePaymentRepository};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, request: RegisterUserRequest, role: UserRole) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// The user together with their stored password hash, for login.
    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>>;
    async fn update_profile(&self, id: Uuid, update: UpdateProfileRequest) -> Result<User>;
    /// Removes the account and its sessions. Refused while orders reference it.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, request: CreateCategoryRequest) -> Result<Category>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    async fn list(&self) -> Result<Vec<Category>>;
    async fn update(&self, id: Uuid, update: UpdateCategoryRequest) -> Result<Category>;
    /// Refused while products still belong to the category.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, request: CreateProductRequest) -> Result<Product>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>>;
    /// Active products only.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Product>>;
    /// Active products of one category.
    async fn list_by_category(&self, category_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Product>>;
    async fn list_by_status(&self, status: ProductStatus, limit: i64, offset: i64) -> Result<Vec<Product>>;
    async fn update(&self, id: Uuid, update: UpdateProductRequest) -> Result<Product>;
    /// Refused once any order line references the product; deactivate it instead.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// What happened when an order was asked to cancel.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// Stock was restored and the order is now cancelled.
    Cancelled(Order),
    /// Someone got there first; nothing was touched.
    AlreadyCancelled(Order),
    /// The order is in a status the action cannot leave from.
    Illegal(OrderStatus),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order, its items and its payment and takes the stock, all
    /// in one transaction.
    async fn create(&self, order: NewOrder) -> Result<Order>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    async fn list_all(&self) -> Result<Vec<Order>>;
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;
    /// Cancels the order (`Cancel` or `Expire`), restoring stock and
    /// rejecting the payment in one transaction.
    async fn cancel(&self, id: Uuid, action: OrderAction) -> Result<CancelOutcome>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Payment>>;
    async fn validation_data(&self, order_id: Uuid) -> Result<Option<PaymentValidationData>>;
    /// Records the proof and moves the order to WaitingConfirmation. Fails
    /// with `Conflict` if the order left Pending in the meantime.
    async fn submit_proof(&self, order_id: Uuid, proof_image: &str, amount_cents: i64) -> Result<Payment>;
    /// Applies an admin decision to a submitted payment and its order.
    async fn decide(
        &self,
        payment_id: Uuid,
        admin_id: Uuid,
        note: Option<String>,
        decision: PaymentDecision,
    ) -> Result<Payment>;
    /// Submitted payments, oldest submission first.
    async fn list_pending(&self) -> Result<Vec<Payment>>;
}

pub(crate) fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

/// `?, ?, ?` for an `IN (...)` clause with `n` binds.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
