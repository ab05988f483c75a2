pub mod catalog_service;
pub mod expiration;
pub mod order_service;
pub mod payment_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use crate::auth::AuthService;
use crate::config::Settings;
use crate::repository::*;
use crate::storage::{FileStorage, LocalFileStorage, PAYMENT_PROOFS};
use catalog_service::CatalogService;
use expiration::{ExpirationRegistry, ExpirationWorker, ExpiredOrder};
use order_service::OrderService;
use payment_service::PaymentService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub order_repo: Arc<dyn OrderRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub catalog_service: Arc<CatalogService>,
    pub order_service: Arc<OrderService>,
    pub payment_service: Arc<PaymentService>,
    pub expirations: Arc<ExpirationRegistry>,
    pub storage: Arc<dyn FileStorage>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Wires every repository and service against `db_pool`. The returned
    /// receiver must be handed to [`ServiceContext::spawn_expiration_worker`]
    /// or orders will never auto-cancel.
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
    ) -> (Self, mpsc::UnboundedReceiver<ExpiredOrder>) {
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
            settings.server.uploads_dir.clone(),
            PAYMENT_PROOFS,
            settings.server.max_upload_bytes,
        ));
        Self::with_storage(db_pool, settings, storage)
    }

    pub fn with_storage(
        db_pool: SqlitePool,
        settings: &Settings,
        storage: Arc<dyn FileStorage>,
    ) -> (Self, mpsc::UnboundedReceiver<ExpiredOrder>) {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let category_repo: Arc<dyn CategoryRepository> = Arc::new(SqliteCategoryRepository::new(db_pool.clone()));
        let product_repo: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(db_pool.clone()));
        let order_repo: Arc<dyn OrderRepository> = Arc::new(SqliteOrderRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            settings.auth.session_duration_hours,
        ));

        let (expirations, expired_rx) = ExpirationRegistry::new();

        let catalog_service = Arc::new(CatalogService::new(category_repo, product_repo));
        let order_service = Arc::new(OrderService::new(
            order_repo.clone(),
            payment_repo.clone(),
            catalog_service.clone(),
            expirations.clone(),
            settings.orders.payment_window(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            storage.clone(),
            expirations.clone(),
        ));

        let context = Self {
            user_repo,
            order_repo,
            payment_repo,
            auth_service,
            catalog_service,
            order_service,
            payment_service,
            expirations,
            storage,
            db_pool,
        };

        (context, expired_rx)
    }

    /// Starts the task that cancels orders whose timers fire.
    pub fn spawn_expiration_worker(
        &self,
        expired_rx: mpsc::UnboundedReceiver<ExpiredOrder>,
        settings: &Settings,
    ) -> tokio::task::JoinHandle<()> {
        let worker = ExpirationWorker::new(self.order_repo.clone(), settings.orders.expiration_timeout());
        tokio::spawn(worker.run(expired_rx))
    }
}
