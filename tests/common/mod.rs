#![allow(dead_code)]

use std::{path::Path, sync::Arc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use storefront::{
    config::Settings,
    domain::*,
    repository::UserRepository,
    service::ServiceContext,
};
use tempfile::TempDir;

/// Smallest byte string the proof sniffing accepts as a PNG.
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

pub struct TestContext {
    pub ctx: Arc<ServiceContext>,
    pub pool: SqlitePool,
    pub settings: Settings,
    pub uploads: TempDir,
    // Keeps a file-backed database alive for the test's duration.
    _db_dir: Option<TempDir>,
}

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn setup() -> anyhow::Result<TestContext> {
    let pool = memory_pool().await?;
    build(pool, None).await
}

/// File-backed database so several connections can really run at once.
pub async fn setup_concurrent() -> anyhow::Result<TestContext> {
    let db_dir = tempfile::tempdir()?;
    let options = SqliteConnectOptions::new()
        .filename(db_dir.path().join("test.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    build(pool, Some(db_dir)).await
}

async fn build(pool: SqlitePool, db_dir: Option<TempDir>) -> anyhow::Result<TestContext> {
    let uploads = tempfile::tempdir()?;

    let mut settings = Settings::default();
    settings.server.uploads_dir = uploads.path().display().to_string();

    let (ctx, expired_rx) = ServiceContext::new(pool.clone(), &settings);
    let ctx = Arc::new(ctx);
    ctx.spawn_expiration_worker(expired_rx, &settings);

    Ok(TestContext {
        ctx,
        pool,
        settings,
        uploads,
        _db_dir: db_dir,
    })
}

impl TestContext {
    pub async fn customer(&self, email: &str) -> anyhow::Result<User> {
        self.user(email, UserRole::Customer).await
    }

    pub async fn admin(&self) -> anyhow::Result<User> {
        self.user("admin@storefront.test", UserRole::Admin).await
    }

    async fn user(&self, email: &str, role: UserRole) -> anyhow::Result<User> {
        let user = self.ctx.user_repo.create(RegisterUserRequest {
            email: email.to_string(),
            full_name: "Test User".to_string(),
            password: "password123".to_string(),
        }, role).await?;
        Ok(user)
    }

    pub async fn product(&self, stock: i64, price_cents: i64) -> anyhow::Result<Product> {
        let catalog = &self.ctx.catalog_service;

        let category = match catalog.list_categories().await?.into_iter().next() {
            Some(category) => category,
            None => catalog.create_category(CreateCategoryRequest {
                name: "General".to_string(),
                slug: None,
            }).await?,
        };

        let tag = uuid::Uuid::new_v4().simple();
        let product = catalog.create_product(CreateProductRequest {
            category_id: category.id,
            name: "Canvas Tote".to_string(),
            slug: Some(format!("canvas-tote-{}", tag)),
            sku: Some(format!("TOTE-{}", tag)),
            description: None,
            price_cents,
            stock,
        }).await?;
        Ok(product)
    }

    pub async fn stock_of(&self, product_id: uuid::Uuid) -> anyhow::Result<i64> {
        Ok(self.ctx.catalog_service.get_product(product_id).await?.stock)
    }

    pub async fn order(&self, user: &User, product: &Product, quantity: i64) -> anyhow::Result<Order> {
        let order = self.ctx.order_service.create_order(user.id, CreateOrderRequest {
            product_id: product.id,
            quantity,
            notes: None,
        }).await?;
        Ok(order)
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub fn stored_proofs(&self) -> usize {
        count_files(&self.uploads.path().join("payments"))
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}

/// Polls `check` until it holds or a couple of seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    false
}
