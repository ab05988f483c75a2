use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{slugify, CreateProductRequest, Product, ProductStatus, UpdateProductRequest},
    error::{AppError, Result},
    repository::{parse_id, utc, ProductRepository},
};

#[derive(FromRow)]
struct ProductRow {
    id: String,
    category_id: String,
    name: String,
    slug: String,
    sku: Option<String>,
    description: Option<String>,
    price_cents: i64,
    stock: i64,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PRODUCT_COLUMNS: &str = "id, category_id, name, slug, sku, description, \
                               price_cents, stock, status, created_at, updated_at";

pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: ProductRow) -> Result<Product> {
        Ok(Product {
            id: parse_id(&row.id)?,
            category_id: parse_id(&row.category_id)?,
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            description: row.description,
            price_cents: row.price_cents,
            stock: row.stock,
            status: ProductStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid product status: {}", row.status)))?,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }

    fn map_write_error(e: sqlx::Error) -> AppError {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("A product with this slug or SKU already exists".to_string())
            }
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                AppError::BadRequest("Unknown category".to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }

    fn collect(rows: Vec<ProductRow>) -> Result<Vec<Product>> {
        rows.into_iter()
            .map(Self::row_to_product)
            .collect()
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn create(&self, request: CreateProductRequest) -> Result<Product> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let slug = request
            .slug
            .as_deref()
            .map(slugify)
            .unwrap_or_else(|| slugify(&request.name));

        sqlx::query(
            r#"
            INSERT INTO products (
                id, category_id, name, slug, sku, description,
                price_cents, stock, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.category_id.to_string())
        .bind(&request.name)
        .bind(&slug)
        .bind(&request.sku)
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.stock)
        .bind(ProductStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Self::map_write_error)?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created product".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            &format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            &format!("SELECT {} FROM products WHERE slug = ?", PRODUCT_COLUMNS)
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Product>> {
        self.list_by_status(ProductStatus::Active, limit, offset).await
    }

    async fn list_by_category(&self, category_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            &format!(
                "SELECT {} FROM products WHERE category_id = ? AND status = ? \
                 ORDER BY created_at DESC LIMIT ? OFFSET ?",
                PRODUCT_COLUMNS
            )
        )
        .bind(category_id.to_string())
        .bind(ProductStatus::Active.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Self::collect(rows)
    }

    async fn list_by_status(&self, status: ProductStatus, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            &format!(
                "SELECT {} FROM products WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                PRODUCT_COLUMNS
            )
        )
        .bind(status.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Self::collect(rows)
    }

    async fn update(&self, id: Uuid, update: UpdateProductRequest) -> Result<Product> {
        let current = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let category_id = update.category_id.unwrap_or(current.category_id);
        let name = update.name.unwrap_or(current.name);
        let slug = update.slug.as_deref().map(slugify).unwrap_or(current.slug);
        let description = update.description.or(current.description);
        let price_cents = update.price_cents.unwrap_or(current.price_cents);
        let status = update.status.unwrap_or(current.status);

        // Stock is only overwritten when the caller sends it; the ledger owns
        // every other change to it.
        sqlx::query(
            r#"
            UPDATE products
            SET category_id = ?,
                name = ?,
                slug = ?,
                description = ?,
                price_cents = ?,
                stock = COALESCE(?, stock),
                status = ?,
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(category_id.to_string())
        .bind(&name)
        .bind(&slug)
        .bind(&description)
        .bind(price_cents)
        .bind(update.stock)
        .bind(status.as_str())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Self::map_write_error)?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated product".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Delete first so the transaction holds the write lock; an order
        // line inserted concurrently then either precedes us (FK error) or
        // fails its own FK check.
        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE id = ?
              AND NOT EXISTS (SELECT 1 FROM order_items WHERE product_id = ?)
            "#
        )
        .bind(id.to_string())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                AppError::Conflict("Product has been ordered and cannot be deleted".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE id = ?")
                .bind(id.to_string())
                .fetch_one(&mut *tx)
                .await?;

            return if exists > 0 {
                Err(AppError::Conflict(
                    "Product has been ordered and cannot be deleted; deactivate it instead".to_string(),
                ))
            } else {
                Err(AppError::NotFound("Product not found".to_string()))
            };
        }

        tx.commit().await?;
        Ok(())
    }
}
