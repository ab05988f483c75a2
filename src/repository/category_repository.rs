use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{slugify, Category, CreateCategoryRequest, UpdateCategoryRequest},
    error::{AppError, Result},
    repository::{parse_id, utc, CategoryRepository},
};

#[derive(FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    slug: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteCategoryRepository {
    pool: SqlitePool,
}

impl SqliteCategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_category(row: CategoryRow) -> Result<Category> {
        Ok(Category {
            id: parse_id(&row.id)?,
            name: row.name,
            slug: row.slug,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }

    fn map_write_error(e: sqlx::Error, slug: &str) -> AppError {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Category slug '{}' already exists", slug))
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn create(&self, request: CreateCategoryRequest) -> Result<Category> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let slug = request
            .slug
            .as_deref()
            .map(slugify)
            .unwrap_or_else(|| slugify(&request.name));

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(&slug)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, &slug))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created category".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, created_at, updated_at FROM categories WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_category).transpose()
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, created_at, updated_at FROM categories ORDER BY name ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_category)
            .collect()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, created_at, updated_at FROM categories WHERE slug = ?"
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_category).transpose()
    }

    async fn update(&self, id: Uuid, update: UpdateCategoryRequest) -> Result<Category> {
        let current = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        // A rename keeps the old slug unless a new one is given.
        let name = update.name.unwrap_or(current.name);
        let slug = update.slug.as_deref().map(slugify).unwrap_or(current.slug);

        sqlx::query(
            r#"
            UPDATE categories
            SET name = ?, slug = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&name)
        .bind(&slug)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, &slug))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated category".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let products = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE category_id = ?"
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;

        if products > 0 {
            return Err(AppError::Conflict(format!(
                "Category still has {} product(s)",
                products
            )));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    AppError::Conflict("Category still has products".to_string())
                }
                other => AppError::Database(other.to_string()),
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category not found".to_string()));
        }

        Ok(())
    }
}
