use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    auth::AuthService,
    domain::{RegisterUserRequest, UpdateProfileRequest, User, UserRole},
    error::{AppError, Result},
    repository::{parse_id, utc, UserRepository},
};

// Database row struct that matches SQLite schema
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            id: parse_id(&row.id)?,
            email: row.email,
            full_name: row.full_name,
            role: UserRole::from_str(&row.role)
                .ok_or_else(|| AppError::Database(format!("Invalid user role: {}", row.role)))?,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, request: RegisterUserRequest, role: UserRole) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let password_hash = AuthService::hash_password(&request.password).await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.email.trim().to_lowercase())
        .bind(&request.full_name)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created user".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, role, created_at, updated_at
            FROM users
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, role, created_at, updated_at
            FROM users
            WHERE email = ?
            "#
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, full_name, role, created_at, updated_at, password_hash
            FROM users
            WHERE email = ?
            "#
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((Self::row_to_user(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    async fn update_profile(&self, id: Uuid, update: UpdateProfileRequest) -> Result<User> {
        let current = self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let email = update
            .email
            .map(|e| e.trim().to_lowercase())
            .unwrap_or(current.email);
        let full_name = update.full_name.unwrap_or(current.full_name);
        let password_hash = match update.password {
            Some(password) => Some(AuthService::hash_password(&password).await?),
            None => None,
        };

        sqlx::query(
            r#"
            UPDATE users
            SET email = ?,
                full_name = ?,
                password_hash = COALESCE(?, password_hash),
                updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(&email)
        .bind(&full_name)
        .bind(password_hash)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated user".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let orders = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;

        if orders > 0 {
            return Err(AppError::Conflict(
                "Accounts with order history cannot be deleted".to_string(),
            ));
        }

        // Sessions go with the user (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    AppError::Conflict("Accounts with order history cannot be deleted".to_string())
                }
                other => AppError::Database(other.to_string()),
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }
}
