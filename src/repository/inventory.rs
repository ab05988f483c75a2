//! Stock movements tied to order line items.
//!
//! Every function here runs on a caller-supplied connection so it joins the
//! transaction of the order or payment write it belongs to.

use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(FromRow)]
struct ItemQuantityRow {
    product_id: String,
    quantity: i64,
}

/// Takes `quantity` units of a product. The `stock >= ?` guard lives in the
/// same statement, so two concurrent decrements can never overdraw.
pub async fn decrement_stock(conn: &mut SqliteConnection, product_id: Uuid, quantity: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?, updated_at = ?
        WHERE id = ? AND stock >= ?
        "#
    )
    .bind(quantity)
    .bind(chrono::Utc::now().naive_utc())
    .bind(product_id.to_string())
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::insufficient_stock(product_id));
    }

    Ok(())
}

pub async fn restore_stock(conn: &mut SqliteConnection, product_id: Uuid, quantity: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?, updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(quantity)
    .bind(chrono::Utc::now().naive_utc())
    .bind(product_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Gives back the stock of every line item of an order.
pub async fn restore_order_stock(conn: &mut SqliteConnection, order_id: Uuid) -> Result<()> {
    let items = sqlx::query_as::<_, ItemQuantityRow>(
        "SELECT product_id, quantity FROM order_items WHERE order_id = ?"
    )
    .bind(order_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    for item in items {
        let product_id = super::parse_id(&item.product_id)?;
        restore_stock(conn, product_id, item.quantity).await?;
        tracing::debug!(%order_id, %product_id, quantity = item.quantity, "Restored stock");
    }

    Ok(())
}
