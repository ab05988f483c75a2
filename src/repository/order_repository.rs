use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Order, OrderAction, OrderItem, OrderStatus, PaymentStatus, ProductSnapshot},
    error::{AppError, Result},
    repository::{
        inventory, parse_id, payment_repository, placeholders, utc, CancelOutcome, OrderRepository,
    },
};

/// A line item about to be purchased, with the product fields frozen.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub price_at_purchase_cents: i64,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn from_snapshot(product: &ProductSnapshot, quantity: i64) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            product_sku: product.sku.clone(),
            price_at_purchase_cents: product.unit_price_cents,
            quantity,
        }
    }

    pub fn subtotal_cents(&self) -> Result<i64> {
        self.price_at_purchase_cents
            .checked_mul(self.quantity)
            .ok_or_else(|| AppError::Validation(format!(
                "quantity: total for {} is too large",
                self.product_name
            )))
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn total_cents(&self) -> Result<i64> {
        self.items.iter().try_fold(0i64, |total, item| {
            total
                .checked_add(item.subtotal_cents()?)
                .ok_or_else(|| AppError::Validation("Order total is too large".to_string()))
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    status: String,
    subtotal_cents: i64,
    total_amount_cents: i64,
    notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    confirmed_at: Option<NaiveDateTime>,
    cancelled_at: Option<NaiveDateTime>,
}

#[derive(FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
    product_name: String,
    product_sku: Option<String>,
    price_at_purchase_cents: i64,
    quantity: i64,
    subtotal_cents: i64,
    created_at: NaiveDateTime,
}

const ORDER_COLUMNS: &str = "id, user_id, status, subtotal_cents, total_amount_cents, notes, \
                             created_at, updated_at, confirmed_at, cancelled_at";

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: OrderRow) -> Result<Order> {
        Ok(Order {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            status: parse_order_status(&row.status)?,
            subtotal_cents: row.subtotal_cents,
            total_amount_cents: row.total_amount_cents,
            notes: row.notes,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
            confirmed_at: row.confirmed_at.map(utc),
            cancelled_at: row.cancelled_at.map(utc),
            items: Vec::new(),
            payment: None,
        })
    }

    fn row_to_item(row: OrderItemRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: parse_id(&row.id)?,
            order_id: parse_id(&row.order_id)?,
            product_id: parse_id(&row.product_id)?,
            product_name: row.product_name,
            product_sku: row.product_sku,
            price_at_purchase_cents: row.price_at_purchase_cents,
            quantity: row.quantity,
            subtotal_cents: row.subtotal_cents,
            created_at: utc(row.created_at),
        })
    }

    async fn with_details(&self, mut order: Order) -> Result<Order> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, product_sku,
                   price_at_purchase_cents, quantity, subtotal_cents, created_at
            FROM order_items
            WHERE order_id = ?
            ORDER BY created_at ASC
            "#
        )
        .bind(order.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        order.items = rows.into_iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;
        order.payment = payment_repository::fetch_by_order(&self.pool, order.id).await?;

        Ok(order)
    }

    async fn fetch_many(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.with_details(Self::row_to_order(row)?).await?);
        }
        Ok(orders)
    }
}

pub(crate) fn parse_order_status(s: &str) -> Result<OrderStatus> {
    match s {
        "Pending" => Ok(OrderStatus::Pending),
        "WaitingConfirmation" => Ok(OrderStatus::WaitingConfirmation),
        "Confirmed" => Ok(OrderStatus::Confirmed),
        "Cancelled" => Ok(OrderStatus::Cancelled),
        _ => Err(AppError::Database(format!("Invalid order status: {}", s))),
    }
}

/// Audit timestamp a status carries, if any.
fn timestamp_column(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Confirmed => Some("confirmed_at"),
        OrderStatus::Cancelled => Some("cancelled_at"),
        OrderStatus::Pending | OrderStatus::WaitingConfirmation => None,
    }
}

/// Moves an order along `action` if, and only if, its current status allows
/// it. The status check and the write are one statement, so whoever commits
/// first wins and the loser sees `false`.
pub(crate) async fn apply_transition(
    conn: &mut SqliteConnection,
    order_id: Uuid,
    action: OrderAction,
) -> Result<bool> {
    let sources = action.sources();
    let Some(target) = sources.first().and_then(|s| action.apply(*s)) else {
        return Ok(false);
    };

    let stamp = timestamp_column(target)
        .map(|column| format!(", {} = ?", column))
        .unwrap_or_default();
    let sql = format!(
        "UPDATE orders SET status = ?, updated_at = ?{} WHERE id = ? AND status IN ({})",
        stamp,
        placeholders(sources.len()),
    );

    let now = Utc::now().naive_utc();
    let mut query = sqlx::query(&sql).bind(target.as_str()).bind(now);
    if !stamp.is_empty() {
        query = query.bind(now);
    }
    query = query.bind(order_id.to_string());
    for source in &sources {
        query = query.bind(source.as_str());
    }

    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn current_status(conn: &mut SqliteConnection, order_id: Uuid) -> Result<Option<OrderStatus>> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM orders WHERE id = ?")
        .bind(order_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    status.as_deref().map(parse_order_status).transpose()
}

/// Cancels an order inside an open transaction: status flip, stock back,
/// payment rejected. Returns the status that blocked it when it could not.
pub(crate) async fn cancel_in_tx(
    conn: &mut SqliteConnection,
    order_id: Uuid,
    action: OrderAction,
) -> Result<std::result::Result<(), Option<OrderStatus>>> {
    if !apply_transition(conn, order_id, action).await? {
        return Ok(Err(current_status(conn, order_id).await?));
    }

    inventory::restore_order_stock(conn, order_id).await?;

    sqlx::query(
        r#"
        UPDATE payments
        SET status = ?, updated_at = ?
        WHERE order_id = ? AND status != ?
        "#
    )
    .bind(PaymentStatus::Rejected.as_str())
    .bind(Utc::now().naive_utc())
    .bind(order_id.to_string())
    .bind(PaymentStatus::Approved.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(Ok(()))
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        if order.items.is_empty() {
            return Err(AppError::BadRequest("An order needs at least one item".to_string()));
        }

        let order_id = Uuid::new_v4();
        let total = order.total_cents()?;
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status, subtotal_cents, total_amount_cents,
                notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(order_id.to_string())
        .bind(order.user_id.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(total)
        .bind(total)
        .bind(&order.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, product_sku,
                    price_at_purchase_cents, quantity, subtotal_cents, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(order_id.to_string())
            .bind(item.product_id.to_string())
            .bind(&item.product_name)
            .bind(&item.product_sku)
            .bind(item.price_at_purchase_cents)
            .bind(item.quantity)
            .bind(item.subtotal_cents()?)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // Dropping `tx` on error rolls back the order and items above.
            inventory::decrement_stock(&mut tx, item.product_id, item.quantity).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, status, amount_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(order_id.to_string())
        .bind(PaymentStatus::Unpaid.as_str())
        .bind(total)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(order_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created order".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            &format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(self.with_details(Self::row_to_order(r)?).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            &format!("SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC", ORDER_COLUMNS)
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        self.fetch_many(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            &format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS)
        )
        .fetch_all(&self.pool)
        .await?;

        self.fetch_many(rows).await
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            &format!("SELECT {} FROM orders WHERE status = ? ORDER BY created_at DESC", ORDER_COLUMNS)
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.fetch_many(rows).await
    }

    async fn cancel(&self, id: Uuid, action: OrderAction) -> Result<CancelOutcome> {
        let mut tx = self.pool.begin().await?;

        match cancel_in_tx(&mut tx, id, action).await? {
            Ok(()) => {
                tx.commit().await?;
                let order = self.find_by_id(id).await?.ok_or_else(|| {
                    AppError::Database("Failed to retrieve cancelled order".to_string())
                })?;
                Ok(CancelOutcome::Cancelled(order))
            }
            Err(None) => Err(AppError::NotFound("Order not found".to_string())),
            Err(Some(OrderStatus::Cancelled)) => {
                drop(tx);
                let order = self.find_by_id(id).await?
                    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
                Ok(CancelOutcome::AlreadyCancelled(order))
            }
            Err(Some(status)) => Ok(CancelOutcome::Illegal(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price_at_purchase_cents: i64, quantity: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: Uuid::new_v4(),
            product_name: "Lamp".to_string(),
            product_sku: None,
            price_at_purchase_cents,
            quantity,
        }
    }

    #[test]
    fn test_totals_sum_line_items() {
        let order = NewOrder {
            user_id: Uuid::new_v4(),
            notes: None,
            items: vec![item(1_250, 2), item(99, 3)],
        };
        assert_eq!(order.total_cents().unwrap(), 2_797);
    }

    #[test]
    fn test_overflowing_line_is_a_validation_error() {
        let err = item(i64::MAX / 2, 3).subtotal_cents().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let order = NewOrder {
            user_id: Uuid::new_v4(),
            notes: None,
            items: vec![item(i64::MAX / 2, 1), item(i64::MAX / 2, 1), item(10, 1)],
        };
        assert!(matches!(order.total_cents(), Err(AppError::Validation(_))));
    }
}
