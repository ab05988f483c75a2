mod common;

use std::time::Duration;
use chrono::Utc;
use common::{eventually, setup, setup_concurrent, PNG};
use storefront::{
    domain::*,
    error::AppError,
};

#[tokio::test]
async fn test_unpaid_order_expires_and_releases_stock() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("late@example.com").await?;
    let product = t.product(5, 700).await?;

    let order = t.order(&customer, &product, 2).await?;
    assert_eq!(t.stock_of(product.id).await?, 3);

    // Shorten the window instead of waiting two hours
    t.ctx.expirations.register(order.id, Utc::now() + chrono::Duration::milliseconds(50));

    let (ctx, order_id, owner) = (&t.ctx, order.id, &customer);
    let expired = eventually(move || async move {
        ctx.order_service
            .get_order(order_id, owner)
            .await
            .map(|o| o.status == OrderStatus::Cancelled)
            .unwrap_or(false)
    }).await;
    assert!(expired);

    let order = t.ctx.order_service.get_order(order.id, &customer).await?;
    assert_eq!(order.payment.map(|p| p.status), Some(PaymentStatus::Rejected));
    assert_eq!(t.stock_of(product.id).await?, 5);
    assert!(!t.ctx.expirations.contains(order.id));

    let err = t.ctx.payment_service
        .submit_proof(order.id, customer.id, PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.stored_proofs(), 0);

    Ok(())
}

#[tokio::test]
async fn test_submitted_order_is_not_expired() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("ontime@example.com").await?;
    let product = t.product(5, 700).await?;

    let order = t.order(&customer, &product, 1).await?;
    t.ctx.payment_service.submit_proof(order.id, customer.id, PNG).await?;

    // Even a stray timer cannot cancel an order that left Pending
    t.ctx.expirations.register(order.id, Utc::now());
    let (ctx, order_id) = (&t.ctx, order.id);
    let fired = eventually(move || async move { !ctx.expirations.contains(order_id) }).await;
    assert!(fired);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let order = t.ctx.order_service.get_order(order.id, &customer).await?;
    assert_eq!(order.status, OrderStatus::WaitingConfirmation);
    assert_eq!(t.stock_of(product.id).await?, 4);

    Ok(())
}

#[tokio::test]
async fn test_proof_racing_expiry_has_one_winner() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("racer@example.com").await?;
    let product = t.product(100, 100).await?;

    for _ in 0..10 {
        let order = t.order(&customer, &product, 2).await?;
        let stock_before = t.stock_of(product.id).await?;

        t.ctx.expirations.register(order.id, Utc::now());
        let submitted = t.ctx.payment_service.submit_proof(order.id, customer.id, PNG).await;

        let (ctx, order_id) = (&t.ctx, order.id);
        let settled = eventually(move || async move {
            !ctx.expirations.contains(order_id)
        }).await;
        assert!(settled);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let order = t.ctx.order_service.get_order(order.id, &customer).await?;
        let payment = order.payment.clone().expect("payment exists");

        match submitted {
            Ok(_) => {
                assert_eq!(order.status, OrderStatus::WaitingConfirmation);
                assert_eq!(payment.status, PaymentStatus::Submitted);
                assert_eq!(t.stock_of(product.id).await?, stock_before);
            }
            Err(AppError::Conflict(_)) => {
                assert_eq!(order.status, OrderStatus::Cancelled);
                assert_eq!(payment.status, PaymentStatus::Rejected);
                assert_eq!(t.stock_of(product.id).await?, stock_before + 2);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    Ok(())
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() -> anyhow::Result<()> {
    let t = setup_concurrent().await?;
    let customer = t.customer("rush@example.com").await?;
    let product = t.product(3, 100).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ctx = t.ctx.clone();
        let user_id = customer.id;
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            ctx.order_service.create_order(user_id, CreateOrderRequest {
                product_id,
                quantity: 1,
                notes: None,
            }).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => placed += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(t.stock_of(product.id).await?, 0);
    assert_eq!(t.count("orders").await?, 3);
    assert_eq!(t.count("payments").await?, 3);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_cancels_restore_once() -> anyhow::Result<()> {
    let t = setup_concurrent().await?;
    let customer = t.customer("twice@example.com").await?;
    let product = t.product(6, 100).await?;
    let order = t.order(&customer, &product, 4).await?;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let ctx = t.ctx.clone();
        let order_id = order.id;
        handles.push(tokio::spawn(async move {
            ctx.order_service.cancel_order(order_id).await
        }));
    }
    for handle in handles {
        let cancelled = handle.await??;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    assert_eq!(t.stock_of(product.id).await?, 6);

    Ok(())
}

#[tokio::test]
async fn test_pending_payments_oldest_first() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("queue@example.com").await?;
    let admin = t.admin().await?;
    let product = t.product(10, 100).await?;

    let mut orders = Vec::new();
    for _ in 0..3 {
        orders.push(t.order(&customer, &product, 1).await?);
    }

    let mut submitted = Vec::new();
    for index in [2, 0, 1] {
        let payment = t.ctx.payment_service
            .submit_proof(orders[index].id, customer.id, PNG)
            .await?;
        submitted.push(payment.id);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let queue: Vec<_> = t.ctx.payment_service
        .pending_payments()
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(queue, submitted);

    t.ctx.payment_service.approve(submitted[0], admin.id, None).await?;
    let queue = t.ctx.payment_service.pending_payments().await?;
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].id, submitted[1]);

    Ok(())
}
