mod common;

use common::{setup, PNG};
use storefront::{
    domain::*,
    error::AppError,
};

#[tokio::test]
async fn test_order_approved_end_to_end() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("alice@example.com").await?;
    let admin = t.admin().await?;
    let product = t.product(5, 1_250).await?;

    let order = t.order(&customer, &product, 2).await?;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount_cents, 2_500);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].price_at_purchase_cents, 1_250);
    assert_eq!(t.stock_of(product.id).await?, 3);
    assert!(t.ctx.expirations.contains(order.id));

    let payment = order.payment.clone().expect("payment row exists from creation");
    assert_eq!(payment.status, PaymentStatus::Unpaid);
    assert_eq!(payment.amount_cents, 2_500);

    let submitted = t.ctx.payment_service.submit_proof(order.id, customer.id, PNG).await?;
    assert_eq!(submitted.status, PaymentStatus::Submitted);
    assert!(submitted.proof_image.is_some());
    assert!(submitted.submitted_at.is_some());
    assert!(!t.ctx.expirations.contains(order.id));

    let order = t.ctx.order_service.get_order(order.id, &customer).await?;
    assert_eq!(order.status, OrderStatus::WaitingConfirmation);

    let approved = t.ctx.payment_service
        .approve(submitted.id, admin.id, Some("Matches bank statement".to_string()))
        .await?;
    assert_eq!(approved.status, PaymentStatus::Approved);
    assert_eq!(approved.verified_by, Some(admin.id));
    assert_eq!(approved.admin_note.as_deref(), Some("Matches bank statement"));

    let order = t.ctx.order_service.get_order(order.id, &admin).await?;
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.confirmed_at.is_some());
    assert_eq!(t.stock_of(product.id).await?, 3);

    Ok(())
}

#[tokio::test]
async fn test_rejected_payment_cancels_and_restores_stock() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("bob@example.com").await?;
    let admin = t.admin().await?;
    let product = t.product(5, 900).await?;

    let order = t.order(&customer, &product, 2).await?;
    let submitted = t.ctx.payment_service.submit_proof(order.id, customer.id, PNG).await?;

    let rejected = t.ctx.payment_service.reject(submitted.id, admin.id, None).await?;
    assert_eq!(rejected.status, PaymentStatus::Rejected);
    assert!(rejected.verified_at.is_some());

    let order = t.ctx.order_service.get_order(order.id, &customer).await?;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.cancelled_at.is_some());
    assert_eq!(t.stock_of(product.id).await?, 5);

    // A decided payment cannot be decided again
    let err = t.ctx.payment_service.approve(submitted.id, admin.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.stock_of(product.id).await?, 5);

    Ok(())
}

#[tokio::test]
async fn test_insufficient_stock_leaves_nothing_behind() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("carol@example.com").await?;
    let product = t.product(1, 500).await?;

    let err = t.order(&customer, &product, 2).await.unwrap_err();
    let err = err.downcast::<AppError>()?;
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(t.count("orders").await?, 0);
    assert_eq!(t.count("order_items").await?, 0);
    assert_eq!(t.count("payments").await?, 0);
    assert_eq!(t.stock_of(product.id).await?, 1);
    assert!(t.ctx.expirations.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_cancel_twice_restores_stock_once() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("dan@example.com").await?;
    let product = t.product(4, 100).await?;

    let order = t.order(&customer, &product, 3).await?;
    assert_eq!(t.stock_of(product.id).await?, 1);

    let first = t.ctx.order_service.cancel_order(order.id).await?;
    assert_eq!(first.status, OrderStatus::Cancelled);
    assert_eq!(first.payment.map(|p| p.status), Some(PaymentStatus::Rejected));

    let second = t.ctx.order_service.cancel_order(order.id).await?;
    assert_eq!(second.status, OrderStatus::Cancelled);

    assert_eq!(t.stock_of(product.id).await?, 4);
    assert!(!t.ctx.expirations.contains(order.id));

    Ok(())
}

#[tokio::test]
async fn test_other_customers_cannot_see_order() -> anyhow::Result<()> {
    let t = setup().await?;
    let owner = t.customer("erin@example.com").await?;
    let stranger = t.customer("frank@example.com").await?;
    let admin = t.admin().await?;
    let product = t.product(3, 100).await?;

    let order = t.order(&owner, &product, 1).await?;

    let err = t.ctx.order_service.get_order(order.id, &stranger).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    assert!(t.ctx.order_service.get_order(order.id, &admin).await.is_ok());
    assert!(t.ctx.order_service.list_for_user(stranger.id).await?.is_empty());
    assert_eq!(t.ctx.order_service.list_for_user(owner.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_proof_rules_and_cleanup() -> anyhow::Result<()> {
    let t = setup().await?;
    let owner = t.customer("gina@example.com").await?;
    let stranger = t.customer("hank@example.com").await?;
    let product = t.product(3, 100).await?;
    let order = t.order(&owner, &product, 1).await?;

    let err = t.ctx.payment_service
        .submit_proof(order.id, stranger.id, PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = t.ctx.payment_service
        .submit_proof(uuid::Uuid::new_v4(), owner.id, PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = t.ctx.payment_service
        .submit_proof(order.id, owner.id, b"definitely not an image")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // None of the failed attempts left a file
    assert_eq!(t.stored_proofs(), 0);

    t.ctx.payment_service.submit_proof(order.id, owner.id, PNG).await?;
    assert_eq!(t.stored_proofs(), 1);

    // Paying twice is refused and the second upload is removed
    let err = t.ctx.payment_service
        .submit_proof(order.id, owner.id, PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.stored_proofs(), 1);

    Ok(())
}

#[tokio::test]
async fn test_admin_status_updates_follow_transition_table() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("ivy@example.com").await?;
    let admin = t.admin().await?;
    let product = t.product(10, 100).await?;
    let orders = &t.ctx.order_service;

    let order = t.order(&customer, &product, 2).await?;

    // Nothing to approve yet
    let err = orders.update_status(order.id, "confirmed", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = orders.update_status(order.id, "shipped", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = orders.update_status(order.id, "pending", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Only proof submission moves an order to WaitingConfirmation
    let err = orders.update_status(order.id, "waiting_confirmation", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let unchanged = orders.get_order(order.id, &admin).await?;
    assert_eq!(unchanged.status, OrderStatus::Pending);
    assert_eq!(unchanged.payment.map(|p| p.status), Some(PaymentStatus::Unpaid));

    let cancelled = orders.update_status(order.id, "Cancelled", admin.id).await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment.map(|p| p.status), Some(PaymentStatus::Rejected));
    assert_eq!(t.stock_of(product.id).await?, 10);
    assert!(!t.ctx.expirations.contains(order.id));

    let err = orders.update_status(order.id, "confirmed", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let second = t.order(&customer, &product, 1).await?;
    t.ctx.payment_service.submit_proof(second.id, customer.id, PNG).await?;
    assert_eq!(t.ctx.payment_service.pending_payments().await?.len(), 1);

    let confirmed = orders.update_status(second.id, "confirmed", admin.id).await?;
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    let payment = confirmed.payment.expect("confirmed order keeps its payment");
    assert_eq!(payment.status, PaymentStatus::Approved);
    assert_eq!(payment.verified_by, Some(admin.id));
    assert!(t.ctx.payment_service.pending_payments().await?.is_empty());

    let err = orders.update_status(second.id, "cancelled", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = orders.update_status(second.id, "confirmed", admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(t.stock_of(product.id).await?, 9);

    Ok(())
}

#[tokio::test]
async fn test_admin_cancel_of_submitted_order_rejects_payment() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("kim@example.com").await?;
    let admin = t.admin().await?;
    let product = t.product(4, 700).await?;

    let order = t.order(&customer, &product, 3).await?;
    t.ctx.payment_service.submit_proof(order.id, customer.id, PNG).await?;

    let cancelled = t.ctx.order_service
        .update_status(order.id, "cancelled", admin.id)
        .await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment.map(|p| p.status), Some(PaymentStatus::Rejected));
    assert!(t.ctx.payment_service.pending_payments().await?.is_empty());
    assert_eq!(t.stock_of(product.id).await?, 4);

    Ok(())
}

#[tokio::test]
async fn test_overpriced_product_is_rejected() -> anyhow::Result<()> {
    let t = setup().await?;
    let product = t.product(3, 1).await?;

    let err = t.ctx.catalog_service
        .update_product(product.id, UpdateProductRequest {
            price_cents: Some(i64::MAX / 2),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // The largest accepted price times the largest quantity still totals
    let customer = t.customer("max@example.com").await?;
    t.ctx.catalog_service
        .update_product(product.id, UpdateProductRequest {
            price_cents: Some(100_000_000_000),
            stock: Some(1_000),
            ..Default::default()
        })
        .await?;
    let order = t.order(&customer, &product, 1_000).await?;
    assert_eq!(order.total_amount_cents, 100_000_000_000_000);

    Ok(())
}

#[tokio::test]
async fn test_list_orders_by_status() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("jack@example.com").await?;
    let product = t.product(10, 100).await?;
    let orders = &t.ctx.order_service;

    let kept = t.order(&customer, &product, 1).await?;
    let dropped = t.order(&customer, &product, 1).await?;
    orders.cancel_order(dropped.id).await?;

    let pending = orders.list_by_status("pending").await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, kept.id);

    let cancelled = orders.list_by_status("Cancelled").await?;
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, dropped.id);

    assert_eq!(orders.list_all().await?.len(), 2);

    let err = orders.list_by_status("lost").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_inactive_product_cannot_be_ordered() -> anyhow::Result<()> {
    let t = setup().await?;
    let customer = t.customer("kate@example.com").await?;
    let product = t.product(10, 100).await?;

    t.ctx.catalog_service.update_product(product.id, UpdateProductRequest {
        status: Some(ProductStatus::Inactive),
        ..Default::default()
    }).await?;

    let err = t.order(&customer, &product, 1).await.unwrap_err();
    assert!(matches!(err.downcast::<AppError>()?, AppError::Conflict(_)));

    let err = t.ctx.order_service.create_order(customer.id, CreateOrderRequest {
        product_id: uuid::Uuid::new_v4(),
        quantity: 1,
        notes: None,
    }).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = t.ctx.order_service.create_order(customer.id, CreateOrderRequest {
        product_id: product.id,
        quantity: 0,
        notes: None,
    }).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}
