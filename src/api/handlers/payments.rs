use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Payment, VerifyPaymentRequest},
    error::{AppError, Result},
};

/// Multipart upload of a payment proof: `order_id` plus `proof_image`.
pub async fn submit_proof(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Payment>)> {
    let mut order_id: Option<Uuid> = None;
    let mut proof: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("order_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid order_id field: {}", e)))?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| AppError::Validation("order_id: must be a UUID".to_string()))?;
                order_id = Some(id);
            }
            Some("proof_image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read proof_image: {}", e)))?;
                proof = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let order_id = order_id
        .ok_or_else(|| AppError::Validation("order_id: is required".to_string()))?;
    let proof = proof
        .ok_or_else(|| AppError::Validation("proof_image: is required".to_string()))?;

    let payment = state.service_context.payment_service
        .submit_proof(order_id, current_user.user.id, &proof)
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

// Admin

pub async fn list_pending(State(state): State<AppState>) -> Result<Json<Vec<Payment>>> {
    let payments = state.service_context.payment_service
        .pending_payments()
        .await?;
    Ok(Json(payments))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>> {
    let payment = state.service_context.payment_service
        .get_payment(id)
        .await?;
    Ok(Json(payment))
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<VerifyPaymentRequest>>,
) -> Result<Json<Payment>> {
    let note = body.and_then(|Json(req)| req.note);
    let payment = state.service_context.payment_service
        .approve(id, current_user.user.id, note)
        .await?;
    Ok(Json(payment))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<VerifyPaymentRequest>>,
) -> Result<Json<Payment>> {
    let note = body.and_then(|Json(req)| req.note);
    let payment = state.service_context.payment_service
        .reject(id, current_user.user.id, note)
        .await?;
    Ok(Json(payment))
}
