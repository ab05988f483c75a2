use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{
        Category, CreateCategoryRequest, CreateProductRequest, Product,
        UpdateCategoryRequest, UpdateProductRequest,
    },
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.service_context.catalog_service
        .list_categories()
        .await?;
    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>> {
    let category = state.service_context.catalog_service
        .get_category(id)
        .await?;
    Ok(Json(category))
}

pub async fn get_category_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>> {
    let category = state.service_context.catalog_service
        .category_by_slug(&slug)
        .await?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.service_context.catalog_service
        .create_category(req)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Product>>> {
    let products = state.service_context.catalog_service
        .list_products(params.limit, params.offset)
        .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>> {
    let product = state.service_context.catalog_service
        .get_product(id)
        .await?;
    Ok(Json(product))
}

pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    let product = state.service_context.catalog_service
        .product_by_slug(&slug)
        .await?;
    Ok(Json(product))
}

pub async fn list_products_in_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Product>>> {
    let products = state.service_context.catalog_service
        .products_in_category(&slug, params.limit, params.offset)
        .await?;
    Ok(Json(products))
}

pub async fn list_products_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Product>>> {
    let products = state.service_context.catalog_service
        .products_by_status(&status, params.limit, params.offset)
        .await?;
    Ok(Json(products))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.service_context.catalog_service
        .create_product(req)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>> {
    let product = state.service_context.catalog_service
        .update_product(id, req)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.catalog_service
        .delete_product(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>> {
    let category = state.service_context.catalog_service
        .update_category(id, req)
        .await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.catalog_service
        .delete_category(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
