use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{CategoryRepository, ProductRepository},
};

pub struct CatalogService {
    categories: Arc<dyn CategoryRepository>,
    products: Arc<dyn ProductRepository>,
}

impl CatalogService {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        products: Arc<dyn ProductRepository>,
    ) -> Self {
        Self { categories, products }
    }

    pub async fn create_category(&self, request: CreateCategoryRequest) -> Result<Category> {
        request.validate()?;
        self.categories.create(request).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.categories.list().await
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    pub async fn category_by_slug(&self, slug: &str) -> Result<Category> {
        self.categories
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    pub async fn update_category(&self, id: Uuid, request: UpdateCategoryRequest) -> Result<Category> {
        request.validate()?;
        self.categories.update(id, request).await
    }

    /// Refused while any product still belongs to the category.
    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        self.categories.delete(id).await?;
        tracing::info!(category_id = %id, "Deleted category");
        Ok(())
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> Result<Product> {
        request.validate()?;

        if self.categories.find_by_id(request.category_id).await?.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }

        let product = self.products.create(request).await?;
        tracing::info!(product_id = %product.id, stock = product.stock, "Created product");
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, request: UpdateProductRequest) -> Result<Product> {
        request.validate()?;

        if let Some(category_id) = request.category_id {
            if self.categories.find_by_id(category_id).await?.is_none() {
                return Err(AppError::NotFound("Category not found".to_string()));
            }
        }

        self.products.update(id, request).await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    pub async fn product_by_slug(&self, slug: &str) -> Result<Product> {
        self.products
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    }

    pub async fn list_products(&self, limit: i64, offset: i64) -> Result<Vec<Product>> {
        self.products.list(limit.clamp(1, 100), offset.max(0)).await
    }

    /// Active products in the category with this slug.
    pub async fn products_in_category(&self, slug: &str, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let category = self.category_by_slug(slug).await?;
        self.products
            .list_by_category(category.id, limit.clamp(1, 100), offset.max(0))
            .await
    }

    pub async fn products_by_status(&self, status: &str, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let status = match status.to_ascii_lowercase().as_str() {
            "active" => ProductStatus::Active,
            "inactive" => ProductStatus::Inactive,
            _ => return Err(AppError::Validation(format!("Unknown product status: {}", status))),
        };

        self.products
            .list_by_status(status, limit.clamp(1, 100), offset.max(0))
            .await
    }

    /// Products that appear on any order cannot be deleted, only deactivated.
    pub async fn delete_product(&self, id: Uuid) -> Result<()> {
        self.products.delete(id).await?;
        tracing::info!(product_id = %id, "Deleted product");
        Ok(())
    }

    /// Name, SKU, price and stock as they are right now, for an order to
    /// freeze. Inactive products cannot be bought.
    pub async fn product_snapshot(&self, id: Uuid) -> Result<ProductSnapshot> {
        let product = self.get_product(id).await?;

        if product.status != ProductStatus::Active {
            return Err(AppError::Conflict(format!(
                "Product {} is not available for purchase",
                product.name
            )));
        }

        Ok(ProductSnapshot::from(&product))
    }
}
