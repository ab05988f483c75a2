use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(length(min = 1, max = 80))]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub slug: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "Active",
            ProductStatus::Inactive => "Inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(ProductStatus::Active),
            "Inactive" => Some(ProductStatus::Inactive),
            _ => None,
        }
    }
}

/// The slice of a product an order copies at purchase time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price_cents: i64,
    pub current_stock: i64,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            unit_price_cents: product.price_cents,
            current_stock: product.stock,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Derived from the name when absent.
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    pub description: Option<String>,
    // Caps price × quantity well inside i64 for any accepted quantity.
    #[validate(range(min = 0, max = 100_000_000_000i64, message = "must be between 0 and 100000000000"))]
    pub price_cents: i64,
    #[validate(range(min = 0))]
    pub stock: i64,
}

#[derive(Debug, Clone, Deserialize, Default, Validate)]
pub struct UpdateProductRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100_000_000_000i64, message = "must be between 0 and 100000000000"))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub stock: Option<i64>,
    pub status: Option<ProductStatus>,
}

/// Generate a URL-safe slug from a name
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Mechanical Keyboards"), "mechanical-keyboards");
        assert_eq!(slugify("  USB-C   Hubs  "), "usb-c-hubs");
        assert_eq!(slugify("Phones & Tablets!"), "phones-tablets");
    }

    #[test]
    fn test_price_is_capped() {
        let mut request = CreateProductRequest {
            category_id: Uuid::new_v4(),
            name: "Desk".to_string(),
            slug: None,
            sku: None,
            description: None,
            price_cents: 100_000_000_000i64,
            stock: 1,
        };
        assert!(request.validate().is_ok());

        request.price_cents = i64::MAX / 2;
        assert!(request.validate().is_err());

        // The largest order line still fits
        assert!(100_000_000_000i64.checked_mul(1000).is_some());
    }

    #[test]
    fn test_product_status_round_trip() {
        assert_eq!(ProductStatus::from_str("Active"), Some(ProductStatus::Active));
        assert_eq!(ProductStatus::Inactive.as_str(), "Inactive");
        assert_eq!(ProductStatus::from_str("active"), None);
    }
}
