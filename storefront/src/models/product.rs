// storefront/src/models/product.rs

use crate::errors::{AppError, Result};
use crate::slug::generate_slug;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub slug: String,
  pub price: Decimal,
  pub sale_price: Option<Decimal>,
  pub short_description: Option<String>,
  pub description: Option<String>,
  pub brand: Option<String>,
  pub category: String,
  pub category_slug: String,
  pub images: Vec<String>,
  pub stock: i32,
  pub is_out_of_stock: bool,
  pub is_active: bool,
  pub is_todays_deal: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Admin input for a new product. Derived fields are not accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
  pub name: String,
  pub price: Decimal,
  #[serde(default)]
  pub sale_price: Option<Decimal>,
  #[serde(default)]
  pub short_description: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub brand: Option<String>,
  pub category: String,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub stock: i32,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default)]
  pub is_todays_deal: bool,
}

fn default_true() -> bool {
  true
}

/// Partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
  pub name: Option<String>,
  pub price: Option<Decimal>,
  pub sale_price: Option<Decimal>,
  pub short_description: Option<String>,
  pub description: Option<String>,
  pub brand: Option<String>,
  pub category: Option<String>,
  pub images: Option<Vec<String>>,
  pub stock: Option<i32>,
  pub is_active: Option<bool>,
  pub is_todays_deal: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
  pub brand: Option<String>,
  pub category: Option<String>,
  #[serde(alias = "isTodayDeal")]
  pub todays_deal: Option<bool>,
}

impl ProductFilter {
  /// Filter as applied to the public catalog (active products only).
  pub fn matches(&self, product: &Product) -> bool {
    if !product.is_active {
      return false;
    }
    if let Some(brand) = self.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
      if !product.brand.as_deref().is_some_and(|pb| pb.eq_ignore_ascii_case(brand)) {
        return false;
      }
    }
    if let Some(category) = self.category_slug() {
      if product.category_slug != category {
        return false;
      }
    }
    if self.todays_deal == Some(true) && !product.is_todays_deal {
      return false;
    }
    true
  }

  /// The requested category, accepted either as a slug or a display name.
  pub fn category_slug(&self) -> Option<String> {
    self
      .category
      .as_deref()
      .map(generate_slug)
      .filter(|slug| !slug.is_empty())
  }
}

impl Product {
  pub fn from_draft(draft: ProductDraft, now: DateTime<Utc>) -> Result<Self> {
    let mut product = Self {
      id: Uuid::new_v4(),
      name: draft.name.trim().to_string(),
      slug: String::new(),
      price: draft.price,
      sale_price: draft.sale_price,
      short_description: draft.short_description,
      description: draft.description,
      brand: normalize_brand(draft.brand),
      category: draft.category.trim().to_string(),
      category_slug: String::new(),
      images: draft.images,
      stock: draft.stock,
      is_out_of_stock: false,
      is_active: draft.is_active,
      is_todays_deal: draft.is_todays_deal,
      created_at: now,
      updated_at: now,
    };
    product.refresh_derived()?;
    Ok(product)
  }

  pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> Result<()> {
    if let Some(name) = patch.name {
      self.name = name.trim().to_string();
    }
    if let Some(price) = patch.price {
      self.price = price;
    }
    if patch.sale_price.is_some() {
      self.sale_price = patch.sale_price;
    }
    if patch.short_description.is_some() {
      self.short_description = patch.short_description;
    }
    if patch.description.is_some() {
      self.description = patch.description;
    }
    if patch.brand.is_some() {
      self.brand = normalize_brand(patch.brand);
    }
    if let Some(category) = patch.category {
      self.category = category.trim().to_string();
    }
    if let Some(images) = patch.images {
      self.images = images;
    }
    if let Some(stock) = patch.stock {
      self.stock = stock;
    }
    if let Some(is_active) = patch.is_active {
      self.is_active = is_active;
    }
    if let Some(is_todays_deal) = patch.is_todays_deal {
      self.is_todays_deal = is_todays_deal;
    }
    self.updated_at = now;
    self.refresh_derived()
  }

  fn refresh_derived(&mut self) -> Result<()> {
    if self.price < Decimal::ZERO {
      return Err(AppError::Validation("Price cannot be negative".to_string()));
    }
    if self.sale_price.is_some_and(|sale| sale < Decimal::ZERO) {
      return Err(AppError::Validation("Sale price cannot be negative".to_string()));
    }
    let slug = generate_slug(&self.name);
    if slug.is_empty() {
      return Err(AppError::Validation(
        "Product name must contain at least one letter or digit".to_string(),
      ));
    }
    let category_slug = generate_slug(&self.category);
    if category_slug.is_empty() {
      return Err(AppError::Validation("Product category is required".to_string()));
    }
    self.slug = slug;
    self.category_slug = category_slug;
    self.is_out_of_stock = self.stock <= 0;
    Ok(())
  }
}

fn normalize_brand(brand: Option<String>) -> Option<String> {
  brand.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())
}
