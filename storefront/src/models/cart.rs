// storefront/src/models/cart.rs

use crate::errors::{AppError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.png";

fn placeholder_image() -> String {
  PLACEHOLDER_IMAGE.to_string()
}

/// Snapshot of a product at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
  #[serde(default, alias = "_id")]
  pub product_id: Option<Uuid>,
  pub name: String,
  pub price: Decimal,
  #[serde(alias = "quantity")]
  pub qty: i32,
  #[serde(default = "placeholder_image")]
  pub image: String,
}

impl LineItem {
  /// `price × qty`, or `None` when the product does not fit a `Decimal`.
  pub fn line_total(&self) -> Option<Decimal> {
    self.price.checked_mul(Decimal::from(self.qty))
  }
}

/// Line-item aggregate. Items for the same product merge into one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
  items: Vec<LineItem>,
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_items(items: impl IntoIterator<Item = LineItem>) -> Result<Self> {
    let mut cart = Self::new();
    for item in items {
      cart.add(item)?;
    }
    Ok(cart)
  }

  pub fn add(&mut self, mut item: LineItem) -> Result<()> {
    if item.image.trim().is_empty() {
      item.image = placeholder_image();
    }
    let existing = item
      .product_id
      .and_then(|id| self.items.iter_mut().find(|line| line.product_id == Some(id)));
    match existing {
      Some(line) => {
        line.qty = line
          .qty
          .checked_add(item.qty)
          .ok_or_else(|| AppError::Validation(format!("Quantity for '{}' is too large", item.name)))?;
      }
      None => self.items.push(item),
    }
    Ok(())
  }

  pub fn subtotal(&self) -> Result<Decimal> {
    self.items.iter().try_fold(Decimal::ZERO, |sum, line| {
      line
        .line_total()
        .and_then(|total| sum.checked_add(total))
        .ok_or_else(|| AppError::Validation("Cart total is too large".to_string()))
    })
  }

  pub fn into_items(self) -> Vec<LineItem> {
    self.items
  }
}
