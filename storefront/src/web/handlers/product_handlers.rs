// storefront/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::errors::AppError;
use crate::models::{Product, ProductFilter};
use crate::slug::decode_category_slug;
use crate::state::AppState;

/// Storefront shape of a product: the record plus the category's display name.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogProduct<'a> {
  #[serde(flatten)]
  product: &'a Product,
  category_name: String,
}

impl<'a> From<&'a Product> for CatalogProduct<'a> {
  fn from(product: &'a Product) -> Self {
    Self {
      product,
      category_name: decode_category_slug(&product.category_slug),
    }
  }
}

#[instrument(name = "handler::list_products", skip(app_state, query), fields(filter = ?query))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductFilter>,
) -> Result<HttpResponse, AppError> {
  let products = app_state.store.list_products(&query).await?;
  debug!(count = products.len(), "Catalog listed.");
  let listing: Vec<CatalogProduct<'_>> = products.iter().map(CatalogProduct::from).collect();
  Ok(HttpResponse::Ok().json(listing))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(slug = %path))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let slug = path.into_inner();
  let product = app_state
    .store
    .find_product_by_slug(&slug)
    .await?
    .filter(|p| p.is_active)
    .ok_or_else(|| AppError::NotFound(format!("Product '{}' not found", slug)))?;
  Ok(HttpResponse::Ok().json(CatalogProduct::from(&product)))
}
