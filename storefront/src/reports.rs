// storefront/src/reports.rs

//! Back-office dashboard aggregates, computed from stored order snapshots.

use crate::errors::{AppError, Result};
use crate::models::{Order, OrderStatus};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub const DEFAULT_EARNINGS_RATE: Decimal = Decimal::from_parts(3, 0, 0, false, 1);
pub const TOP_PRODUCTS_LIMIT: usize = 5;
pub const RECENT_ORDERS_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
  /// The trailing seven days, by day.
  #[default]
  Week,
  /// Month to date, by day.
  Month,
  /// Year to date, by month.
  Year,
}

impl RevenuePeriod {
  pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
    let first_day = match self {
      RevenuePeriod::Week => return now - Duration::days(7),
      RevenuePeriod::Month => NaiveDate::from_ymd_opt(now.year(), now.month(), 1),
      RevenuePeriod::Year => NaiveDate::from_ymd_opt(now.year(), 1, 1),
    };
    first_day
      .and_then(|day| day.and_hms_opt(0, 0, 0))
      .map(|midnight| midnight.and_utc())
      .unwrap_or(now)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueQuery {
  #[serde(default)]
  pub filter: RevenuePeriod,
  #[serde(default)]
  pub earnings_rate: Option<Decimal>,
}

impl RevenueQuery {
  pub fn earnings_rate(&self) -> Result<Decimal> {
    match self.earnings_rate {
      None => Ok(DEFAULT_EARNINGS_RATE),
      Some(rate) if rate >= Decimal::ZERO && rate <= Decimal::ONE => Ok(rate),
      Some(rate) => Err(AppError::Validation(format!(
        "earningsRate must be between 0 and 1 (got {})",
        rate
      ))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
  pub time: String,
  pub revenue: Decimal,
  pub earnings: Decimal,
}

fn out_of_range() -> AppError {
  AppError::Internal("Report total is out of range".to_string())
}

/// Completed-order revenue between the period start and `now`, one point per
/// bucket that has sales, in time order.
pub fn revenue_series(
  orders: &[Order],
  period: RevenuePeriod,
  now: DateTime<Utc>,
  earnings_rate: Decimal,
) -> Result<Vec<RevenuePoint>> {
  let start = period.start(now);
  let mut buckets: BTreeMap<(i32, u32, u32), Decimal> = BTreeMap::new();
  for order in orders
    .iter()
    .filter(|o| o.status == OrderStatus::Completed && o.created_at >= start && o.created_at <= now)
  {
    let at = order.created_at;
    let day = if period == RevenuePeriod::Year { 0 } else { at.day() };
    let sum = buckets.entry((at.year(), at.month(), day)).or_insert(Decimal::ZERO);
    *sum = sum.checked_add(order.amount).ok_or_else(out_of_range)?;
  }

  buckets
    .into_iter()
    .map(|((_, month, day), revenue)| -> Result<RevenuePoint> {
      let time = match period {
        RevenuePeriod::Year => format!("Month {:02}", month),
        _ => format!("{:02}/{:02}", day, month),
      };
      let earnings = revenue.checked_mul(earnings_rate).ok_or_else(out_of_range)?.round_dp(2);
      Ok(RevenuePoint { time, revenue, earnings })
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
  pub name: String,
  pub price: Decimal,
  pub image: String,
  pub sales: i64,
  pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ProductKey {
  Catalog(Uuid),
  /// Lines recorded without a catalog reference group by name.
  Named(String),
}

/// Best sellers by units across orders that were not failed or cancelled.
/// Name, price and image come from the first snapshot seen, so pass orders
/// newest first to report current details.
pub fn top_products(orders: &[Order], limit: usize) -> Result<Vec<TopProduct>> {
  let mut totals: HashMap<ProductKey, TopProduct> = HashMap::new();
  let counted = orders
    .iter()
    .filter(|o| !matches!(o.status, OrderStatus::Failed | OrderStatus::Cancelled));
  for item in counted.flat_map(|o| o.items.iter()) {
    let key = match item.product_id {
      Some(id) => ProductKey::Catalog(id),
      None => ProductKey::Named(item.name.clone()),
    };
    let entry = totals.entry(key).or_insert_with(|| TopProduct {
      name: item.name.clone(),
      price: item.price,
      image: item.image.clone(),
      sales: 0,
      revenue: Decimal::ZERO,
    });
    entry.sales = entry.sales.checked_add(i64::from(item.qty)).ok_or_else(out_of_range)?;
  }

  let mut ranked = totals
    .into_values()
    .map(|mut product| -> Result<TopProduct> {
      product.revenue = product
        .price
        .checked_mul(Decimal::from(product.sales))
        .ok_or_else(out_of_range)?;
      Ok(product)
    })
    .collect::<Result<Vec<_>>>()?;
  ranked.sort_by(|a, b| {
    b.sales
      .cmp(&a.sales)
      .then_with(|| b.revenue.cmp(&a.revenue))
      .then_with(|| a.name.cmp(&b.name))
  });
  ranked.truncate(limit);
  Ok(ranked)
}
