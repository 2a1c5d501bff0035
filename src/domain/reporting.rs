//! Sales reporting
//!
//! [`SalesAggregator`] turns a batch of canonical [`SaleRecord`]s into a
//! per-product breakdown and a daily revenue series. It keeps no state between
//! calls; every report is recomputed from the records it is given.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::value_objects::ProductId;
use crate::{Result, StoreError};

/// One completed purchase of one product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: u32,
    /// Total revenue of this sale, not a unit price.
    pub revenue: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportBreakdownEntry {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyTrendPoint {
    pub date: NaiveDate,
    pub total_sales: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SalesReport {
    pub breakdown: Vec<ReportBreakdownEntry>,
    pub daily: Vec<DailyTrendPoint>,
    pub total_revenue: Decimal,
    pub record_count: usize,
}

/// Records with a product id group by id; records without one fall back to
/// the name, so two unrelated products sharing a name only merge when neither
/// carries an id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Id(ProductId),
    Name(String),
}

impl GroupKey {
    fn of(record: &SaleRecord) -> Self {
        match record.product_id {
            Some(id) => Self::Id(id),
            None => Self::Name(record.product_name.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SalesAggregator {
    offset: FixedOffset,
}

impl Default for SalesAggregator {
    fn default() -> Self { Self::utc() }
}

impl SalesAggregator {
    /// Days are cut at midnight in `offset`.
    pub fn new(offset: FixedOffset) -> Self { Self { offset } }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset { self.offset }

    pub fn date_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }

    /// Ordered by revenue, highest first; ties by product name.
    pub fn build_breakdown(&self, records: &[SaleRecord]) -> Result<Vec<ReportBreakdownEntry>> {
        let mut groups: BTreeMap<GroupKey, ReportBreakdownEntry> = BTreeMap::new();
        for record in records {
            let entry = groups.entry(GroupKey::of(record)).or_insert_with(|| ReportBreakdownEntry {
                product_id: record.product_id,
                product_name: record.product_name.clone(),
                total_quantity: 0,
                total_revenue: Decimal::ZERO,
            });
            entry.total_quantity = entry
                .total_quantity
                .checked_add(u64::from(record.quantity))
                .ok_or_else(|| StoreError::AmountOverflow(format!("quantity sold of {}", record.product_name)))?;
            entry.total_revenue = add_revenue(entry.total_revenue, record.revenue)?;
        }
        let mut breakdown: Vec<_> = groups.into_values().collect();
        breakdown.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue).then_with(|| a.product_name.cmp(&b.product_name)));
        Ok(breakdown)
    }

    /// One point per calendar day that has sales, oldest first.
    pub fn build_daily_trend(&self, records: &[SaleRecord]) -> Result<Vec<DailyTrendPoint>> {
        let mut days: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for record in records {
            let day = days.entry(self.date_of(record.timestamp)).or_insert(Decimal::ZERO);
            *day = add_revenue(*day, record.revenue)?;
        }
        Ok(days.into_iter().map(|(date, total_sales)| DailyTrendPoint { date, total_sales }).collect())
    }

    pub fn total_revenue(breakdown: &[ReportBreakdownEntry]) -> Result<Decimal> {
        breakdown.iter().try_fold(Decimal::ZERO, |total, e| add_revenue(total, e.total_revenue))
    }

    pub fn build_report(&self, records: &[SaleRecord]) -> Result<SalesReport> {
        let breakdown = self.build_breakdown(records)?;
        let total_revenue = Self::total_revenue(&breakdown)?;
        Ok(SalesReport { daily: self.build_daily_trend(records)?, breakdown, total_revenue, record_count: records.len() })
    }

    /// Fails when a report over `records` could leave the decimal range.
    /// Bounding the sum of magnitudes bounds every group and day total.
    pub fn ensure_reportable<'a>(records: impl IntoIterator<Item = &'a SaleRecord>) -> Result<()> {
        records.into_iter().try_fold(Decimal::ZERO, |total, r| add_revenue(total, r.revenue.abs()))?;
        Ok(())
    }
}

fn add_revenue(total: Decimal, revenue: Decimal) -> Result<Decimal> {
    total.checked_add(revenue).ok_or_else(|| StoreError::AmountOverflow(format!("revenue total {total} + {revenue}")))
}
