//! Sales feed ingestion
//!
//! Backends have reported sales in several loose JSON shapes: a flat
//! `product_name`, a camel-cased `productName`, a nested `product { id, name }`
//! or `Product { name }`, with revenue as `revenue`, `totalRevenue` or
//! `totalPrice`. Everything is normalized here into [`SaleRecord`] so the
//! aggregator never branches on shape.
//!
//! Missing or non-numeric fields are never read as zero. What happens to such
//! a record is decided once per deployment by [`MalformedPolicy`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::domain::reporting::SaleRecord;
use crate::domain::value_objects::ProductId;
use crate::{Result, StoreError};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// The first bad record aborts the batch.
    #[default]
    FailFast,
    /// Bad records are dropped and listed in [`IngestOutcome::rejected`].
    Skip,
}

impl FromStr for MalformedPolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "fail" => Ok(Self::FailFast),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown malformed-record policy `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rejection {
    pub index: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub records: Vec<SaleRecord>,
    pub rejected: Vec<Rejection>,
}

#[derive(Clone, Copy, Debug)]
pub struct SalesIngestor {
    policy: MalformedPolicy,
    offset: FixedOffset,
}

impl SalesIngestor {
    /// Timestamps without an offset are read as local time in `offset`.
    pub fn new(policy: MalformedPolicy, offset: FixedOffset) -> Self { Self { policy, offset } }

    pub fn policy(&self) -> MalformedPolicy { self.policy }

    pub fn ingest(&self, raw: &[Value]) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();
        for (index, value) in raw.iter().enumerate() {
            match self.normalize(value) {
                Ok(record) => outcome.records.push(record),
                Err(reason) => match self.policy {
                    MalformedPolicy::FailFast => return Err(StoreError::MalformedRecord { index, reason }),
                    MalformedPolicy::Skip => {
                        tracing::warn!(index, %reason, "skipping malformed sale record");
                        outcome.rejected.push(Rejection { index, reason });
                    }
                },
            }
        }
        Ok(outcome)
    }

    pub fn normalize(&self, raw: &Value) -> std::result::Result<SaleRecord, String> {
        if !raw.is_object() { return Err("record is not an object".into()); }

        let product_id = match lookup(raw, &["productId", "product_id"]).or_else(|| nested(raw, "id")) {
            Some(v) => Some(ProductId::new(as_count(v).map_err(|e| format!("product id {e}"))?)),
            None => None,
        };
        let product_name = match lookup(raw, &["product_name", "productName"]).or_else(|| nested(raw, "name")) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(other) if !other.is_string() => return Err(format!("product name is not text: {other}")),
            _ => match product_id {
                Some(id) => format!("Product #{id}"),
                None => return Err("missing product name and identifier".into()),
            },
        };

        let quantity = lookup(raw, &["quantity", "qty"]).ok_or("missing quantity")?;
        let quantity = as_count(quantity).map_err(|e| format!("quantity {e}"))?;
        let quantity = u32::try_from(quantity).map_err(|_| format!("quantity {quantity} out of range"))?;

        let revenue = match lookup(raw, &["revenue", "totalRevenue", "total_revenue", "totalPrice", "total_price"]) {
            Some(v) => as_decimal(v).map_err(|e| format!("revenue {e}"))?,
            None => {
                let unit = lookup(raw, &["unitPrice", "unit_price", "price"]).ok_or("missing revenue and unit price")?;
                let unit = as_decimal(unit).map_err(|e| format!("unit price {e}"))?;
                unit.checked_mul(Decimal::from(quantity)).ok_or_else(|| format!("revenue {unit} x {quantity} out of range"))?
            }
        };
        if revenue.is_sign_negative() && !revenue.is_zero() { return Err(format!("negative revenue {revenue}")); }

        let timestamp = lookup(raw, &["timestamp", "createdAt", "created_at", "date"]).ok_or("missing timestamp")?;
        let timestamp = self.parse_timestamp(timestamp)?;

        Ok(SaleRecord { product_id, product_name, quantity, revenue, timestamp })
    }

    fn parse_timestamp(&self, value: &Value) -> std::result::Result<DateTime<Utc>, String> {
        match value {
            Value::String(s) => {
                let s = s.trim();
                if let Ok(ts) = DateTime::parse_from_rfc3339(s) { return Ok(ts.with_timezone(&Utc)); }
                let naive = NAIVE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                    .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
                    .ok_or_else(|| format!("unparseable timestamp `{s}`"))?;
                self.offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|ts| ts.with_timezone(&Utc))
                    .ok_or_else(|| format!("ambiguous timestamp `{s}`"))
            }
            // epoch milliseconds, as a browser `Date.now()` produces
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| format!("unparseable timestamp `{n}`")),
            other => Err(format!("unparseable timestamp `{other}`")),
        }
    }
}

fn lookup<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| !v.is_null())
}

fn nested<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    lookup(raw, &["product", "Product"]).and_then(|p| p.get(key)).filter(|v| !v.is_null())
}

fn as_count(value: &Value) -> std::result::Result<u64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| format!("is not a non-negative integer: {value}"))
}

fn as_decimal(value: &Value) -> std::result::Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(format!("is not numeric: {value}")),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("is not numeric: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reporting::SalesAggregator;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn utc(policy: MalformedPolicy) -> SalesIngestor { SalesIngestor::new(policy, FixedOffset::east_opt(0).unwrap()) }

    #[test]
    fn test_normalizes_every_known_shape() {
        let raw = vec![
            json!({"product_name": "Controller", "quantity": 2, "revenue": 200, "timestamp": "2024-01-01T08:00:00Z"}),
            json!({"productName": "Controller", "quantity": "1", "totalRevenue": "100.50", "createdAt": "2024-01-01T09:00"}),
            json!({"product": {"id": 3, "name": "Headset"}, "quantity": 1, "totalPrice": 4500, "created_at": "2024-01-02 10:00:00"}),
            json!({"Product": {"name": "Mouse"}, "qty": 3, "unitPrice": 999.99, "date": "2024-01-03"}),
            json!({"productId": "7", "quantity": 1, "revenue": 1, "timestamp": 1704067200000_i64}),
        ];
        let outcome = utc(MalformedPolicy::FailFast).ingest(&raw).unwrap();
        assert_eq!(outcome.records.len(), 5);
        assert!(outcome.rejected.is_empty());

        let r = &outcome.records;
        assert_eq!(r[1].revenue, dec!(100.50));
        assert_eq!(r[2].product_id, Some(ProductId::new(3)));
        assert_eq!(r[3].revenue, dec!(2999.97));
        assert_eq!(r[4].product_name, "Product #7");
        assert_eq!(r[4].timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_supplied_revenue_wins_over_unit_price() {
        let raw = json!({"product_name": "A", "quantity": 2, "price": 100, "revenue": 150, "timestamp": "2024-01-01T00:00:00Z"});
        assert_eq!(utc(MalformedPolicy::FailFast).normalize(&raw).unwrap().revenue, dec!(150));
    }

    #[test]
    fn test_fail_fast_names_the_record() {
        let raw = vec![
            json!({"product_name": "A", "quantity": 1, "revenue": 1, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"product_name": "B", "quantity": "abc", "revenue": 1, "timestamp": "2024-01-01T00:00:00Z"}),
        ];
        match utc(MalformedPolicy::FailFast).ingest(&raw) {
            Err(StoreError::MalformedRecord { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("quantity"));
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_reports_and_continues() {
        let raw = vec![
            json!({"product_name": "A", "quantity": "abc", "revenue": 1, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"product_name": "B", "quantity": 2, "revenue": 20, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"quantity": 1, "revenue": 1, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"product_name": "C", "quantity": 1, "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"product_name": "D", "quantity": 1, "revenue": 1, "timestamp": "yesterday"}),
            json!("not a record"),
        ];
        let outcome = utc(MalformedPolicy::Skip).ingest(&raw).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.rejected.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 2, 3, 4, 5]);
    }

    #[test]
    fn test_revenue_out_of_range_is_malformed() {
        let raw = vec![
            json!({"product_name": "A", "quantity": 2, "unitPrice": "79228162514264337593543950335", "timestamp": "2024-01-01T00:00:00Z"}),
            json!({"product_name": "B", "quantity": 1, "unitPrice": "79228162514264337593543950335", "timestamp": "2024-01-01T00:00:00Z"}),
        ];
        let outcome = utc(MalformedPolicy::Skip).ingest(&raw).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.rejected[0].index, 0);
        assert!(outcome.rejected[0].reason.contains("out of range"));
        assert!(matches!(utc(MalformedPolicy::FailFast).ingest(&raw), Err(StoreError::MalformedRecord { index: 0, .. })));
    }

    #[test]
    fn test_zero_values_are_kept() {
        let raw = vec![json!({"product_name": "Free", "quantity": 0, "revenue": 0, "timestamp": "2024-01-01T00:00:00Z"})];
        let outcome = utc(MalformedPolicy::FailFast).ingest(&raw).unwrap();
        let report = SalesAggregator::utc().build_report(&outcome.records).unwrap();
        assert_eq!(report.breakdown.len(), 1);
        assert_eq!(report.daily.len(), 1);
    }

    #[test]
    fn test_naive_timestamps_use_the_report_offset() {
        let nairobi = SalesIngestor::new(MalformedPolicy::FailFast, FixedOffset::east_opt(3 * 3600).unwrap());
        let raw = json!({"product_name": "A", "quantity": 1, "revenue": 1, "timestamp": "2024-01-01T01:00"});
        let record = nairobi.normalize(&raw).unwrap();
        assert_eq!(record.timestamp, Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap());
        assert_eq!(SalesAggregator::new(nairobi.offset).date_of(record.timestamp), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("fail-fast".parse::<MalformedPolicy>().unwrap(), MalformedPolicy::FailFast);
        assert_eq!("SKIP".parse::<MalformedPolicy>().unwrap(), MalformedPolicy::Skip);
        assert!("ignore".parse::<MalformedPolicy>().is_err());
    }
}
