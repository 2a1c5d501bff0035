//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, StoreError};

/// Currency every amount defaults to when none is configured.
pub const DEFAULT_CURRENCY: &str = "KES";

/// Decimal places used when an amount is shown to a person.
pub const DISPLAY_SCALE: u32 = 2;

/// Stable catalog identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

impl ProductId {
    pub fn new(value: u64) -> Self { Self(value) }
    pub fn value(&self) -> u64 { self.0 }
    /// `None` once the id space is used up.
    pub fn next(&self) -> Option<Self> { self.0.checked_add(1).map(Self) }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<u64> for ProductId {
    fn from(value: u64) -> Self { Self(value) }
}

/// Money value object
///
/// Arithmetic is exact; rounding to [`DISPLAY_SCALE`] happens only in
/// [`Money::display`] and [`Money::rounded`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn kes(amount: Decimal) -> Self { Self::new(amount, DEFAULT_CURRENCY) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let amount = self.amount.checked_add(other.amount)
            .ok_or_else(|| StoreError::AmountOverflow(format!("{} + {}", self.amount, other.amount)))?;
        Ok(Money::new(amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Result<Money> {
        self.amount
            .checked_mul(Decimal::from(qty))
            .map(|amount| Money::new(amount, &self.currency))
            .ok_or_else(|| StoreError::AmountOverflow(format!("{} x {qty}", self.amount)))
    }

    pub fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(StoreError::CurrencyMismatch { expected: self.currency.clone(), actual: other.currency.clone() });
        }
        Ok(())
    }

    /// Amount rounded half away from zero to two places.
    pub fn rounded(&self) -> Decimal {
        let mut rounded = self.amount.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(DISPLAY_SCALE);
        rounded
    }

    /// Human-readable form, e.g. `KES 12,500.00`.
    pub fn display(&self) -> String { format!("{} {}", self.currency, group_thousands(&self.rounded().to_string())) }
}

impl Default for Money { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.display()) }
}

fn group_thousands(plain: &str) -> String {
    let (sign, unsigned) = match plain.strip_prefix('-') { Some(rest) => ("-", rest), None => ("", plain) };
    let (int_part, frac_part) = match unsigned.split_once('.') { Some((i, f)) => (i, Some(f)), None => (unsigned, None) };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 { grouped.push(','); }
        grouped.push(ch);
    }
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Strictly positive item count
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 { return Err(StoreError::InvalidQuantity(value)); }
        u32::try_from(value).map(Self).map_err(|_| StoreError::InvalidQuantity(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Result<Self> {
        self.0.checked_add(other.0).map(Self).ok_or(StoreError::InvalidQuantity(i64::from(self.0) + i64::from(other.0)))
    }
}

impl Default for Quantity { fn default() -> Self { Self::ONE } }

impl TryFrom<i64> for Quantity {
    type Error = StoreError;
    fn try_from(value: i64) -> Result<Self> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

/// Which catalog price the cart and checkout charge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingField {
    Price,
    #[default]
    ActualPrice,
}

impl FromStr for PricingField {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "actual_price" | "actualprice" => Ok(Self::ActualPrice),
            other => Err(format!("unknown pricing field `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_add() {
        let a = Money::kes(dec!(100));
        let b = Money::kes(dec!(50));
        assert_eq!(a.add(&b).unwrap().amount(), dec!(150));
    }

    #[test]
    fn test_money_currency_mismatch() {
        let err = Money::kes(dec!(1)).add(&Money::new(dec!(1), "USD")).unwrap_err();
        assert!(matches!(err, StoreError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_display_rounds_only_at_the_end() {
        let third = Money::kes(dec!(0.333));
        let sum = third.add(&third).unwrap().add(&third).unwrap();
        assert_eq!(sum.amount(), dec!(0.999));
        assert_eq!(sum.display(), "KES 1.00");
        assert_eq!(Money::kes(dec!(1234567.5)).display(), "KES 1,234,567.50");
        assert_eq!(Money::kes(dec!(-2500)).display(), "KES -2,500.00");
        assert_eq!(Money::kes(dec!(999)).display(), "KES 999.00");
    }

    #[test]
    fn test_quantity_rejects_non_positive() {
        assert!(matches!(Quantity::new(0), Err(StoreError::InvalidQuantity(0))));
        assert!(matches!(Quantity::new(-3), Err(StoreError::InvalidQuantity(-3))));
        assert_eq!(Quantity::new(4).unwrap().add(Quantity::ONE).unwrap().value(), 5);
    }

    #[test]
    fn test_quantity_add_does_not_saturate() {
        let big = Quantity::new(4_000_000_000).unwrap();
        assert!(matches!(big.add(big), Err(StoreError::InvalidQuantity(8_000_000_000))));
        assert!(Quantity::new(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_money_overflow_is_an_error() {
        let max = Money::kes(Decimal::MAX);
        assert!(matches!(max.multiply(2), Err(StoreError::AmountOverflow(_))));
        assert!(matches!(max.add(&Money::kes(dec!(1))), Err(StoreError::AmountOverflow(_))));
        assert_eq!(Money::kes(dec!(2.5)).multiply(4).unwrap().amount(), dec!(10.0));
    }

    #[test]
    fn test_product_id_next() {
        assert_eq!(ProductId::new(6).next(), Some(ProductId::new(7)));
        assert_eq!(ProductId::new(u64::MAX).next(), None);
    }

    #[test]
    fn test_pricing_field_parse() {
        assert_eq!("price".parse::<PricingField>().unwrap(), PricingField::Price);
        assert_eq!("actualPrice".parse::<PricingField>().unwrap(), PricingField::ActualPrice);
        assert!("msrp".parse::<PricingField>().is_err());
    }
}
