//! Amount parsing for totals and line prices.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use super::patterns::AMOUNT_NOISE;

/// Parse a currency string such as `"$4.532,40"`, `"1,234.56"` or `"14691,00"`.
///
/// Everything but digits, commas and periods is dropped first. When both
/// separators appear the last one is the decimal separator. A lone comma is
/// decimal. Repeated periods, or a single period followed by exactly three
/// digits, are thousands separators.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned = AMOUNT_NOISE.replace_all(s, "");
    if cleaned.is_empty() {
        return None;
    }

    let has_comma = cleaned.contains(',');
    let has_dot = cleaned.contains('.');

    let normalized = if has_comma && has_dot {
        match (cleaned.rfind(','), cleaned.rfind('.')) {
            (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
            _ => cleaned.replace(',', ""),
        }
    } else if has_comma {
        if cleaned.matches(',').count() > 1 {
            cleaned.replace(',', "")
        } else {
            cleaned.replace(',', ".")
        }
    } else if has_dot {
        let dots = cleaned.matches('.').count();
        let fraction_len = cleaned.rsplit('.').next().map_or(0, str::len);
        if dots > 1 || fraction_len == 3 {
            cleaned.replace('.', "")
        } else {
            cleaned.into_owned()
        }
    } else {
        cleaned.into_owned()
    };

    Decimal::from_str(&normalized).ok()
}

/// Read an amount from a JSON value, rounded to cents and never negative.
///
/// Numbers are taken as-is; strings go through [`parse_amount`]. Anything
/// else, or an unparseable string, is `None`.
pub fn amount_from_json(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok()?,
        Value::String(s) => parse_amount(s)?,
        _ => return None,
    };

    Some(amount.round_dp(2).max(Decimal::ZERO))
}
