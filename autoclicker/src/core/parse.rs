//! Parsers for the text the game surface renders.
//!
//! The surface only hands back display strings. Each parser either yields a
//! typed value or a [`SurfaceError::ReadFailure`] naming the element it came
//! from, so callers can keep the "treat as nothing this cycle" policy.

use crate::core::error::SurfaceError;
use crate::core::types::Budget;

/// Parse a grouped integer such as `"1,234,567"`.
pub fn parse_budget(target: &str, text: &str) -> Result<Budget, SurfaceError> {
    parse_grouped_int(text).ok_or_else(|| {
        SurfaceError::read(target, format!("not an integer amount: {:?}", text.trim()))
    })
}

/// Parse a store entry such as `"Grandma - 1,000\n3"` into description and price.
///
/// The price is the text between the first and second `-`, first line only.
pub fn parse_store_entry(target: &str, text: &str) -> Result<(String, Budget), SurfaceError> {
    let mut parts = text.split('-');
    let description = parts.next().unwrap_or_default().trim();
    let price_part = parts
        .next()
        .ok_or_else(|| SurfaceError::read(target, format!("missing price in {text:?}")))?;
    let price_line = price_part.lines().next().unwrap_or_default();
    let price = parse_grouped_int(price_line)
        .ok_or_else(|| SurfaceError::read(target, format!("bad price {:?}", price_line.trim())))?;
    Ok((description.to_string(), price))
}

/// Extract the value after the first `:` of a label such as `"per second : 1.5"`.
pub fn parse_rate(text: &str) -> Option<String> {
    text.split_once(':')
        .map(|(_, value)| value.trim().to_string())
}

fn parse_grouped_int(text: &str) -> Option<Budget> {
    let digits: String = text.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
