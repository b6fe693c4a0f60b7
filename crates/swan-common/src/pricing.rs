use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};

use crate::error::{DealError, Result};

pub const BYTES_PER_GIB: u64 = 1 << 30;
/// Fr32 padding: 127 of every 128 piece bytes carry payload.
const PAYLOAD_BYTES: u64 = 127;
const PADDED_BYTES: u64 = 128;
/// Fractional digits kept in a rendered cost (attoFIL resolution).
pub const COST_SCALE: i64 = 18;

/// Parses a per-GiB price as an arbitrary-precision base-10 decimal.
pub fn parse_price(raw: &str) -> Result<BigDecimal> {
    let trimmed = raw.trim();
    let price = BigDecimal::from_str(trimmed)
        .map_err(|_| DealError::invalid(format!("price '{trimmed}' is not a decimal number")))?;
    if price < BigDecimal::zero() {
        return Err(DealError::invalid(format!(
            "price '{trimmed}' must not be negative"
        )));
    }
    Ok(price)
}

pub fn is_unsigned_integer(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Total price for a piece: `piece_size / 2^30 / 127 * 128 * price_per_gib`.
///
/// The product is formed exactly and divided once, so the only rounding is in
/// the quotient (100 significant digits) and the final 18-digit scale.
pub fn deal_cost(price_per_gib: &BigDecimal, piece_size: &str) -> Result<BigDecimal> {
    if !is_unsigned_integer(piece_size) {
        return Err(DealError::invalid(format!(
            "piece size '{piece_size}' is not an unsigned integer"
        )));
    }
    let size = BigDecimal::from_str(piece_size)
        .map_err(|_| DealError::invalid(format!("piece size '{piece_size}' is out of range")))?;

    let numerator = size * BigDecimal::from(PADDED_BYTES) * price_per_gib;
    if numerator.is_zero() {
        return Ok(BigDecimal::zero());
    }
    let denominator = BigDecimal::from(BYTES_PER_GIB) * BigDecimal::from(PAYLOAD_BYTES);
    let cost = numerator / denominator;
    Ok(cost
        .with_scale_round(COST_SCALE, RoundingMode::HalfEven)
        .normalized())
}

/// Renders a cost in plain notation without trailing zeros.
pub fn format_cost(cost: &BigDecimal) -> String {
    if cost.is_zero() {
        return "0".to_string();
    }
    cost.normalized().to_plain_string()
}
