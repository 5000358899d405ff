//! Amount Normalizer
//!
//! Parses user-entered decimal amounts into the integer magnitudes the
//! ledger accepts. Pure string and integer math - no floats, no locale
//! dependence: only ASCII digits and `.` are ever accepted.

use palisade_core::{AmountError, ScaledAmount};

use crate::constants::AssetConfig;

/// Parse and validate a user-entered amount for `asset`.
///
/// Returns the amount scaled to the asset's integer precision, flooring any
/// fractional digits beyond it. Validation failures never reach the gateway.
pub fn normalize(input: &str, asset: &AssetConfig) -> Result<ScaledAmount, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::EmptyOrNan);
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (body, ""),
    };

    // "." on its own, or a second '.' hiding in the fraction
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(AmountError::EmptyOrNan);
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AmountError::EmptyOrNan);
    }

    let max = asset.max_amount;
    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        // A value too large for u128 exceeds any configured ceiling
        int_part
            .parse()
            .map_err(|_| AmountError::ExceedsMaximum { max })?
    };

    let scale = asset.scale();
    let kept: String = frac_part
        .chars()
        .take(asset.decimals as usize)
        .collect();
    let frac_value: u128 = if kept.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", kept, width = asset.decimals as usize);
        padded.parse().unwrap_or(0)
    };

    let scaled = int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(AmountError::ExceedsMaximum { max })?;

    // Negative input, or a positive value that floors to zero at this
    // precision, is not a spendable amount
    if negative || scaled == 0 {
        return Err(AmountError::NonPositive);
    }

    if scaled > max as u128 * scale {
        return Err(AmountError::ExceedsMaximum { max });
    }

    Ok(scaled)
}

/// Render a scaled amount back to its canonical decimal string.
///
/// `normalize` is idempotent over this representation:
/// `normalize(&format_scaled(a, d), asset) == Ok(a)`.
pub fn format_scaled(amount: ScaledAmount, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let mut frac_str = format!("{:0width$}", frac, width = decimals as usize);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", whole, frac_str)
}
