//! Oracle price conversions
//!
//! The price oracle quotes every listed asset in the pool's base currency
//! (ETH) at WAD precision. Pure math, no I/O.

use palisade_core::constants::WAD;

/// Convert a WAD-scaled magnitude to a float.
pub fn wad_to_f64(value: u128) -> f64 {
    value as f64 / WAD as f64
}

/// USD per ETH, derived as the reciprocal of the oracle's USDC-in-ETH quote.
///
/// Returns `None` for a zero quote.
pub fn usd_per_eth(usdc_price_in_eth_wad: u128) -> Option<f64> {
    let quote = wad_to_f64(usdc_price_in_eth_wad);
    if quote > 0.0 {
        Some(1.0 / quote)
    } else {
        None
    }
}

/// Value of a WAD-scaled ETH magnitude in USD at the given rate.
pub fn eth_value_in_usd(amount_wad: u128, usd_per_eth: f64) -> f64 {
    wad_to_f64(amount_wad) * usd_per_eth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_per_eth_reciprocal() {
        // 1 USDC = 0.0005 ETH  =>  1 ETH = 2000 USD
        let quote = WAD / 2000;
        assert_eq!(usd_per_eth(quote), Some(2000.0));
    }

    #[test]
    fn test_zero_quote_has_no_price() {
        assert_eq!(usd_per_eth(0), None);
    }

    #[test]
    fn test_eth_value_in_usd() {
        let amount = 3 * WAD / 2; // 1.5 ETH
        assert_eq!(eth_value_in_usd(amount, 2000.0), 3000.0);
    }
}
