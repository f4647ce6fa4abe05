// src/dex/math.rs
//! Constant-product pool math in integer arithmetic.

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Output for `amount_in` after the pool fee, rounded down.
pub fn amount_out(amount_in: u64, reserve_in: u64, reserve_out: u64, fee_bps: u16) -> Option<u64> {
    if reserve_in == 0 || reserve_out == 0 || fee_bps as u64 >= BPS_DENOMINATOR {
        return None;
    }
    let in_after_fee =
        amount_in as u128 * (BPS_DENOMINATOR - fee_bps as u64) as u128 / BPS_DENOMINATOR as u128;
    let out = in_after_fee * reserve_out as u128 / (reserve_in as u128 + in_after_fee);
    u64::try_from(out).ok()
}

/// Gross input required to receive exactly `amount_out`, rounded up.
/// `None` when the pool cannot supply that much.
pub fn amount_in(amount_out: u64, reserve_in: u64, reserve_out: u64, fee_bps: u16) -> Option<u64> {
    if reserve_in == 0 || amount_out >= reserve_out || fee_bps as u64 >= BPS_DENOMINATOR {
        return None;
    }
    let net_in = (reserve_in as u128 * amount_out as u128)
        .div_ceil((reserve_out - amount_out) as u128);
    let gross = net_in
        .checked_mul(BPS_DENOMINATOR as u128)?
        .div_ceil((BPS_DENOMINATOR - fee_bps as u64) as u128);
    u64::try_from(gross).ok()
}

/// Lowest acceptable output under `slippage_bps`.
pub fn min_out_with_slippage(amount: u64, slippage_bps: u16) -> u64 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps as u64);
    (amount as u128 * keep as u128 / BPS_DENOMINATOR as u128) as u64
}

/// Highest acceptable input under `slippage_bps`.
pub fn max_in_with_slippage(amount: u64, slippage_bps: u16) -> u64 {
    let allowed = (amount as u128 * (BPS_DENOMINATOR + slippage_bps as u64) as u128)
        .div_ceil(BPS_DENOMINATOR as u128);
    u64::try_from(allowed).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_out_net_of_fee() {
        assert_eq!(amount_out(1_000, 1_000_000, 1_000_000, 30), Some(996));
        assert_eq!(amount_out(1_000, 1_000_000, 1_000_000, 0), Some(999));
        assert_eq!(amount_out(1_000, 0, 1_000_000, 30), None);
    }

    #[test]
    fn test_amount_in_inverts_amount_out() {
        assert_eq!(amount_in(996, 1_000_000, 1_000_000, 30), Some(1_000));
        assert_eq!(amount_in(1_000_000, 1_000_000, 1_000_000, 30), None);
    }

    #[test]
    fn test_large_reserves_do_not_overflow() {
        let out = amount_out(u64::MAX / 2, u64::MAX / 2, u64::MAX / 2, 25).unwrap();
        assert!(out < u64::MAX / 2);
    }

    #[test]
    fn test_slippage_bounds() {
        assert_eq!(min_out_with_slippage(10_000, 50), 9_950);
        assert_eq!(max_in_with_slippage(10_000, 50), 10_050);
        assert_eq!(max_in_with_slippage(1, 1), 2);
    }
}
