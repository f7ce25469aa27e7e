use super::registry::DexFamily;
use super::TradeDirection;
use crate::constants::trade::MAX_LEADER_SLIPPAGE;
use crate::instruction::utils;

/// Bounds the leader packed into the real DEX instruction. Exactly one side
/// is populated per recognized layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderSwapArgs {
    /// Upper bound on what the leader pays (max-in style, PumpFun buys).
    pub max_in: Option<u64>,
    /// Lower bound on what the leader receives (min-out style).
    pub min_out: Option<u64>,
}

fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

fn has_discriminator(data: &[u8], discriminator: &[u8; 8]) -> bool {
    data.len() >= 8 && data[..8] == discriminator[..]
}

/// True when the payload starts with a discriminator this family is known to
/// use for swaps. Used by the classifier's layer-3 fallback when the log
/// stream carried no `Instruction:` line.
pub fn recognized(family: DexFamily, data: &[u8]) -> bool {
    decode_args(family, data).is_some()
}

/// Decodes the leader's declared bounds from the DEX instruction payload.
pub fn decode_args(family: DexFamily, data: &[u8]) -> Option<LeaderSwapArgs> {
    match family {
        DexFamily::PumpFun => {
            if has_discriminator(data, &utils::pumpfun::BUY_DISCRIMINATOR) {
                // (token_amount, max_sol_cost)
                Some(LeaderSwapArgs { max_in: read_u64_le(data, 16), min_out: None })
            } else if has_discriminator(data, &utils::pumpfun::SELL_DISCRIMINATOR) {
                // (token_amount, min_sol_output)
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::PumpFunAmm => {
            if has_discriminator(data, &utils::pumpswap::BUY_DISCRIMINATOR) {
                // (base_amount_out, max_quote_amount_in)
                Some(LeaderSwapArgs { max_in: read_u64_le(data, 16), min_out: None })
            } else if has_discriminator(data, &utils::pumpswap::SELL_DISCRIMINATOR) {
                // (base_amount_in, min_quote_amount_out)
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::RaydiumV4 => match data.first() {
            // (amount_in, minimum_amount_out)
            Some(&utils::raydium_amm_v4::SWAP_BASE_IN_DISCRIMINATOR) => {
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 9) })
            }
            // (max_amount_in, amount_out)
            Some(&utils::raydium_amm_v4::SWAP_BASE_OUT_DISCRIMINATOR) => {
                Some(LeaderSwapArgs { max_in: read_u64_le(data, 1), min_out: None })
            }
            _ => None,
        },
        DexFamily::RaydiumCpmm => {
            if has_discriminator(data, &utils::raydium_cpmm::SWAP_BASE_INPUT_DISCRIMINATOR) {
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else if has_discriminator(data, &utils::raydium_cpmm::SWAP_BASE_OUTPUT_DISCRIMINATOR)
            {
                Some(LeaderSwapArgs { max_in: read_u64_le(data, 8), min_out: None })
            } else {
                None
            }
        }
        DexFamily::RaydiumClmm => {
            if has_discriminator(data, &utils::raydium_clmm::SWAP_V2_DISCRIMINATOR)
                || has_discriminator(data, &utils::raydium_clmm::SWAP_DISCRIMINATOR)
            {
                // (amount, other_amount_threshold, ...)
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::RaydiumLaunchpad => {
            if has_discriminator(data, &utils::raydium_launchpad::BUY_EXACT_IN_DISCRIMINATOR)
                || has_discriminator(data, &utils::raydium_launchpad::SELL_EXACT_IN_DISCRIMINATOR)
            {
                // (amount_in, minimum_amount_out, share_fee_rate)
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::MeteoraDlmm => {
            if has_discriminator(data, &utils::meteora_dlmm::SWAP_DISCRIMINATOR) {
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::MeteoraDbc => {
            if has_discriminator(data, &utils::meteora_dbc::SWAP_DISCRIMINATOR) {
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::MeteoraDammV2 => {
            if has_discriminator(data, &utils::meteora_damm_v2::SWAP_DISCRIMINATOR) {
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::OrcaWhirlpool => {
            if has_discriminator(data, &utils::orca_whirlpool::SWAP_DISCRIMINATOR)
                || has_discriminator(data, &utils::orca_whirlpool::SWAP_V2_DISCRIMINATOR)
            {
                Some(LeaderSwapArgs { max_in: None, min_out: read_u64_le(data, 16) })
            } else {
                None
            }
        }
        DexFamily::Aggregator => None,
    }
}

/// Derives the leader's declared slippage in basis points.
///
/// Max-in layouts: `(max_in − actual_in) / max_in`. Min-out layouts:
/// `(actual_out − min_out) / actual_out`. Values outside `[0, 5000]` bps are
/// rejected so the follower's configured default applies.
pub fn derive_bps(
    args: LeaderSwapArgs,
    direction: TradeDirection,
    sol_moved: i128,
    token_out_delta: i128,
) -> Option<u64> {
    let bps = if let Some(max_in) = args.max_in {
        let actual_in = match direction {
            TradeDirection::Buy => sol_moved.unsigned_abs(),
            TradeDirection::Sell => return None,
        };
        if max_in == 0 || actual_in == 0 || actual_in as u128 > max_in as u128 {
            return None;
        }
        ((max_in as u128 - actual_in) * 10_000 / max_in as u128) as u64
    } else if let Some(min_out) = args.min_out {
        let actual_out = match direction {
            TradeDirection::Buy => token_out_delta.unsigned_abs(),
            TradeDirection::Sell => sol_moved.unsigned_abs(),
        };
        if actual_out == 0 || min_out as u128 > actual_out {
            return None;
        }
        ((actual_out - min_out as u128) * 10_000 / actual_out) as u64
    } else {
        return None;
    };
    (bps <= MAX_LEADER_SLIPPAGE).then_some(bps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pumpfun_buy_data(token_amount: u64, max_sol_cost: u64) -> Vec<u8> {
        let mut data = utils::pumpfun::BUY_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&token_amount.to_le_bytes());
        data.extend_from_slice(&max_sol_cost.to_le_bytes());
        data
    }

    #[test]
    fn decodes_pumpfun_buy_bounds() {
        let args = decode_args(DexFamily::PumpFun, &pumpfun_buy_data(0, 110_000_000)).unwrap();
        assert_eq!(args.max_in, Some(110_000_000));
        assert_eq!(args.min_out, None);
    }

    #[test]
    fn decodes_raydium_v4_swap_base_in() {
        let mut data = vec![9u8];
        data.extend_from_slice(&1_000u64.to_le_bytes());
        data.extend_from_slice(&950u64.to_le_bytes());
        let args = decode_args(DexFamily::RaydiumV4, &data).unwrap();
        assert_eq!(args.min_out, Some(950));
    }

    #[test]
    fn pumpfun_buy_slippage_from_max_sol_cost() {
        // Leader allowed 110 SOL-units, actually spent 100: 909 bps headroom.
        let args = LeaderSwapArgs { max_in: Some(110_000_000), min_out: None };
        let bps = derive_bps(args, TradeDirection::Buy, -100_000_000, 5_000).unwrap();
        assert_eq!(bps, 909);
    }

    #[test]
    fn min_out_slippage_for_sell() {
        let args = LeaderSwapArgs { max_in: None, min_out: Some(950) };
        let bps = derive_bps(args, TradeDirection::Sell, 1_000, -42).unwrap();
        assert_eq!(bps, 500);
    }

    #[test]
    fn out_of_range_slippage_is_rejected() {
        // 60% headroom is past the 5000 bps cap.
        let args = LeaderSwapArgs { max_in: None, min_out: Some(400) };
        assert_eq!(derive_bps(args, TradeDirection::Sell, 1_000, 0), None);
    }

    #[test]
    fn unrecognized_discriminator_is_not_a_swap() {
        assert!(!recognized(DexFamily::PumpFun, &[1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert!(recognized(DexFamily::PumpFun, &pumpfun_buy_data(1, 2)));
    }
}
