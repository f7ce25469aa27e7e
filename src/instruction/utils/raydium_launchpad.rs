use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static BUY_EXACT_IN_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| anchor::discriminator("buy_exact_in"));
pub static SELL_EXACT_IN_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| anchor::discriminator("sell_exact_in"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const RAYDIUM_LAUNCHPAD: Pubkey = pubkey!("LanMV9sAd7wArD4vJFi2qDdfnVhFxYSUg6eADduJ3uj");
}

/// `buy_exact_in`/`sell_exact_in` account order, `(writable, signer)`.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (false, true),  // payer
    (false, false), // authority
    (false, false), // global_config
    (false, false), // platform_config
    (true, false),  // pool_state
    (true, false),  // user_base_token
    (true, false),  // user_quote_token
    (true, false),  // base_vault
    (true, false),  // quote_vault
    (false, false), // base_token_mint
    (false, false), // quote_token_mint
    (false, false), // base_token_program
    (false, false), // quote_token_program
    (false, false), // event_authority
    (false, false), // program
];

pub mod idx {
    pub const PAYER: usize = 0;
    pub const USER_BASE_ATA: usize = 5;
    pub const USER_QUOTE_ATA: usize = 6;
    pub const BASE_MINT: usize = 9;
    pub const QUOTE_MINT: usize = 10;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactInArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
    pub share_fee_rate: u64,
}

pub fn buy_exact_in_data(args: &ExactInArgs) -> Result<Vec<u8>> {
    let mut data = BUY_EXACT_IN_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

pub fn sell_exact_in_data(args: &ExactInArgs) -> Result<Vec<u8>> {
    let mut data = SELL_EXACT_IN_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_in_layout() {
        let data = buy_exact_in_data(&ExactInArgs {
            amount_in: 1,
            minimum_amount_out: 2,
            share_fee_rate: 0,
        })
        .unwrap();
        assert_eq!(data.len(), 32);
        assert_eq!(&data[..8], &anchor::discriminator("buy_exact_in"));
    }

    #[test]
    fn args_round_trip() {
        let args = ExactInArgs { amount_in: 9, minimum_amount_out: 8, share_fee_rate: 7 };
        assert_eq!(ExactInArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }
}
