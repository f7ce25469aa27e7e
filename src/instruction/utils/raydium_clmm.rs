use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static SWAP_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap"));
pub static SWAP_V2_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap_v2"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const RAYDIUM_CLMM: Pubkey = pubkey!("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK");
}

/// `swap_v2` fixed prefix, `(writable, signer)`. Remaining accounts are the
/// tick arrays crossed by the swap, all writable.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (false, true),  // payer
    (false, false), // amm_config
    (true, false),  // pool_state
    (true, false),  // input_token_account
    (true, false),  // output_token_account
    (true, false),  // input_vault
    (true, false),  // output_vault
    (true, false),  // observation_state
    (false, false), // token_program
    (false, false), // token_program_2022
    (false, false), // memo_program
    (false, false), // input_vault_mint
    (false, false), // output_vault_mint
];

pub mod idx {
    pub const PAYER: usize = 0;
    pub const USER_INPUT_ATA: usize = 3;
    pub const USER_OUTPUT_ATA: usize = 4;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapV2Args {
    pub amount: u64,
    pub other_amount_threshold: u64,
    pub sqrt_price_limit_x64: u128,
    pub is_base_input: bool,
}

pub fn swap_v2_data(args: &SwapV2Args) -> Result<Vec<u8>> {
    let mut data = SWAP_V2_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

/// Price limit mirrored from the leader's payload; zero means "no limit".
pub fn leader_sqrt_price_limit(data: &[u8]) -> u128 {
    match data.get(24..40) {
        Some(bytes) => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(bytes);
            u128::from_le_bytes(raw)
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_v2_layout() {
        let data = swap_v2_data(&SwapV2Args {
            amount: 1,
            other_amount_threshold: 2,
            sqrt_price_limit_x64: 3,
            is_base_input: true,
        })
        .unwrap();
        // 8 disc + 8 + 8 + 16 + 1
        assert_eq!(data.len(), 41);
        assert_eq!(&data[..8], &anchor::discriminator("swap_v2"));
        assert_eq!(leader_sqrt_price_limit(&data), 3);
        assert_eq!(data[40], 1);
    }

    #[test]
    fn args_round_trip() {
        let args = SwapV2Args {
            amount: 10,
            other_amount_threshold: 20,
            sqrt_price_limit_x64: u128::MAX / 2,
            is_base_input: false,
        };
        assert_eq!(SwapV2Args::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }
}
