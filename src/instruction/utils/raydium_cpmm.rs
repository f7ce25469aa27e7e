use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static SWAP_BASE_INPUT_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| anchor::discriminator("swap_base_input"));
pub static SWAP_BASE_OUTPUT_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| anchor::discriminator("swap_base_output"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const RAYDIUM_CPMM: Pubkey = pubkey!("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C");
    pub const AUTHORITY: Pubkey = pubkey!("GpMZbSM2GgvTKHJirzeGfMFoaZ8UR2X7F4v8vHTvxFbL");
}

/// `swap_base_input` account order, `(writable, signer)`.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (false, true),  // payer
    (false, false), // authority
    (false, false), // amm_config
    (true, false),  // pool_state
    (true, false),  // input_token_account
    (true, false),  // output_token_account
    (true, false),  // input_vault
    (true, false),  // output_vault
    (false, false), // input_token_program
    (false, false), // output_token_program
    (false, false), // input_token_mint
    (false, false), // output_token_mint
    (true, false),  // observation_state
];

pub mod idx {
    pub const PAYER: usize = 0;
    pub const USER_INPUT_ATA: usize = 4;
    pub const USER_OUTPUT_ATA: usize = 5;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBaseInputArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

pub fn swap_base_input_data(args: &SwapBaseInputArgs) -> Result<Vec<u8>> {
    let mut data = SWAP_BASE_INPUT_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_carries_anchor_discriminator() {
        let data = swap_base_input_data(&SwapBaseInputArgs {
            amount_in: 7,
            minimum_amount_out: 8,
        })
        .unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..8], &anchor::discriminator("swap_base_input"));
    }

    #[test]
    fn args_round_trip() {
        let args = SwapBaseInputArgs { amount_in: 11, minimum_amount_out: 12 };
        assert_eq!(
            SwapBaseInputArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(),
            args
        );
    }
}
