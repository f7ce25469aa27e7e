use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static SWAP_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const METEORA_DAMM_V2: Pubkey = pubkey!("cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG");
}

/// CP-AMM `swap` account order, `(writable, signer)`.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (false, false), // pool_authority
    (true, false),  // pool
    (true, false),  // input_token_account
    (true, false),  // output_token_account
    (true, false),  // token_a_vault
    (true, false),  // token_b_vault
    (false, false), // token_a_mint
    (false, false), // token_b_mint
    (false, true),  // payer
    (false, false), // token_a_program
    (false, false), // token_b_program
    (true, false),  // referral_token_account
    (false, false), // event_authority
    (false, false), // program
];

pub mod idx {
    pub const USER_INPUT_ATA: usize = 2;
    pub const USER_OUTPUT_ATA: usize = 3;
    pub const PAYER: usize = 8;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

pub fn swap_data(args: &SwapArgs) -> Result<Vec<u8>> {
    let mut data = SWAP_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_round_trip() {
        let args = SwapArgs { amount_in: 2, minimum_amount_out: 1 };
        assert_eq!(SwapArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }
}
