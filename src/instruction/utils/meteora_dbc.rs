use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static SWAP_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const METEORA_DBC: Pubkey = pubkey!("dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN");
}

/// Dynamic-bonding-curve `swap` account order, `(writable, signer)`.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (false, false), // pool_authority
    (false, false), // config
    (true, false),  // pool
    (true, false),  // input_token_account
    (true, false),  // output_token_account
    (true, false),  // base_vault
    (true, false),  // quote_vault
    (false, false), // base_mint
    (false, false), // quote_mint
    (false, true),  // payer
    (false, false), // token_base_program
    (false, false), // token_quote_program
    (true, false),  // referral_token_account
    (false, false), // event_authority
    (false, false), // program
];

pub mod idx {
    pub const USER_INPUT_ATA: usize = 3;
    pub const USER_OUTPUT_ATA: usize = 4;
    pub const PAYER: usize = 9;
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
        let args = SwapArgs { amount_in: 6, minimum_amount_out: 5 };
        assert_eq!(SwapArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }
}
