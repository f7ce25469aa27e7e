use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static SWAP_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap"));
pub static SWAP_V2_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap_v2"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const ORCA_WHIRLPOOL: Pubkey = pubkey!("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc");
}

/// `swap` account order, `(writable, signer)`.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (false, false), // token_program
    (false, true),  // token_authority
    (true, false),  // whirlpool
    (true, false),  // token_owner_account_a
    (true, false),  // token_vault_a
    (true, false),  // token_owner_account_b
    (true, false),  // token_vault_b
    (true, false),  // tick_array_0
    (true, false),  // tick_array_1
    (true, false),  // tick_array_2
    (false, false), // oracle
];

pub mod idx {
    pub const TOKEN_AUTHORITY: usize = 1;
    pub const TOKEN_OWNER_ACCOUNT_A: usize = 3;
    pub const TOKEN_OWNER_ACCOUNT_B: usize = 5;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapArgs {
    pub amount: u64,
    pub other_amount_threshold: u64,
    pub sqrt_price_limit: u128,
    pub amount_specified_is_input: bool,
    pub a_to_b: bool,
}

pub fn swap_data(args: &SwapArgs) -> Result<Vec<u8>> {
    let mut data = SWAP_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

/// Orientation and price limit mirrored from the leader's payload. The
/// follower swaps the same pool in the same direction, so both carry over.
pub fn decode_leader_swap(data: &[u8]) -> Option<SwapArgs> {
    if data.len() < 42 {
        return None;
    }
    SwapArgs::try_from_slice(&data[8..42]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_layout_and_leader_decode() {
        let args = SwapArgs {
            amount: 123,
            other_amount_threshold: 45,
            sqrt_price_limit: 99,
            amount_specified_is_input: true,
            a_to_b: false,
        };
        let data = swap_data(&args).unwrap();
        assert_eq!(data.len(), 42);
        assert_eq!(&data[..8], &anchor::discriminator("swap"));
        assert_eq!(decode_leader_swap(&data).unwrap(), args);
    }
}
