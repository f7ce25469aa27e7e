use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use once_cell::sync::Lazy;

use crate::common::anchor;

pub static SWAP_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| anchor::discriminator("swap"));

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const METEORA_DLMM: Pubkey = pubkey!("LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo");
}

/// `swap` fixed prefix, `(writable, signer)`. Remaining accounts are the bin
/// arrays crossed by the swap, all writable.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (true, false),  // lb_pair
    (false, false), // bin_array_bitmap_extension
    (true, false),  // reserve_x
    (true, false),  // reserve_y
    (true, false),  // user_token_in
    (true, false),  // user_token_out
    (false, false), // token_x_mint
    (false, false), // token_y_mint
    (true, false),  // oracle
    (true, false),  // host_fee_in
    (false, true),  // user
    (false, false), // token_x_program
    (false, false), // token_y_program
    (false, false), // event_authority
    (false, false), // program
];

pub mod idx {
    pub const USER_TOKEN_IN: usize = 4;
    pub const USER_TOKEN_OUT: usize = 5;
    pub const USER: usize = 10;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapArgs {
    pub amount_in: u64,
    pub min_amount_out: u64,
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
    fn swap_data_layout() {
        let data = swap_data(&SwapArgs { amount_in: 5, min_amount_out: 4 }).unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..8], &anchor::discriminator("swap"));
    }

    #[test]
    fn args_round_trip() {
        let args = SwapArgs { amount_in: 1, min_amount_out: 2 };
        assert_eq!(SwapArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }
}
