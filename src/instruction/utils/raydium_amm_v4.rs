use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

pub const SWAP_BASE_IN_DISCRIMINATOR: u8 = 9;
pub const SWAP_BASE_OUT_DISCRIMINATOR: u8 = 11;

pub mod seeds {
    pub const AMM_ASSOCIATED_SEED: &[u8] = b"amm_associated_seed";
}

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const RAYDIUM_AMM_V4: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
    pub const AUTHORITY: Pubkey = pubkey!("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1");
}

/// Canonical bump-seeded pool address for a mint pair. Used as a cross-check
/// only; the executable account list is mirrored from the leader.
pub fn get_amm_pda(mint_a: &Pubkey, mint_b: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[seeds::AMM_ASSOCIATED_SEED, mint_a.as_ref(), mint_b.as_ref()],
        &accounts::RAYDIUM_AMM_V4,
    )
    .0
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBaseInArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

/// `[u8 discriminator=9][u64_le amount_in][u64_le minimum_amount_out]`
pub fn swap_base_in_data(args: &SwapBaseInArgs) -> Result<Vec<u8>> {
    let mut data = vec![SWAP_BASE_IN_DISCRIMINATOR];
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_base_in_layout() {
        let data = swap_base_in_data(&SwapBaseInArgs {
            amount_in: 1_000_000,
            minimum_amount_out: 990_000,
        })
        .unwrap();
        assert_eq!(data.len(), 17);
        assert_eq!(data[0], 9);
        assert_eq!(&data[1..9], &1_000_000u64.to_le_bytes());
        assert_eq!(&data[9..17], &990_000u64.to_le_bytes());
    }

    #[test]
    fn args_round_trip() {
        let args = SwapBaseInArgs { amount_in: 5, minimum_amount_out: 6 };
        assert_eq!(SwapBaseInArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }

    #[test]
    fn amm_pda_is_deterministic() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_eq!(get_amm_pda(&a, &b), get_amm_pda(&a, &b));
        assert_ne!(get_amm_pda(&a, &b), get_amm_pda(&b, &a));
    }
}
