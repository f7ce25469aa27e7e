use anyhow::{anyhow, Result};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

/// `SHA-256("global:buy")[0..8]` / `SHA-256("global:sell")[0..8]`.
pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

/// Bonding-curve trade fee, basis points.
pub const FEE_BPS: u64 = 100;

pub mod seeds {
    pub const BONDING_CURVE: &[u8] = b"bonding-curve";
    pub const CREATOR_VAULT: &[u8] = b"creator-vault";
    pub const GLOBAL: &[u8] = b"global";
}

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const PUMPFUN: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");
    pub const GLOBAL_ACCOUNT: Pubkey = pubkey!("4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf");
    pub const FEE_RECIPIENT: Pubkey = pubkey!("CebN5WGQ4jvEPvsVU4EoHEpgzq1VV7AbicfhtW4xC9iM");
    pub const EVENT_AUTHORITY: Pubkey = pubkey!("Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1");
}

pub fn get_bonding_curve_pda(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[seeds::BONDING_CURVE, mint.as_ref()], &accounts::PUMPFUN).0
}

pub fn get_creator_vault_pda(creator: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[seeds::CREATOR_VAULT, creator.as_ref()], &accounts::PUMPFUN).0
}

pub fn get_global_pda() -> Pubkey {
    Pubkey::find_program_address(&[seeds::GLOBAL], &accounts::PUMPFUN).0
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyArgs {
    pub token_amount: u64,
    pub max_sol_cost: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellArgs {
    pub token_amount: u64,
    pub min_sol_output: u64,
}

pub fn buy_instruction_data(args: &BuyArgs) -> Result<Vec<u8>> {
    let mut data = BUY_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

pub fn sell_instruction_data(args: &SellArgs) -> Result<Vec<u8>> {
    let mut data = SELL_DISCRIMINATOR.to_vec();
    data.extend(borsh::to_vec(args)?);
    Ok(data)
}

/// On-chain bonding-curve state, after the 8-byte account discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveState {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
    pub creator: Pubkey,
}

impl BondingCurveState {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 81 {
            return Err(anyhow!("bonding curve account too short: {} bytes", data.len()));
        }
        let read_u64 = |offset: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[offset..offset + 8]);
            u64::from_le_bytes(raw)
        };
        let creator = Pubkey::try_from(&data[49..81])
            .map_err(|_| anyhow!("malformed creator key in bonding curve"))?;
        Ok(Self {
            virtual_token_reserves: read_u64(8),
            virtual_sol_reserves: read_u64(16),
            real_token_reserves: read_u64(24),
            real_sol_reserves: read_u64(32),
            token_total_supply: read_u64(40),
            complete: data[48] != 0,
            creator,
        })
    }

    /// SOL returned for selling `token_amount` into the curve, fee deducted.
    pub fn quote_sell(&self, token_amount: u64) -> u64 {
        if self.virtual_token_reserves == 0 {
            return 0;
        }
        let amount = token_amount as u128;
        let gross = amount * self.virtual_sol_reserves as u128
            / (self.virtual_token_reserves as u128 + amount);
        (gross - gross * FEE_BPS as u128 / 10_000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonding_curve_pda_is_deterministic() {
        let mint = Pubkey::new_unique();
        assert_eq!(get_bonding_curve_pda(&mint), get_bonding_curve_pda(&mint));
    }

    #[test]
    fn buy_data_layout_is_bit_exact() {
        let data =
            buy_instruction_data(&BuyArgs { token_amount: 0, max_sol_cost: 10_000_000 }).unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..8], &BUY_DISCRIMINATOR);
        assert_eq!(&data[8..16], &0u64.to_le_bytes());
        assert_eq!(&data[16..24], &10_000_000u64.to_le_bytes());
    }

    #[test]
    fn buy_args_round_trip() {
        let args = BuyArgs { token_amount: 42, max_sol_cost: 7_777 };
        let encoded = borsh::to_vec(&args).unwrap();
        assert_eq!(BuyArgs::try_from_slice(&encoded).unwrap(), args);
    }

    #[test]
    fn sell_args_round_trip() {
        let args = SellArgs { token_amount: 123_456, min_sol_output: 99 };
        let encoded = borsh::to_vec(&args).unwrap();
        assert_eq!(SellArgs::try_from_slice(&encoded).unwrap(), args);
    }

    #[test]
    fn bonding_curve_state_decodes_after_discriminator() {
        let creator = Pubkey::new_unique();
        let mut data = vec![0u8; 8];
        for value in [30_000_000u64, 85_000_000, 25_000_000, 0, 1_000_000_000] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.push(0);
        data.extend_from_slice(creator.as_ref());
        let state = BondingCurveState::decode(&data).unwrap();
        assert_eq!(state.virtual_token_reserves, 30_000_000);
        assert_eq!(state.virtual_sol_reserves, 85_000_000);
        assert!(!state.complete);
        assert_eq!(state.creator, creator);
    }

    #[test]
    fn sell_quote_applies_fee() {
        let state = BondingCurveState {
            virtual_token_reserves: 1_000_000,
            virtual_sol_reserves: 1_000_000,
            real_token_reserves: 0,
            real_sol_reserves: 0,
            token_total_supply: 0,
            complete: false,
            creator: Pubkey::new_unique(),
        };
        // 100k tokens into 1M/1M reserves: gross 90_909, minus 1% fee.
        let quote = state.quote_sell(100_000);
        assert_eq!(quote, 90_909 - 909);
    }
}
