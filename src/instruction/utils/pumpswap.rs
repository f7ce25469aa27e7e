use anyhow::Result;
use borsh::{BorshDeserialize, BorshSerialize};

/// Anchor `buy`/`sell`; same method names as the bonding curve, so the same
/// discriminator bytes.
pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    pub const PUMPFUN_AMM: Pubkey = pubkey!("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA");
}

/// Account order of the `buy`/`sell` instructions, `(writable, signer)`.
/// This is the program's IDL contract, not a choice.
pub const ACCOUNT_FLAGS: &[(bool, bool)] = &[
    (true, false),  // pool
    (true, true),   // user
    (false, false), // global_config
    (false, false), // base_mint
    (false, false), // quote_mint
    (true, false),  // user_base_token_account
    (true, false),  // user_quote_token_account
    (true, false),  // pool_base_token_account
    (true, false),  // pool_quote_token_account
    (false, false), // protocol_fee_recipient
    (true, false),  // protocol_fee_recipient_token_account
    (false, false), // base_token_program
    (false, false), // quote_token_program
    (false, false), // system_program
    (false, false), // associated_token_program
    (false, false), // event_authority
    (false, false), // program
    (true, false),  // coin_creator_vault_ata
    (false, false), // coin_creator_vault_authority
];

pub mod idx {
    pub const USER: usize = 1;
    pub const BASE_MINT: usize = 3;
    pub const QUOTE_MINT: usize = 4;
    pub const USER_BASE_ATA: usize = 5;
    pub const USER_QUOTE_ATA: usize = 6;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyArgs {
    pub base_amount_out: u64,
    pub max_quote_amount_in: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellArgs {
    pub base_amount_in: u64,
    pub min_quote_amount_out: u64,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_round_trip() {
        let args = BuyArgs { base_amount_out: 1, max_quote_amount_in: 2 };
        assert_eq!(BuyArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
        let args = SellArgs { base_amount_in: 3, min_quote_amount_out: 4 };
        assert_eq!(SellArgs::try_from_slice(&borsh::to_vec(&args).unwrap()).unwrap(), args);
    }

    #[test]
    fn instruction_data_length_and_discriminator() {
        let data = sell_instruction_data(&SellArgs {
            base_amount_in: 10,
            min_quote_amount_out: 20,
        })
        .unwrap();
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..8], &SELL_DISCRIMINATOR);
    }
}
