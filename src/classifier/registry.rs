use solana_sdk::{pubkey, pubkey::Pubkey};

/// Closed set of DEX families this engine can decode and rebuild.
///
/// Builders and the classifier share this tag; dispatch tables keyed on it
/// replace string-matching on platform names everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DexFamily {
    PumpFun,
    PumpFunAmm,
    RaydiumV4,
    RaydiumCpmm,
    RaydiumClmm,
    RaydiumLaunchpad,
    MeteoraDlmm,
    MeteoraDbc,
    MeteoraDammV2,
    OrcaWhirlpool,
    /// No native builder; the copy goes through the aggregator API.
    Aggregator,
}

impl DexFamily {
    pub const NATIVE: &'static [DexFamily] = &[
        DexFamily::PumpFun,
        DexFamily::PumpFunAmm,
        DexFamily::RaydiumV4,
        DexFamily::RaydiumCpmm,
        DexFamily::RaydiumClmm,
        DexFamily::RaydiumLaunchpad,
        DexFamily::MeteoraDlmm,
        DexFamily::MeteoraDbc,
        DexFamily::MeteoraDammV2,
        DexFamily::OrcaWhirlpool,
    ];

    pub fn program_id(&self) -> Pubkey {
        use crate::instruction::utils;
        match self {
            DexFamily::PumpFun => utils::pumpfun::accounts::PUMPFUN,
            DexFamily::PumpFunAmm => utils::pumpswap::accounts::PUMPFUN_AMM,
            DexFamily::RaydiumV4 => utils::raydium_amm_v4::accounts::RAYDIUM_AMM_V4,
            DexFamily::RaydiumCpmm => utils::raydium_cpmm::accounts::RAYDIUM_CPMM,
            DexFamily::RaydiumClmm => utils::raydium_clmm::accounts::RAYDIUM_CLMM,
            DexFamily::RaydiumLaunchpad => {
                utils::raydium_launchpad::accounts::RAYDIUM_LAUNCHPAD
            }
            DexFamily::MeteoraDlmm => utils::meteora_dlmm::accounts::METEORA_DLMM,
            DexFamily::MeteoraDbc => utils::meteora_dbc::accounts::METEORA_DBC,
            DexFamily::MeteoraDammV2 => utils::meteora_damm_v2::accounts::METEORA_DAMM_V2,
            DexFamily::OrcaWhirlpool => utils::orca_whirlpool::accounts::ORCA_WHIRLPOOL,
            DexFamily::Aggregator => Pubkey::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DexFamily::PumpFun => "pumpfun",
            DexFamily::PumpFunAmm => "pumpfun-amm",
            DexFamily::RaydiumV4 => "raydium-v4",
            DexFamily::RaydiumCpmm => "raydium-cpmm",
            DexFamily::RaydiumClmm => "raydium-clmm",
            DexFamily::RaydiumLaunchpad => "raydium-launchpad",
            DexFamily::MeteoraDlmm => "meteora-dlmm",
            DexFamily::MeteoraDbc => "meteora-dbc",
            DexFamily::MeteoraDammV2 => "meteora-damm-v2",
            DexFamily::OrcaWhirlpool => "orca-whirlpool",
            DexFamily::Aggregator => "aggregator",
        }
    }

    /// Compute-unit limit sized per family. Concentrated-liquidity swaps
    /// cross tick arrays and need far more compute than a bonding curve.
    pub fn compute_unit_limit(&self) -> u32 {
        match self {
            DexFamily::PumpFun => 400_000,
            DexFamily::PumpFunAmm
            | DexFamily::RaydiumV4
            | DexFamily::RaydiumCpmm
            | DexFamily::RaydiumLaunchpad
            | DexFamily::MeteoraDbc
            | DexFamily::MeteoraDammV2 => 600_000,
            DexFamily::MeteoraDlmm => 800_000,
            DexFamily::RaydiumClmm | DexFamily::OrcaWhirlpool => 1_400_000,
            DexFamily::Aggregator => 1_400_000,
        }
    }
}

impl std::fmt::Display for DexFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn dex_by_program(program: &Pubkey) -> Option<DexFamily> {
    DexFamily::NATIVE.iter().copied().find(|family| family.program_id() == *program)
}

/// On-chain routers that wrap or chain calls into the real DEX. The router is
/// attribution only; the inner DEX program decides which builder runs.
pub const ROUTERS: &[(Pubkey, &str)] = &[
    (pubkey!("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4"), "Jupiter"),
    (pubkey!("JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB"), "JupiterV4"),
    (pubkey!("6m2CDdhRgxpH4WjvdzxAYbGxwdGUz5MziiL5jek2kBma"), "OKX"),
];

pub fn router_by_program(program: &Pubkey) -> Option<&'static str> {
    ROUTERS.iter().find(|(id, _)| id == program).map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_native_family_maps_back_from_its_program() {
        for family in DexFamily::NATIVE {
            assert_eq!(dex_by_program(&family.program_id()), Some(*family));
        }
    }

    #[test]
    fn routers_are_not_dexes() {
        for (program, _) in ROUTERS {
            assert!(dex_by_program(program).is_none());
        }
    }
}
