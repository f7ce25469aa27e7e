pub const DEFAULT_CU_PRICE: u64 = 500_000;
pub const DEFAULT_SLIPPAGE: u64 = 1000; // 10%
pub const MAX_LEADER_SLIPPAGE: u64 = 5000;
pub const DEFAULT_BUY_TIP_LAMPORTS: u64 = 600_000;
pub const DEFAULT_SELL_TIP_LAMPORTS: u64 = 100_000;

/// Bounded deadlines for every outbound call. Nothing in the hot path may
/// block forever.
pub const RPC_TIMEOUT_MS: u64 = 2_000;
pub const HTTP_TIMEOUT_MS: u64 = 5_000;
pub const CONFIRM_TIMEOUT_MS: u64 = 30_000;

pub const BLOCKHASH_REFRESH_MS: u64 = 2_000;
pub const BLOCKHASH_TTL_MS: u64 = 5_000;
pub const CACHE_SWEEP_MS: u64 = 30_000;
pub const LEADER_REFRESH_MS: u64 = 180_000;
pub const VERDICT_TTL_MS: u64 = 30_000;

pub const ENDPOINT_STRIKE_LIMIT: u32 = 5;
pub const ENDPOINT_COOLING_MS: u64 = 30_000;

pub const SUBMIT_ATTEMPTS: u32 = 3;
pub const SUBMIT_BACKOFF_MS: u64 = 200;

pub const SHUTDOWN_GRACE_MS: u64 = 10_000;
