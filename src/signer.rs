use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

/// Signing capability, keyed by follower wallet. The engine never stores
/// private keys in plans or ledger state; it asks for a keypair at the
/// moment of signing, which keeps key custody a replaceable collaborator.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    async fn keypair_for(&self, follower: &Pubkey) -> Result<Arc<Keypair>>;
}

/// Environment-backed provider: `FOLLOWER_KEYS` is a comma-separated list of
/// base58 keypairs. Suitable for single-box deployments; production custody
/// implements the trait over a remote signer.
pub struct EnvSignerProvider {
    keys: HashMap<Pubkey, Arc<Keypair>>,
}

impl EnvSignerProvider {
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("FOLLOWER_KEYS").context("missing env var FOLLOWER_KEYS")?;
        let mut keys = HashMap::new();
        for (i, encoded) in raw.split(',').map(str::trim).filter(|s| !s.is_empty()).enumerate()
        {
            let bytes = bs58::decode(encoded)
                .into_vec()
                .with_context(|| format!("FOLLOWER_KEYS entry {} is not base58", i))?;
            let keypair = Keypair::from_bytes(&bytes)
                .with_context(|| format!("FOLLOWER_KEYS entry {} is not a keypair", i))?;
            keys.insert(keypair.pubkey(), Arc::new(keypair));
        }
        if keys.is_empty() {
            return Err(anyhow!("FOLLOWER_KEYS contains no keypairs"));
        }
        Ok(Self { keys })
    }

    pub fn wallets(&self) -> Vec<Pubkey> {
        self.keys.keys().copied().collect()
    }
}

#[async_trait]
impl SignerProvider for EnvSignerProvider {
    async fn keypair_for(&self, follower: &Pubkey) -> Result<Arc<Keypair>> {
        self.keys
            .get(follower)
            .cloned()
            .ok_or_else(|| anyhow!("no signing capability for follower {}", follower))
    }
}
