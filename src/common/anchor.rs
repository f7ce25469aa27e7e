use sha2::{Digest, Sha256};

/// First eight bytes of `SHA-256("global:<method>")`, the Anchor instruction
/// discriminator convention.
pub fn discriminator(method: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"global:");
    hasher.update(method.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_pumpfun_discriminators() {
        assert_eq!(discriminator("buy"), [102, 6, 61, 18, 1, 218, 235, 234]);
        assert_eq!(discriminator("sell"), [51, 230, 133, 164, 1, 127, 131, 173]);
    }
}
