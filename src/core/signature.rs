use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Digest used for a webhook signature header (`<algo>=<hex>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha256,
}

impl Algorithm {
    #[cfg(test)]
    pub fn prefix(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha1" => Some(Algorithm::Sha1),
            "sha256" => Some(Algorithm::Sha256),
            _ => None,
        }
    }
}

/// Verify a GitHub-style signature header against the raw request body.
///
/// `presented` must look like `sha1=<hex>` or `sha256=<hex>`. Anything empty,
/// malformed or mismatching yields `false`.
pub fn verify(raw_body: &[u8], presented: &str, secret: &[u8]) -> bool {
    let Some((prefix, hex_sig)) = presented.trim().split_once('=') else {
        return false;
    };
    let Some(algorithm) = Algorithm::from_prefix(prefix) else {
        return false;
    };
    if hex_sig.is_empty() {
        return false;
    }

    let Some(expected) = digest_hex(algorithm, raw_body, secret) else {
        return false;
    };
    constant_time_eq(
        hex_sig.to_ascii_lowercase().as_bytes(),
        expected.as_bytes(),
    )
}

/// Produce the header value a sender holding `secret` would attach to `raw_body`.
#[cfg(test)]
pub fn sign(algorithm: Algorithm, raw_body: &[u8], secret: &[u8]) -> String {
    // HMAC accepts keys of any length, so this only fails on an impossible key.
    let digest = digest_hex(algorithm, raw_body, secret).unwrap_or_default();
    format!("{}={}", algorithm.prefix(), digest)
}

fn digest_hex(algorithm: Algorithm, raw_body: &[u8], secret: &[u8]) -> Option<String> {
    let bytes = match algorithm {
        Algorithm::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(secret).ok()?;
            mac.update(raw_body);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(secret).ok()?;
            mac.update(raw_body);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Some(hex::encode(bytes))
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
