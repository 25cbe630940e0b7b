use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const TOKEN_BYTE_LENGTH: usize = 32;
pub const SHORT_CODE_LENGTH: usize = 6;
const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NETWORK_NAME_PREFIX: &str = "ATT-";
const NETWORK_NAME_HASH_CHARS: usize = 8;

/// Generates a 256-bit session token from the OS RNG, URL-safe base64 encoded.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTE_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a human-typeable uppercase alphanumeric code.
pub fn generate_short_code() -> String {
    let mut rng = OsRng;
    (0..SHORT_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SHORT_CODE_ALPHABET.len());
            SHORT_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Derives the broadcast network name for a WIFI session from its token.
pub fn derive_network_name(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let encoded = hex::encode(digest).to_ascii_uppercase();
    format!(
        "{}{}",
        NETWORK_NAME_PREFIX,
        &encoded[..NETWORK_NAME_HASH_CHARS]
    )
}

/// Compares two secrets without short-circuiting on the first differing byte.
pub fn credentials_match(supplied: &str, expected: &str) -> bool {
    let supplied = supplied.as_bytes();
    let expected = expected.as_bytes();
    // ct_eq on slices of unequal length returns false without leaking content.
    supplied.ct_eq(expected).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn session_tokens_are_long_and_distinct() {
        let tokens: HashSet<String> = (0..64).map(|_| generate_session_token()).collect();
        assert_eq!(tokens.len(), 64);
        for token in &tokens {
            let decoded = URL_SAFE_NO_PAD.decode(token).expect("decode token");
            assert_eq!(decoded.len(), TOKEN_BYTE_LENGTH);
        }
    }

    #[test]
    fn short_code_is_uppercase_alphanumeric() {
        for _ in 0..32 {
            let code = generate_short_code();
            assert_eq!(code.len(), SHORT_CODE_LENGTH);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn network_name_is_stable_for_token() {
        let name = derive_network_name("token-a");
        assert_eq!(name, derive_network_name("token-a"));
        assert_ne!(name, derive_network_name("token-b"));
        assert!(name.starts_with(NETWORK_NAME_PREFIX));
        assert_eq!(name.len(), NETWORK_NAME_PREFIX.len() + NETWORK_NAME_HASH_CHARS);
    }

    #[test]
    fn credentials_match_requires_exact_equality() {
        assert!(credentials_match("abc", "abc"));
        assert!(!credentials_match("abd", "abc"));
        assert!(!credentials_match("ab", "abc"));
        assert!(!credentials_match("", "abc"));
    }
}
