//! Challenge-response scramble computation for MYSQL41 and SHA256_MEMORY. Grounded on the
//! teacher's `bytes.rs` (`encrypt_password`/`xor`/`sha1`/`sha256`), generalized from the
//! classic protocol's two named plugins to this protocol's scramble formulas.

use common::err::{AuthError, XResult};
use sha1::Sha1;
use sha2::{Digest, Sha256};

const EXPECTED_NONCE_LEN: usize = 20;

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

fn sha1(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

fn check_nonce(nonce: &[u8]) -> XResult<()> {
    if nonce.len() != EXPECTED_NONCE_LEN {
        return Err(AuthError::BadChallengeLength { got: nonce.len() }.into());
    }
    Ok(())
}

/// `"*" || hex(SHA1(pw) XOR SHA1(nonce || SHA1(SHA1(pw))))`; empty for an empty password.
pub fn mysql41_scramble(password: &str, nonce: &[u8]) -> XResult<String> {
    check_nonce(nonce)?;
    if password.is_empty() {
        return Ok(String::new());
    }
    let password_hash = sha1(password.as_bytes());
    let double_hash = sha1(&password_hash);
    let concat = [nonce, &double_hash].concat();
    let scramble = xor(&password_hash, &sha1(&concat));
    Ok(format!("*{}", hex::encode(scramble)))
}

/// `hex(SHA256(pw) XOR SHA256(SHA256(SHA256(pw)) || nonce))`; empty for an empty password.
pub fn sha256_memory_scramble(password: &str, nonce: &[u8]) -> XResult<String> {
    check_nonce(nonce)?;
    if password.is_empty() {
        return Ok(String::new());
    }
    let password_hash = sha256(password.as_bytes());
    let double_hash = sha256(&password_hash);
    let concat = [double_hash.as_slice(), nonce].concat();
    let scramble = xor(&password_hash, &sha256(&concat));
    Ok(hex::encode(scramble))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql41_empty_password_yields_empty_scramble() {
        let nonce = [0u8; 20];
        assert_eq!(mysql41_scramble("", &nonce).unwrap(), "");
    }

    #[test]
    fn sha256_memory_empty_password_yields_empty_scramble() {
        let nonce = [0u8; 20];
        assert_eq!(sha256_memory_scramble("", &nonce).unwrap(), "");
    }

    #[test]
    fn mysql41_rejects_short_nonce() {
        assert!(mysql41_scramble("secret", &[0u8; 10]).is_err());
    }

    #[test]
    fn mysql41_nonempty_password_is_deterministic() {
        let nonce = *b"0123456789abcdefghij";
        let a = mysql41_scramble("hunter2", &nonce).unwrap();
        let b = mysql41_scramble("hunter2", &nonce).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with('*'));
        assert_eq!(a.len(), 1 + 40);
    }

    #[test]
    fn sha256_memory_nonempty_password_has_expected_length() {
        let nonce = *b"0123456789abcdefghij";
        let scramble = sha256_memory_scramble("hunter2", &nonce).unwrap();
        assert_eq!(scramble.len(), 64);
    }
}
