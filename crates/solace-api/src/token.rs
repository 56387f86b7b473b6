//! Opaque token generation for sessions and magic links.

use rand_core::{OsRng, RngCore};

/// 32 bytes of CSPRNG entropy, hex encoded. Tokens are bearer credentials
/// and must never be guessable.
pub const TOKEN_BYTES: usize = 32;

pub fn generate() -> String {
  let mut buf = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut buf);
  hex::encode(buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_are_64_hex_chars() {
    let t = generate();
    assert_eq!(t.len(), 64);
    assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn tokens_differ() {
    assert_ne!(generate(), generate());
  }
}
