//! Voter-facing ballot receipts.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::model::mongodb::Id;

type HmacSha256 = Hmac<Sha256>;

/// Derive a receipt token for the given ballot.
///
/// The token is an HMAC over the ballot ID and a random nonce, so it cannot
/// be predicted from the voter's identity or any other public data, and two
/// receipts never collide in practice.
pub fn receipt_token(secret: &str, ballot_id: Id) -> String {
    let nonce: [u8; 8] = rand::thread_rng().gen();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC takes a key of any length");
    mac.update(&ballot_id.bytes());
    mac.update(&nonce);
    let tag = mac.finalize().into_bytes();

    let mut token = Vec::with_capacity(nonce.len() + 16);
    token.extend_from_slice(&nonce);
    token.extend_from_slice(&tag[..16]);
    BASE32_NOPAD.encode(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_distinct_per_ballot() {
        let a = receipt_token("secret", Id::new());
        let b = receipt_token("secret", Id::new());
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_are_nondeterministic() {
        let ballot = Id::new();
        assert_ne!(
            receipt_token("secret", ballot),
            receipt_token("secret", ballot)
        );
    }

    #[test]
    fn tokens_are_printable_base32() {
        let token = receipt_token("secret", Id::new());
        assert!(BASE32_NOPAD.decode(token.as_bytes()).is_ok());
    }
}
