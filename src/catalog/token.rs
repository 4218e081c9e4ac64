//! Access token derivation: a five letter user id prefix followed by a hex
//! digest of the password.
//!
//! The token is an identifier, not a credential. It never expires and anyone
//! who learns it can replay it.

use sha2::{Digest, Sha256};

use crate::domain::UserId;

pub const ID_PREFIX_LEN: usize = 5;
const MAX_ENCODED_ID: UserId = 99_999;

/// Maps each decimal digit of `id` onto `A`..=`J`, left padded with `A`.
pub fn encode_user_id(id: UserId) -> Option<String> {
    if !(0..=MAX_ENCODED_ID).contains(&id) {
        return None;
    }
    let mut encoded = [b'A'; ID_PREFIX_LEN];
    let mut rest = id;
    for slot in encoded.iter_mut().rev() {
        // `rest % 10` is a single digit here.
        *slot += (rest % 10) as u8;
        rest /= 10;
    }
    Some(encoded.iter().map(|b| char::from(*b)).collect())
}

pub fn decode_user_id(prefix: &str) -> Option<UserId> {
    if prefix.len() != ID_PREFIX_LEN {
        return None;
    }
    prefix.bytes().try_fold(0, |id: UserId, b| match b {
        b'A'..=b'J' => Some(id * 10 + UserId::from(b - b'A')),
        _ => None,
    })
}

pub fn derive_token(id: UserId, password: &str) -> Option<String> {
    let prefix = encode_user_id(id)?;
    Some(format!("{prefix}{}", hex::encode(Sha256::digest(password.as_bytes()))))
}

/// The user id a token claims. Says nothing about whether the token is valid.
pub fn claimed_user(token: &str) -> Option<UserId> {
    if token.len() <= ID_PREFIX_LEN {
        return None;
    }
    decode_user_id(token.get(..ID_PREFIX_LEN)?)
}
