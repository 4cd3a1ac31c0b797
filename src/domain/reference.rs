//! Short customer-facing order references.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::DomainError;

const CHARSET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const REFERENCE_LEN: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;

/// Hash `input` and map the first bytes of the digest onto the charset.
pub fn encode_reference(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..REFERENCE_LEN]
        .iter()
        .map(|b| CHARSET[*b as usize % CHARSET.len()] as char)
        .collect()
}

/// Derive a reference from `order_id`, asking `is_taken` before returning.
///
/// The first candidate comes straight from the order id; each collision
/// re-hashes the id with a random suffix. Gives up after `max_attempts`.
pub fn generate_reference<F>(
    order_id: Uuid,
    max_attempts: u32,
    mut is_taken: F,
) -> Result<String, DomainError>
where
    F: FnMut(&str) -> Result<bool, DomainError>,
{
    let mut input = order_id.to_string();
    for attempt in 1..=max_attempts {
        let candidate = encode_reference(&input);
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        log::debug!(
            "order reference {} already taken (attempt {}/{})",
            candidate,
            attempt,
            max_attempts
        );
        input = format!("{}{}", order_id, random_suffix());
    }
    Err(DomainError::ReferenceUnavailable(max_attempts))
}

fn random_suffix() -> u16 {
    (Uuid::new_v4().as_u128() & 0xFFFF) as u16
}
