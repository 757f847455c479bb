//! VRF-based proposer sortition.
//!
//! Each identity able to propose derives a verifiable random output from
//! the previous block's seed and its own secret key. The output both
//! decides eligibility (compared against a stake-weighted threshold)
//! and, for the winner, becomes the next block's seed — so seeds form
//! an unpredictable, unbiasable chain rooted at genesis.

use primitive_types::U256;
use thiserror::Error;
use vrf::openssl::{CipherSuite, ECVRF};
use vrf::VRF;

use crate::config::Rate;
use crate::types::{BlockHash, Hash256, HASH_LEN};

#[derive(Debug, Error)]
pub enum SortitionError {
    #[error("VRF backend error: {0}")]
    Backend(String),
    #[error("VRF output is not {HASH_LEN} bytes")]
    BadOutputLength,
}

/// Output of a successful VRF evaluation: the hash used for eligibility
/// and seeding, plus the proof a verifier checks it against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VrfOutput {
    pub hash: Hash256,
    pub proof: Vec<u8>,
}

/// Abstraction over the VRF scheme, so the engine can be tested with a
/// deterministic fake without linking OpenSSL.
pub trait Vrf: Send + Sync {
    fn prove(&self, secret_key: &[u8], seed_input: &[u8]) -> Result<VrfOutput, SortitionError>;
    fn verify(
        &self,
        public_key: &[u8],
        seed_input: &[u8],
        proof: &[u8],
    ) -> Result<Hash256, SortitionError>;
}

/// ECVRF-P256-SHA256-TAI, the concrete scheme used by the running node.
#[derive(Default)]
pub struct EcvrfP256Sha256Tai;

impl Vrf for EcvrfP256Sha256Tai {
    fn prove(&self, secret_key: &[u8], seed_input: &[u8]) -> Result<VrfOutput, SortitionError> {
        let mut vrf = ECVRF::from_suite(CipherSuite::P256_SHA256_TAI)
            .map_err(|e| SortitionError::Backend(e.to_string()))?;
        let proof = vrf
            .prove(secret_key, seed_input)
            .map_err(|e| SortitionError::Backend(e.to_string()))?;
        let digest = vrf
            .proof_to_hash(&proof)
            .map_err(|e| SortitionError::Backend(e.to_string()))?;
        if digest.len() != HASH_LEN {
            return Err(SortitionError::BadOutputLength);
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&digest);
        Ok(VrfOutput {
            hash: Hash256::from_bytes(arr),
            proof,
        })
    }

    fn verify(
        &self,
        public_key: &[u8],
        seed_input: &[u8],
        proof: &[u8],
    ) -> Result<Hash256, SortitionError> {
        let mut vrf = ECVRF::from_suite(CipherSuite::P256_SHA256_TAI)
            .map_err(|e| SortitionError::Backend(e.to_string()))?;
        vrf.verify(public_key, proof, seed_input)
            .map_err(|e| SortitionError::Backend(e.to_string()))?;
        let digest = vrf
            .proof_to_hash(proof)
            .map_err(|e| SortitionError::Backend(e.to_string()))?;
        if digest.len() != HASH_LEN {
            return Err(SortitionError::BadOutputLength);
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&digest);
        Ok(Hash256::from_bytes(arr))
    }
}

/// Marker byte distinguishing the eligibility VRF input from the
/// block-seed VRF input, so the same key never produces the same
/// output for both purposes.
const ELIGIBILITY_MARKER: u8 = 0x01;

/// Builds the input a node's *eligibility* VRF is evaluated over:
/// `parent_seed || 0x01 || (parent_height + 1)`. This is a separate
/// evaluation from the one that produces the winning block's seed
/// (see [`block_seed_input`]) — every validator can (and does) run
/// this one locally to decide whether to attempt a proposal at all.
pub fn eligibility_seed_input(parent_seed: &Hash256, height: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HASH_LEN + 1 + 8);
    buf.extend_from_slice(parent_seed.as_bytes());
    buf.push(ELIGIBILITY_MARKER);
    buf.extend_from_slice(&height.to_be_bytes());
    buf
}

/// Builds the input the *winning* proposer's VRF is evaluated over to
/// derive the next block's seed: `parent_seed || height || parent_hash`.
/// Using the parent's hash (rather than the new block's own, not yet
/// known hash) avoids the circularity of hashing a header that embeds
/// the very seed being computed.
pub fn block_seed_input(parent_seed: &Hash256, height: u64, parent_hash: BlockHash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HASH_LEN + 8 + HASH_LEN);
    buf.extend_from_slice(parent_seed.as_bytes());
    buf.extend_from_slice(&height.to_be_bytes());
    buf.extend_from_slice(parent_hash.0.as_bytes());
    buf
}

/// `true` if `vrf_hash`, interpreted as a big-endian 256-bit integer,
/// clears the fraction-of-range `threshold` (typically configured near
/// `0.5`): `v / MAX >= threshold`. Eligibility does not depend on
/// stake — every identity, regardless of stake, faces the same
/// threshold on its own independently-drawn VRF output.
pub fn is_eligible(vrf_hash: &Hash256, threshold: Rate) -> bool {
    let vrf_value = U256::from_big_endian(vrf_hash.as_bytes());
    vrf_value >= threshold_to_u256(threshold)
}

/// Converts a `[0, 1]` rate into the `U256` value it denotes as a
/// fraction of `U256::MAX`.
fn threshold_to_u256(rate: Rate) -> U256 {
    if rate.denominator == 0 {
        return U256::MAX;
    }
    (U256::MAX / U256::from(rate.denominator)).saturating_mul(U256::from(rate.numerator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_seed_input_changes_with_height() {
        let parent = Hash256::compute(b"parent-seed");
        let a = eligibility_seed_input(&parent, 10);
        let b = eligibility_seed_input(&parent, 11);
        assert_ne!(a, b);
    }

    #[test]
    fn block_seed_input_changes_with_parent_hash() {
        let parent = Hash256::compute(b"parent-seed");
        let a = block_seed_input(&parent, 10, BlockHash(Hash256::zero()));
        let b = block_seed_input(&parent, 10, BlockHash(Hash256::compute(b"other")));
        assert_ne!(a, b);
    }

    #[test]
    fn eligibility_and_block_seed_inputs_differ_for_identical_parent_and_height() {
        let parent = Hash256::compute(b"parent-seed");
        let eligibility = eligibility_seed_input(&parent, 5);
        let block = block_seed_input(&parent, 5, BlockHash(Hash256::zero()));
        assert_ne!(eligibility, block);
    }

    #[test]
    fn max_hash_always_clears_any_threshold() {
        let hash = Hash256::from_bytes([0xffu8; HASH_LEN]);
        assert!(is_eligible(&hash, Rate::new(999_999, 1_000_000)));
    }

    #[test]
    fn zero_hash_only_clears_a_zero_threshold() {
        let hash = Hash256::from_bytes([0u8; HASH_LEN]);
        assert!(is_eligible(&hash, Rate::new(0, 1_000_000)));
        assert!(!is_eligible(&hash, Rate::new(1, 1_000_000)));
    }

    #[test]
    fn higher_threshold_is_harder_to_clear() {
        // A hash whose top byte is 0x80 clears ~50% thresholds but not ~90%.
        let mut bytes = [0u8; HASH_LEN];
        bytes[0] = 0x80;
        let hash = Hash256::from_bytes(bytes);
        assert!(is_eligible(&hash, Rate::new(500_000, 1_000_000)));
        assert!(!is_eligible(&hash, Rate::new(900_000, 1_000_000)));
    }
}
