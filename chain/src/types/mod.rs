//! Core domain types shared across the engine.
//!
//! This module defines strongly-typed hashes, account addresses, and key
//! material so that the rest of the crate never passes naked byte buffers
//! around. All fixed-size hashes are 32-byte Keccak-256 digests; addresses
//! are the low 20 bytes of the Keccak-256 hash of an uncompressed public
//! key, matching the wire contract a node must preserve for database
//! compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod account;
pub mod block;
pub mod global;
pub mod identity;
pub mod tx;

pub use account::Account;
pub use block::{Block, BlockHash, Body, Header};
pub use global::Global;
pub use identity::{Identity, IdentityState};
pub use tx::{Transaction, TxCommon, TxKind};

/// Length in bytes of all 256-bit hash types used in this crate.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an account/identity address.
pub const ADDRESS_LEN: usize = 20;

/// 256-bit Keccak hash wrapper.
///
/// This is the backing representation for block hashes, transaction
/// roots, state roots, and VRF seeds. It is always exactly [`HASH_LEN`]
/// bytes.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes the Keccak-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = keccak_hash::keccak(data);
        Hash256(h.0)
    }

    /// Hashes the concatenation of several byte slices.
    pub fn compute_concat(parts: &[&[u8]]) -> Self {
        let mut buf = Vec::new();
        for p in parts {
            buf.extend_from_slice(p);
        }
        Self::compute(&buf)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn zero() -> Self {
        Hash256([0u8; HASH_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Wraps a raw 32-byte digest (e.g. a VRF output hash) without
    /// re-hashing it.
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Hash256(bytes)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

impl rlp::Encodable for Hash256 {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Hash256 {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        let bytes = rlp.data()?;
        if bytes.len() != HASH_LEN {
            return Err(rlp::DecoderError::RlpInvalidLength);
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(bytes);
        Ok(Hash256(arr))
    }
}

/// Account / identity address: the low 20 bytes of `keccak256(pubkey)`.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Derives an address from an uncompressed, prefix-stripped public key.
    pub fn from_public_key(pk_bytes: &[u8]) -> Self {
        let h = Hash256::compute(pk_bytes);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&h.0[HASH_LEN - ADDRESS_LEN..]);
        Address(out)
    }

    pub fn zero() -> Self {
        Address([0u8; ADDRESS_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl rlp::Encodable for Address {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Address {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        let bytes = rlp.data()?;
        if bytes.len() != ADDRESS_LEN {
            return Err(rlp::DecoderError::RlpInvalidLength);
        }
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(bytes);
        Ok(Address(arr))
    }
}

/// Uncompressed secp256k1 public key bytes (64 bytes, no `0x04` prefix).
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_address(&self) -> Address {
        Address::from_public_key(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0))
    }
}

impl rlp::Encodable for PublicKey {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for PublicKey {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(PublicKey(rlp.data()?.to_vec()))
    }
}

/// Detached ECDSA signature (65 bytes: `r || s || v`) over a canonical
/// transaction or header encoding.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn empty() -> Self {
        Signature(Vec::new())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

impl rlp::Encodable for Signature {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Signature {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Signature(rlp.data()?.to_vec()))
    }
}
