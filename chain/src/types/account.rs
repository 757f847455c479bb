//! Account state: spendable balance, replay-protection nonce, and the
//! epoch the account last transacted in.

use num_bigint::BigUint;
use num_traits::Zero;
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// Per-address account record.
///
/// `balance` is modelled as an arbitrary-precision non-negative integer
/// (`BigUint`) rather than a fixed-width type: the engine never needs to
/// reason about overflow, only about the invariant that it never goes
/// negative (enforced at the call sites in the transaction executor).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub balance: BigUint,
    pub nonce: u32,
    pub epoch: u16,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: BigUint::zero(),
            nonce: 0,
            epoch: 0,
        }
    }
}

impl Account {
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0
    }
}

/// Encodes a `BigUint` as its minimal big-endian byte string.
pub(crate) fn encode_biguint(s: &mut RlpStream, n: &BigUint) {
    s.append(&n.to_bytes_be());
}

pub(crate) fn decode_biguint(rlp: &Rlp, index: usize) -> Result<BigUint, DecoderError> {
    let bytes: Vec<u8> = rlp.val_at(index)?;
    Ok(BigUint::from_bytes_be(&bytes))
}

impl rlp::Encodable for Account {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        encode_biguint(s, &self.balance);
        s.append(&self.nonce);
        s.append(&self.epoch);
    }
}

impl rlp::Decodable for Account {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Account {
            balance: decode_biguint(rlp, 0)?,
            nonce: rlp.val_at(1)?,
            epoch: rlp.val_at(2)?,
        })
    }
}
