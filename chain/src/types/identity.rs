//! Identity state: the promotion lattice every address moves through as it
//! goes from an invited guest to a fully verified participant.

use num_bigint::BigUint;
use num_traits::Zero;
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use super::account::{decode_biguint, encode_biguint};

/// Position of an address in the identity promotion lattice.
///
/// Transitions follow `Undefined -> Invite -> Candidate -> Verified`,
/// with `Killed` reachable as an absorbing state from any of the above.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum IdentityState {
    Undefined,
    Invite,
    Candidate,
    Verified,
    Killed,
}

impl IdentityState {
    fn tag(self) -> u8 {
        match self {
            IdentityState::Undefined => 0,
            IdentityState::Invite => 1,
            IdentityState::Candidate => 2,
            IdentityState::Verified => 3,
            IdentityState::Killed => 4,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, DecoderError> {
        Ok(match tag {
            0 => IdentityState::Undefined,
            1 => IdentityState::Invite,
            2 => IdentityState::Candidate,
            3 => IdentityState::Verified,
            4 => IdentityState::Killed,
            _ => return Err(DecoderError::Custom("invalid identity state tag")),
        })
    }
}

impl Default for IdentityState {
    fn default() -> Self {
        IdentityState::Undefined
    }
}

/// Per-address identity record.
///
/// `stake` is kept distinct from [`super::Account::balance`]: it accrues
/// from block rewards and is non-withdrawable through the transactions
/// modelled here.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub state: IdentityState,
    pub stake: BigUint,
    pub invites_remaining: u8,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            state: IdentityState::Undefined,
            stake: BigUint::zero(),
            invites_remaining: 0,
        }
    }
}

impl Identity {
    /// `true` for states that still occupy a slot in the validator cache
    /// eligibility set (anything past `Undefined` and not yet `Killed`).
    pub fn is_alive(&self) -> bool {
        !matches!(self.state, IdentityState::Undefined | IdentityState::Killed)
    }
}

impl rlp::Encodable for Identity {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.state.tag());
        encode_biguint(s, &self.stake);
        s.append(&self.invites_remaining);
    }
}

impl rlp::Decodable for Identity {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let tag: u8 = rlp.val_at(0)?;
        Ok(Identity {
            state: IdentityState::from_tag(tag)?,
            stake: decode_biguint(rlp, 1)?,
            invites_remaining: rlp.val_at(2)?,
        })
    }
}
