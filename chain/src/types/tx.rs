//! Transaction types.
//!
//! Every transaction shares a common envelope ([`TxCommon`]) tagged with
//! a [`TxKind`] that selects how the executor interprets `to`/`amount`
//! and what side effects it has on identity state.

use num_bigint::BigUint;
use num_traits::Zero;
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::{decode_biguint, encode_biguint};
use super::{Address, Hash256, PublicKey, Signature};

/// Discriminates the side effect a transaction has on state beyond the
/// plain balance/nonce update every kind performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TxKind {
    /// Plain value transfer, no identity effect.
    Regular,
    /// Sender (an already-verified identity) invites `to`, consuming one
    /// of the sender's remaining invite slots.
    Invite,
    /// `to` accepts a pending invite and becomes a `Candidate`.
    Activation,
    /// Sender kills its own identity, releasing its stake.
    Kill,
    /// Epoch-advance marker transaction, included by the proposer at the
    /// epoch boundary; carries no funds.
    NewEpoch,
}

impl TxKind {
    fn tag(self) -> u8 {
        match self {
            TxKind::Regular => 0,
            TxKind::Invite => 1,
            TxKind::Activation => 2,
            TxKind::Kill => 3,
            TxKind::NewEpoch => 4,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, DecoderError> {
        Ok(match tag {
            0 => TxKind::Regular,
            1 => TxKind::Invite,
            2 => TxKind::Activation,
            3 => TxKind::Kill,
            4 => TxKind::NewEpoch,
            _ => return Err(DecoderError::Custom("invalid transaction kind tag")),
        })
    }
}

/// Fields common to every transaction, signed as a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxCommon {
    pub kind: TxKind,
    /// Epoch the sender believed current when signing; rejected if stale.
    pub epoch: u16,
    /// Strictly-increasing per-account replay counter.
    pub account_nonce: u32,
    /// Recipient, absent for `Kill` and `NewEpoch`.
    pub to: Option<Address>,
    /// Amount moved from the sender's balance to `to`, for `Regular`.
    pub amount: BigUint,
}

impl rlp::Encodable for TxCommon {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.kind.tag());
        s.append(&self.epoch);
        s.append(&self.account_nonce);
        match &self.to {
            Some(addr) => s.append(addr),
            None => s.append_empty_data(),
        };
        encode_biguint(s, &self.amount);
    }
}

impl rlp::Decodable for TxCommon {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let tag: u8 = rlp.val_at(0)?;
        let to_rlp = rlp.at(3)?;
        let to = if to_rlp.is_empty() {
            None
        } else {
            Some(Address::decode(&to_rlp)?)
        };
        Ok(TxCommon {
            kind: TxKind::from_tag(tag)?,
            epoch: rlp.val_at(1)?,
            account_nonce: rlp.val_at(2)?,
            to,
            amount: decode_biguint(rlp, 4)?,
        })
    }
}

/// A signed transaction as it appears in a block body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub common: TxCommon,
    /// Uncompressed public key of the signer, carried alongside the
    /// signature so the executor does not need to recover it twice.
    pub sender_pubkey: PublicKey,
    pub signature: Signature,
}

#[derive(Debug, Error)]
pub enum TxError {
    #[error("transaction signature does not recover to the stated sender public key")]
    SignerMismatch,
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

impl Transaction {
    /// Bytes that are actually signed: the RLP encoding of [`TxCommon`]
    /// alone, never including the signature itself.
    pub fn signing_bytes(&self) -> Vec<u8> {
        rlp::encode(&self.common).to_vec()
    }

    /// Content hash used for mempool indexing and inclusion proofs.
    pub fn hash(&self) -> Hash256 {
        Hash256::compute(&rlp::encode(self))
    }

    pub fn sender(&self) -> Address {
        self.sender_pubkey.to_address()
    }

    /// Verifies that `signature` is a valid ECDSA signature by
    /// `sender_pubkey` over [`Transaction::signing_bytes`].
    pub fn verify_signature(&self) -> Result<(), TxError> {
        use parity_crypto::publickey::{public_to_address, recover, Message, Public};

        if self.signature.as_bytes().len() != 65 {
            return Err(TxError::MalformedSignature(
                "expected 65-byte r || s || v signature".into(),
            ));
        }
        let mut sig_bytes = [0u8; 65];
        sig_bytes.copy_from_slice(self.signature.as_bytes());
        let sig = parity_crypto::publickey::Signature::from(sig_bytes);

        let digest = Hash256::compute(&self.signing_bytes());
        let message = Message::from(digest.0);

        let recovered = recover(&sig, &message)
            .map_err(|e| TxError::MalformedSignature(e.to_string()))?;

        let expected = Public::from_slice(self.sender_pubkey.as_bytes());
        if recovered != expected {
            return Err(TxError::SignerMismatch);
        }
        let _ = public_to_address(&expected);
        Ok(())
    }
}

impl rlp::Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.common);
        s.append(&self.sender_pubkey);
        s.append(&self.signature);
    }
}

impl rlp::Decodable for Transaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Transaction {
            common: rlp.val_at(0)?,
            sender_pubkey: rlp.val_at(1)?,
            signature: rlp.val_at(2)?,
        })
    }
}

impl Default for TxCommon {
    fn default() -> Self {
        TxCommon {
            kind: TxKind::Regular,
            epoch: 0,
            account_nonce: 0,
            to: None,
            amount: BigUint::zero(),
        }
    }
}
