//! Block types and canonical hashing.
//!
//! A block header comes in two shapes: [`Header::Proposed`], produced by
//! a sortition winner and carrying a body, or [`Header::Empty`], inserted
//! by the chain itself when no eligible proposer produced a block in
//! time. Canonical encoding is RLP throughout, matching the wire format
//! used for transaction signing.

use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use super::{Address, Hash256, PublicKey, Transaction};

/// Strongly-typed block hash: the Keccak-256 digest of a header's
/// canonical RLP encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl rlp::Encodable for BlockHash {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&self.0);
    }
}

impl rlp::Decodable for BlockHash {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(BlockHash(Hash256::decode(rlp)?))
    }
}

/// Block header.
///
/// `Proposed` is produced by a sortition winner; `Empty` is the
/// header the chain inserts at a height where sortition produced no
/// eligible proposer within the block interval. An `Empty` header has
/// no body and carries forward the parent's state root unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Header {
    Proposed {
        parent_hash: BlockHash,
        height: u64,
        time: u64,
        proposer_pubkey: PublicKey,
        tx_root: Hash256,
        state_root: Hash256,
        coinbase: Address,
    },
    Empty {
        parent_hash: BlockHash,
        height: u64,
        state_root: Hash256,
    },
}

impl Header {
    pub fn parent_hash(&self) -> BlockHash {
        match self {
            Header::Proposed { parent_hash, .. } => *parent_hash,
            Header::Empty { parent_hash, .. } => *parent_hash,
        }
    }

    pub fn height(&self) -> u64 {
        match self {
            Header::Proposed { height, .. } => *height,
            Header::Empty { height, .. } => *height,
        }
    }

    pub fn state_root(&self) -> Hash256 {
        match self {
            Header::Proposed { state_root, .. } => *state_root,
            Header::Empty { state_root, .. } => *state_root,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Header::Empty { .. })
    }

    /// Keccak-256 hash of this header's canonical RLP encoding.
    pub fn compute_hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(&rlp::encode(self)))
    }
}

impl rlp::Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            Header::Proposed {
                parent_hash,
                height,
                time,
                proposer_pubkey,
                tx_root,
                state_root,
                coinbase,
            } => {
                s.begin_list(8);
                s.append(&0u8);
                s.append(parent_hash);
                s.append(height);
                s.append(time);
                s.append(proposer_pubkey);
                s.append(tx_root);
                s.append(state_root);
                s.append(coinbase);
            }
            Header::Empty {
                parent_hash,
                height,
                state_root,
            } => {
                s.begin_list(4);
                s.append(&1u8);
                s.append(parent_hash);
                s.append(height);
                s.append(state_root);
            }
        }
    }
}

impl rlp::Decodable for Header {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let tag: u8 = rlp.val_at(0)?;
        match tag {
            0 => Ok(Header::Proposed {
                parent_hash: rlp.val_at(1)?,
                height: rlp.val_at(2)?,
                time: rlp.val_at(3)?,
                proposer_pubkey: rlp.val_at(4)?,
                tx_root: rlp.val_at(5)?,
                state_root: rlp.val_at(6)?,
                coinbase: rlp.val_at(7)?,
            }),
            1 => Ok(Header::Empty {
                parent_hash: rlp.val_at(1)?,
                height: rlp.val_at(2)?,
                state_root: rlp.val_at(3)?,
            }),
            _ => Err(DecoderError::Custom("invalid header tag")),
        }
    }
}

/// Body of a `Proposed` block: its transactions and the VRF output that
/// both won sortition and seeds the next block's committee sampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub transactions: Vec<Transaction>,
    /// VRF output hash, becomes the seed for the next height's sortition.
    pub block_seed: Hash256,
    /// VRF proof bytes over the seed input, checked against the
    /// proposer's public key during validation.
    pub seed_proof: Vec<u8>,
}

impl rlp::Encodable for Body {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append_list(&self.transactions);
        s.append(&self.block_seed);
        s.append(&self.seed_proof);
    }
}

impl rlp::Decodable for Body {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Body {
            transactions: rlp.list_at(0)?,
            block_seed: rlp.val_at(1)?,
            seed_proof: rlp.val_at(2)?,
        })
    }
}

impl Body {
    /// Root hash committing to the ordered transaction list.
    pub fn tx_root(&self) -> Hash256 {
        let mut buf = Vec::new();
        for tx in &self.transactions {
            buf.extend_from_slice(&rlp::encode(tx));
        }
        Hash256::compute(&buf)
    }
}

/// A full block: header plus an optional body (`None` for `Empty` headers).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub body: Option<Body>,
}

impl Block {
    pub fn hash(&self) -> BlockHash {
        self.header.compute_hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height()
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.body
            .as_ref()
            .map(|b| b.transactions.as_slice())
            .unwrap_or(&[])
    }
}
