//! Global chain counters: the current epoch and the height the next
//! epoch advance is due.

use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// Default number of blocks per epoch, used by genesis.
pub const DEFAULT_EPOCH_LENGTH: u64 = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Global {
    /// Monotonically increasing epoch counter.
    pub epoch: u16,
    /// Height at which the next epoch advance runs.
    pub next_epoch_block: u64,
}

impl Default for Global {
    fn default() -> Self {
        Self {
            epoch: 0,
            next_epoch_block: DEFAULT_EPOCH_LENGTH,
        }
    }
}

impl rlp::Encodable for Global {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.epoch);
        s.append(&self.next_epoch_block);
    }
}

impl rlp::Decodable for Global {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Global {
            epoch: rlp.val_at(0)?,
            next_epoch_block: rlp.val_at(1)?,
        })
    }
}
