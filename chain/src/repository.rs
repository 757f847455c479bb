//! Durable storage for blocks and chain metadata.
//!
//! The repository is deliberately dumb: it knows how to persist and
//! retrieve blocks by height or hash, and a handful of small metadata
//! keys (head, canonical hash per height, finalization certificates).
//! All consensus-meaningful decisions live above it, in [`crate::chain`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use crate::error::{ChainError, ChainResult};
use crate::types::{Block, BlockHash};

const CF_BLOCKS_BY_HASH: &str = "blocks_by_hash";
const CF_CANONICAL_HASH: &str = "canonical_hash_by_height";
const CF_META: &str = "meta";
const CF_CERTS: &str = "finalization_certs";

const META_HEAD_KEY: &[u8] = b"head";

/// Storage interface the rest of the engine depends on.
///
/// Implemented by [`RocksDbRepository`] for production nodes and by
/// [`InMemoryRepository`] for tests.
pub trait Repository: Send + Sync {
    fn write_block(&self, block: &Block) -> ChainResult<()>;
    fn read_block(&self, hash: &BlockHash) -> ChainResult<Option<Block>>;

    fn write_canonical_hash(&self, height: u64, hash: BlockHash) -> ChainResult<()>;
    fn read_canonical_hash(&self, height: u64) -> ChainResult<Option<BlockHash>>;

    fn write_head(&self, hash: BlockHash) -> ChainResult<()>;
    fn read_head(&self) -> ChainResult<Option<BlockHash>>;

    /// Records the finalization certificate (aggregated committee
    /// signatures) for the block at `hash`, if the consensus layer
    /// collects one.
    fn write_cert(&self, hash: &BlockHash, cert_bytes: &[u8]) -> ChainResult<()>;
    fn read_cert(&self, hash: &BlockHash) -> ChainResult<Option<Vec<u8>>>;
}

/// Configuration for the RocksDB-backed repository.
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    pub path: std::path::PathBuf,
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: std::path::PathBuf::from("./data/chain-db"),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed [`Repository`] used by a running node.
pub struct RocksDbRepository {
    db: DB,
}

impl RocksDbRepository {
    pub fn open(config: &RocksDbConfig) -> ChainResult<Self> {
        Self::open_path(&config.path, config.create_if_missing)
    }

    pub fn open_path(path: impl AsRef<Path>, create_if_missing: bool) -> ChainResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(create_if_missing);
        opts.create_missing_column_families(true);

        let cfs = [CF_BLOCKS_BY_HASH, CF_CANONICAL_HASH, CF_META, CF_CERTS]
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| ChainError::Repository(e.to_string()))?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> ChainResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ChainError::Repository(format!("missing column family {name}")))
    }
}

impl Repository for RocksDbRepository {
    fn write_block(&self, block: &Block) -> ChainResult<()> {
        let cf = self.cf(CF_BLOCKS_BY_HASH)?;
        let key = block.hash().0.as_bytes().to_vec();
        let value = rlp::encode(&RlpBlock(block.clone())).to_vec();
        self.db
            .put_cf(cf, key, value)
            .map_err(|e| ChainError::Repository(e.to_string()))
    }

    fn read_block(&self, hash: &BlockHash) -> ChainResult<Option<Block>> {
        let cf = self.cf(CF_BLOCKS_BY_HASH)?;
        let key = hash.0.as_bytes().to_vec();
        match self
            .db
            .get_cf(cf, key)
            .map_err(|e| ChainError::Repository(e.to_string()))?
        {
            Some(bytes) => {
                let decoded: RlpBlock = rlp::decode(&bytes)?;
                Ok(Some(decoded.0))
            }
            None => Ok(None),
        }
    }

    fn write_canonical_hash(&self, height: u64, hash: BlockHash) -> ChainResult<()> {
        let cf = self.cf(CF_CANONICAL_HASH)?;
        self.db
            .put_cf(cf, height.to_be_bytes(), hash.0.as_bytes())
            .map_err(|e| ChainError::Repository(e.to_string()))
    }

    fn read_canonical_hash(&self, height: u64) -> ChainResult<Option<BlockHash>> {
        let cf = self.cf(CF_CANONICAL_HASH)?;
        match self
            .db
            .get_cf(cf, height.to_be_bytes())
            .map_err(|e| ChainError::Repository(e.to_string()))?
        {
            Some(bytes) => {
                use crate::types::Hash256;
                if bytes.len() != crate::types::HASH_LEN {
                    return Err(ChainError::Repository("corrupt canonical hash entry".into()));
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Some(BlockHash(Hash256(arr))))
            }
            None => Ok(None),
        }
    }

    fn write_head(&self, hash: BlockHash) -> ChainResult<()> {
        let cf = self.cf(CF_META)?;
        self.db
            .put_cf(cf, META_HEAD_KEY, hash.0.as_bytes())
            .map_err(|e| ChainError::Repository(e.to_string()))
    }

    fn read_head(&self) -> ChainResult<Option<BlockHash>> {
        let cf = self.cf(CF_META)?;
        match self
            .db
            .get_cf(cf, META_HEAD_KEY)
            .map_err(|e| ChainError::Repository(e.to_string()))?
        {
            Some(bytes) => {
                use crate::types::Hash256;
                if bytes.len() != crate::types::HASH_LEN {
                    return Err(ChainError::Repository("corrupt head entry".into()));
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Some(BlockHash(Hash256(arr))))
            }
            None => Ok(None),
        }
    }

    fn write_cert(&self, hash: &BlockHash, cert_bytes: &[u8]) -> ChainResult<()> {
        let cf = self.cf(CF_CERTS)?;
        self.db
            .put_cf(cf, hash.0.as_bytes(), cert_bytes)
            .map_err(|e| ChainError::Repository(e.to_string()))
    }

    fn read_cert(&self, hash: &BlockHash) -> ChainResult<Option<Vec<u8>>> {
        let cf = self.cf(CF_CERTS)?;
        self.db
            .get_cf(cf, hash.0.as_bytes())
            .map_err(|e| ChainError::Repository(e.to_string()))
    }
}

/// Thin wrapper so `Block` can be RLP-encoded as a single opaque value
/// without polluting the public `Block` type with repository concerns.
struct RlpBlock(Block);

impl rlp::Encodable for RlpBlock {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(2);
        s.append(&self.0.header);
        match &self.0.body {
            Some(body) => s.append(body),
            None => s.append_empty_data(),
        };
    }
}

impl rlp::Decodable for RlpBlock {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        let header = rlp.val_at(0)?;
        let body_rlp = rlp.at(1)?;
        let body = if body_rlp.is_empty() {
            None
        } else {
            Some(body_rlp.as_val()?)
        };
        Ok(RlpBlock(Block { header, body }))
    }
}

/// In-memory [`Repository`] used by tests.
#[derive(Default)]
pub struct InMemoryRepository {
    blocks: RwLock<HashMap<[u8; 32], Block>>,
    canonical: RwLock<HashMap<u64, BlockHash>>,
    head: RwLock<Option<BlockHash>>,
    certs: RwLock<HashMap<[u8; 32], Vec<u8>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for InMemoryRepository {
    fn write_block(&self, block: &Block) -> ChainResult<()> {
        self.blocks
            .write()
            .unwrap()
            .insert(*block.hash().0.as_bytes(), block.clone());
        Ok(())
    }

    fn read_block(&self, hash: &BlockHash) -> ChainResult<Option<Block>> {
        Ok(self.blocks.read().unwrap().get(hash.0.as_bytes()).cloned())
    }

    fn write_canonical_hash(&self, height: u64, hash: BlockHash) -> ChainResult<()> {
        self.canonical.write().unwrap().insert(height, hash);
        Ok(())
    }

    fn read_canonical_hash(&self, height: u64) -> ChainResult<Option<BlockHash>> {
        Ok(self.canonical.read().unwrap().get(&height).copied())
    }

    fn write_head(&self, hash: BlockHash) -> ChainResult<()> {
        *self.head.write().unwrap() = Some(hash);
        Ok(())
    }

    fn read_head(&self) -> ChainResult<Option<BlockHash>> {
        Ok(*self.head.read().unwrap())
    }

    fn write_cert(&self, hash: &BlockHash, cert_bytes: &[u8]) -> ChainResult<()> {
        self.certs
            .write()
            .unwrap()
            .insert(*hash.0.as_bytes(), cert_bytes.to_vec());
        Ok(())
    }

    fn read_cert(&self, hash: &BlockHash) -> ChainResult<Option<Vec<u8>>> {
        Ok(self.certs.read().unwrap().get(hash.0.as_bytes()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash256;

    fn dummy_block(height: u64) -> Block {
        Block {
            header: crate::types::Header::Empty {
                parent_hash: BlockHash(Hash256::compute(b"parent")),
                height,
                state_root: Hash256::compute(b"state"),
            },
            body: None,
        }
    }

    #[test]
    fn in_memory_repository_roundtrips_block() {
        let repo = InMemoryRepository::new();
        let block = dummy_block(7);
        let hash = block.hash();
        repo.write_block(&block).unwrap();

        let fetched = repo.read_block(&hash).unwrap().expect("block present");
        assert_eq!(fetched.height(), 7);
    }

    #[test]
    fn in_memory_repository_tracks_head_and_canonical_hash() {
        let repo = InMemoryRepository::new();
        assert!(repo.read_head().unwrap().is_none());

        let block = dummy_block(1);
        let hash = block.hash();
        repo.write_head(hash).unwrap();
        repo.write_canonical_hash(1, hash).unwrap();

        assert_eq!(repo.read_head().unwrap(), Some(hash));
        assert_eq!(repo.read_canonical_hash(1).unwrap(), Some(hash));
    }

    #[test]
    fn rocksdb_repository_roundtrips_block_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = RocksDbRepository::open_path(dir.path(), true).expect("open rocksdb");

        let block = dummy_block(3);
        let hash = block.hash();
        repo.write_block(&block).unwrap();
        repo.write_head(hash).unwrap();

        let fetched = repo.read_block(&hash).unwrap().expect("block present");
        assert_eq!(fetched.height(), 3);
        assert_eq!(repo.read_head().unwrap(), Some(hash));
    }
}
