use crate::pack::Pack;
use crate::sink::{block_json_line, Sink};
use anyhow::Context;
use async_trait::async_trait;
use cx_primitives::{Block, Height};
use rocksdb::{Options as RocksOptions, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;


/// Stores blocks in RocksDB under `<table>/<height>` keys.
///
/// Heights are encoded so that byte order matches numeric order,
/// which makes the checkpoint a single backward seek.
pub struct RocksSink {
    name: String,
    db: Arc<DB>
}


impl RocksSink {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let mut options = RocksOptions::default();
        options.create_if_missing(true);
        options.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&options, path)
            .with_context(|| format!("failed to open rocksdb database at {}", path.display()))?;

        Ok(Self {
            name: format!("rocksdb:{}", path.display()),
            db: Arc::new(db)
        })
    }

    pub fn get(&self, table: &str, height: Height) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.db.get(block_key(table, height))?)
    }
}


pub fn encode_height(height: Height) -> [u8; 8] {
    ((height as u64) ^ (1 << 63)).to_be_bytes()
}


pub fn decode_height(bytes: [u8; 8]) -> Height {
    (u64::from_be_bytes(bytes) ^ (1 << 63)) as Height
}


fn table_prefix(table: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(table.len() + 1);
    prefix.extend_from_slice(table.as_bytes());
    prefix.push(b'/');
    prefix
}


fn block_key(table: &str, height: Height) -> Vec<u8> {
    let mut key = table_prefix(table);
    key.extend_from_slice(&encode_height(height));
    key
}


fn find_max_height(db: &DB, table: &str) -> anyhow::Result<Option<Height>> {
    let prefix = table_prefix(table);
    let mut upper = prefix.clone();
    upper.extend_from_slice(&[0xff; 8]);

    let mut it = db.raw_iterator();
    it.seek_for_prev(&upper);
    it.status()?;

    let Some(key) = it.key() else {
        return Ok(None)
    };

    match key.strip_prefix(prefix.as_slice()) {
        Some(encoded) if encoded.len() == 8 => {
            let mut bytes = [0; 8];
            bytes.copy_from_slice(encoded);
            Ok(Some(decode_height(bytes)))
        },
        _ => Ok(None)
    }
}


#[async_trait]
impl Sink for RocksSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, table: &str, pack: &Pack) -> anyhow::Result<()> {
        let mut batch = WriteBatch::default();
        for block in pack.blocks() {
            batch.put(block_key(table, block.height()), block_json_line(block)?);
        }

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.write(batch))
            .await
            .context("rocksdb write task panicked")??;

        Ok(())
    }

    fn supports_checkpoint(&self) -> bool {
        true
    }

    async fn max_persisted_height(&self, table: &str) -> anyhow::Result<Option<Height>> {
        let db = self.db.clone();
        let table = table.to_string();
        tokio::task::spawn_blocking(move || find_max_height(&db, &table))
            .await
            .context("rocksdb query task panicked")?
    }
}
