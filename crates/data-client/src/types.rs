use crate::RawBlock;
use cx_primitives::Height;
use futures::future::BoxFuture;
use std::fmt::Debug;


/// Random access to a chain, one block at a time.
pub trait DataClient: Debug + Send + Sync {
    /// Height of the latest block known to the source
    fn current_height(&self) -> BoxFuture<'_, anyhow::Result<Height>>;

    fn fetch(&self, height: Height) -> BoxFuture<'_, anyhow::Result<RawBlock>>;
}
