use crate::{DataClient, RawBlock};
use cx_primitives::Height;
use futures::future::BoxFuture;
use std::sync::Arc;


pub type DataClientRef = Arc<dyn DataClient>;


impl<C: DataClient + ?Sized> DataClient for Arc<C> {
    fn current_height(&self) -> BoxFuture<'_, anyhow::Result<Height>> {
        self.as_ref().current_height()
    }

    fn fetch(&self, height: Height) -> BoxFuture<'_, anyhow::Result<RawBlock>> {
        self.as_ref().fetch(height)
    }
}


pub fn make_data_client_ref<C: DataClient + 'static>(client: C) -> DataClientRef {
    Arc::new(client)
}
