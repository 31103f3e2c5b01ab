use crate::error::ExportError;
use crate::gate::OrderingGate;
use crate::index_source::IndexSource;
use crate::metrics;
use anyhow::anyhow;
use cx_data_client::{DataClient, DataClientRef, RawBlock};
use cx_primitives::{Block, Height};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};


#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub threads: usize,
    pub ignore_errors: bool,
    pub index_queue_size: usize
}


/// Index producer plus `threads` fetch workers feeding the ordering gate.
///
/// The first failure cancels everything else and becomes the result of [FetchPool::join].
/// Cancellation from outside is a normal stop.
pub struct FetchPool {
    handle: JoinHandle<anyhow::Result<()>>
}


impl FetchPool {
    pub fn start(
        client: DataClientRef,
        source: IndexSource,
        gate: Arc<OrderingGate>,
        output: mpsc::Sender<RawBlock>,
        options: FetchOptions,
        cancel: CancellationToken
    ) -> Self
    {
        let handle = tokio::spawn(supervise(client, source, gate, output, options, cancel));
        Self { handle }
    }

    pub async fn join(self) -> anyhow::Result<()> {
        self.handle.await?
    }
}


async fn supervise(
    client: DataClientRef,
    source: IndexSource,
    gate: Arc<OrderingGate>,
    output: mpsc::Sender<RawBlock>,
    options: FetchOptions,
    cancel: CancellationToken
) -> anyhow::Result<()>
{
    let mut tasks = JoinSet::new();
    let (index_tx, index_rx) = mpsc::channel(options.index_queue_size);

    tasks.spawn({
        let client = client.clone();
        let cancel = cancel.clone();
        async move {
            source.run(client.as_ref(), index_tx, cancel).await
        }
    });

    let queue = Arc::new(Mutex::new(index_rx));
    for worker in 0..options.threads {
        let ctx = Worker {
            id: worker,
            client: client.clone(),
            queue: queue.clone(),
            gate: gate.clone(),
            output: output.clone(),
            ignore_errors: options.ignore_errors,
            cancel: cancel.clone()
        };
        tasks.spawn(ctx.run());
    }
    // workers own the output now, the stream ends once all of them are gone
    drop(output);

    let mut result = Ok(());
    while let Some(task_result) = tasks.join_next().await {
        let task_result = task_result
            .map_err(|err| anyhow!("fetch task terminated abnormally: {}", err))
            .and_then(|res| res);

        if let Err(err) = task_result {
            if result.is_ok() {
                error!("{:#}", err);
                cancel.cancel();
                result = Err(err);
            } else {
                debug!("error after cancellation: {:#}", err);
            }
        }
    }
    result
}


struct Worker {
    id: usize,
    client: DataClientRef,
    queue: Arc<Mutex<mpsc::Receiver<Height>>>,
    gate: Arc<OrderingGate>,
    output: mpsc::Sender<RawBlock>,
    ignore_errors: bool,
    cancel: CancellationToken
}


impl Worker {
    async fn run(self) -> anyhow::Result<()> {
        loop {
            let height = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                height = self.claim() => match height {
                    Some(height) => height,
                    None => {
                        debug!(worker = self.id, "index queue is exhausted");
                        return Ok(())
                    }
                }
            };

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                res = self.fetch(height) => res
            };

            let block = match fetched {
                Ok(block) => Some(block),
                Err(reason) => {
                    metrics::FETCH_ERRORS.inc();
                    if !self.ignore_errors {
                        return Err(ExportError::FetchFailed { height, reason }.into())
                    }
                    warn!(worker = self.id, "skipping block {}: {:#}", height, reason);
                    metrics::SKIPPED_BLOCKS.inc();
                    None
                }
            };

            let admission = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                res = self.gate.admit(height, block, &self.output) => res
            };

            if let Err(err) = admission {
                if self.cancel.is_cancelled() {
                    return Ok(())
                }
                return Err(err)
            }
        }
    }

    async fn claim(&self) -> Option<Height> {
        self.queue.lock().await.recv().await
    }

    async fn fetch(&self, height: Height) -> anyhow::Result<RawBlock> {
        let block = self.client.fetch(height).await?;
        anyhow::ensure!(
            block.height() == height,
            "source returned block {} instead of {}",
            block.height(),
            height
        );
        Ok(block)
    }
}
