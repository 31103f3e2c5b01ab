use crate::config::EndBound;
use crate::error::ExportError;
use crate::metrics;
use cx_data_client::DataClient;
use cx_primitives::Height;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// Produces the heights to fetch.
#[derive(Debug, Clone)]
pub enum IndexSource {
    /// Every height in `[first, end)`
    Bounded {
        first: Height,
        end: Height
    },
    /// Heights up to `tip + offset`, re-polling the tip forever
    Continuous {
        first: Height,
        offset: Height,
        poll_interval: Duration
    }
}


impl IndexSource {
    pub fn new(first: Height, end: EndBound, poll_interval: Duration) -> Self {
        match end {
            EndBound::Bounded(end) => IndexSource::Bounded { first, end },
            EndBound::Tip { offset } => IndexSource::Continuous {
                first,
                offset,
                poll_interval
            }
        }
    }

    /// Feeds heights into `queue` until the range is exhausted or `cancel` fires.
    ///
    /// Dropping `queue` on return is the end-of-input signal.
    pub async fn run<C: DataClient + ?Sized>(
        self,
        client: &C,
        queue: mpsc::Sender<Height>,
        cancel: CancellationToken
    ) -> anyhow::Result<()>
    {
        match self {
            IndexSource::Bounded { first, end } => {
                for height in first..end {
                    if !enqueue(&queue, height, &cancel).await {
                        return Ok(())
                    }
                }
                debug!("all heights below {} were enqueued", end);
                Ok(())
            },
            IndexSource::Continuous { first, offset, poll_interval } => {
                let mut next = first;
                loop {
                    let tip = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(()),
                        res = client.current_height() => res
                    };
                    match tip {
                        Ok(tip) => {
                            let target = tip + offset;
                            metrics::CHAIN_HEIGHT.set(tip);
                            if next < target {
                                debug!(tip, target, "enqueueing heights {}-{}", next, target - 1);
                            }
                            while next < target {
                                if !enqueue(&queue, next, &cancel).await {
                                    return Ok(())
                                }
                                next += 1;
                            }
                        },
                        Err(reason) => {
                            let err = ExportError::SourceUnavailable { reason };
                            warn!(
                                "{}, will try again in {} sec",
                                err,
                                poll_interval.as_secs_f64()
                            );
                        }
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("tip polling stopped");
                            return Ok(())
                        },
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
            }
        }
    }
}


async fn enqueue(
    queue: &mpsc::Sender<Height>,
    height: Height,
    cancel: &CancellationToken
) -> bool
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        res = queue.send(height) => res.is_ok()
    }
}
