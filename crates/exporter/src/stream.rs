use crate::metrics;
use crate::pack::Pack;
use crate::progress::ProgressObserver;
use async_stream::stream;
use cx_data_client::RawBlock;
use cx_primitives::{Block, Height};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;


/// Pulls ordered blocks out of the gate's output queue.
///
/// With `end` set the stream stops right after block `end - 1`, otherwise it
/// lasts until the queue is closed. The observer is told about the last block every
/// `progress_interval` blocks and once more at the end.
pub fn ordered_blocks(
    mut output: mpsc::Receiver<RawBlock>,
    end: Option<Height>,
    mut progress: Box<dyn ProgressObserver>,
    progress_interval: usize
) -> impl Stream<Item = RawBlock>
{
    stream! {
        let mut pulled = 0usize;
        let mut last_reported = None;
        let mut last_height = None;

        while let Some(block) = output.recv().await {
            let height = block.height();
            pulled += 1;
            last_height = Some(height);
            metrics::LAST_BLOCK.set(height);

            if pulled % progress_interval == 0 {
                progress.report(height);
                last_reported = Some(height);
            }

            yield block;

            if end.map_or(false, |end| height + 1 >= end) {
                break
            }
        }

        if let Some(height) = last_height {
            if last_reported != Some(height) {
                progress.report(height);
            }
        }
    }
}


/// Groups consecutive blocks into packs of `pack_size`, the last one may be shorter
pub fn packs<S>(blocks: S, pack_size: usize) -> impl Stream<Item = Pack>
where
    S: Stream<Item = RawBlock>
{
    blocks.chunks(pack_size).map(Pack::new)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Reports(Arc<Mutex<Vec<Height>>>);

    impl ProgressObserver for Reports {
        fn report(&mut self, height: Height) {
            self.0.lock().unwrap().push(height)
        }
    }

    fn block(height: Height) -> RawBlock {
        let payload = serde_json::value::RawValue::from_string("{}".to_string()).unwrap();
        RawBlock::new(height, format!("0x{:x}", height), format!("0x{:x}", height - 1), None, payload)
    }

    #[tokio::test]
    async fn stops_at_end_and_reports_progress() {
        let (tx, rx) = mpsc::channel(32);
        for h in 100..110 {
            tx.send(block(h)).await.unwrap();
        }

        let reports = Reports::default();
        let heights: Vec<_> = ordered_blocks(rx, Some(105), Box::new(reports.clone()), 2)
            .map(|b| b.height())
            .collect()
            .await;

        assert_eq!(heights, vec![100, 101, 102, 103, 104]);
        assert_eq!(*reports.0.lock().unwrap(), vec![101, 103, 104]);
        assert!(!tx.is_closed());
    }

    #[tokio::test]
    async fn batches_with_short_tail() {
        let (tx, rx) = mpsc::channel(32);
        for h in 0..7 {
            tx.send(block(h)).await.unwrap();
        }
        drop(tx);

        let packs: Vec<Vec<Height>> = packs(ordered_blocks(rx, None, Box::new(Reports::default()), 100), 3)
            .map(|p| p.heights().collect())
            .collect()
            .await;

        assert_eq!(packs, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }
}
