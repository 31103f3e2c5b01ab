use anyhow::{anyhow, ensure};
use cx_primitives::Height;
use tokio::sync::{mpsc, watch};


/// Serializes admissions of concurrently fetched items by height.
///
/// A caller holding height `h` is let through only once every height below
/// `h` was admitted. The shared counter is advanced by exactly one on each
/// admission, so the output receives items in strictly increasing order
/// without gaps. A late lower height holds back every higher one.
pub struct OrderingGate {
    next: watch::Sender<Height>
}


impl OrderingGate {
    pub fn new(first: Height) -> Self {
        Self {
            next: watch::Sender::new(first)
        }
    }

    pub fn next_expected(&self) -> Height {
        *self.next.borrow()
    }

    /// Waits for `height` to become due, pushes `item` (if any) to `output`
    /// and passes the turn to `height + 1`.
    ///
    /// `None` admits the height without output, which is how skipped blocks
    /// keep the sequence moving.
    pub async fn admit<T>(
        &self,
        height: Height,
        item: Option<T>,
        output: &mpsc::Sender<T>
    ) -> anyhow::Result<()>
    {
        let mut turn = self.next.subscribe();
        let next = *turn.wait_for(|next| *next >= height).await?;
        ensure!(
            next == height,
            "height {} was already admitted, next expected is {}",
            height,
            next
        );

        if let Some(item) = item {
            output.send(item).await.map_err(|_| {
                anyhow!("output queue was closed before block {} was admitted", height)
            })?;
        }

        self.next.send_modify(|next| *next += 1);
        Ok(())
    }
}
