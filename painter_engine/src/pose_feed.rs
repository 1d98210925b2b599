// THEORY:
// The pose estimator and the render loop run at different cadences. The
// estimator delivers a fresh list of skeletons whenever it finishes a frame;
// the render loop wants "whatever is newest" at the start of each tick. Only
// the newest result matters, so there is no queue and no backpressure: the
// feed is a single slot the producer overwrites and the consumer reads.
//
// `tokio::sync::watch` is exactly that slot. Readers may see the same list
// across several ticks (stale but valid), and a list may hold more skeletons
// than there are painters; the session tolerates both.

use crate::core_modules::skeleton::Skeleton;
use crate::error::{EngineError, EngineResult};
use std::sync::Arc;
use tokio::sync::watch;

/// One estimator result, replaced wholesale on every publish.
#[derive(Debug, Clone, Default)]
pub struct PoseFrame {
    /// Incremented on every publish; 0 means nothing has arrived yet.
    pub sequence: u64,
    pub skeletons: Arc<Vec<Skeleton>>,
}

/// Producer half, owned by whatever wraps the pose estimator.
pub struct PoseFeed {
    tx: watch::Sender<PoseFrame>,
}

/// Consumer half, read by the render loop at the start of each tick.
#[derive(Clone)]
pub struct PoseReader {
    rx: watch::Receiver<PoseFrame>,
}

impl PoseFeed {
    pub fn channel() -> (PoseFeed, PoseReader) {
        let (tx, rx) = watch::channel(PoseFrame::default());
        (PoseFeed { tx }, PoseReader { rx })
    }

    /// Overwrites the slot with a new result and returns its sequence number.
    pub fn publish(&self, skeletons: Vec<Skeleton>) -> u64 {
        let skeletons = Arc::new(skeletons);
        let mut sequence = 0;
        self.tx.send_modify(|frame| {
            frame.sequence += 1;
            frame.skeletons = skeletons;
            sequence = frame.sequence;
        });
        sequence
    }

    pub fn subscribe(&self) -> PoseReader {
        PoseReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl PoseReader {
    /// The newest result, without waiting.
    pub fn latest(&self) -> PoseFrame {
        self.rx.borrow().clone()
    }

    /// Waits for a result newer than the last one this reader saw.
    pub async fn changed(&mut self) -> EngineResult<PoseFrame> {
        self.rx.changed().await.map_err(|_| EngineError::FeedClosed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::skeleton::Keypoint;

    fn poses(n: usize) -> Vec<Skeleton> {
        (0..n)
            .map(|i| Skeleton::new(0.5, vec![Keypoint::new(i as f64, 0.0, 0.9)]))
            .collect()
    }

    #[test]
    fn empty_until_first_publish() {
        let (_feed, reader) = PoseFeed::channel();
        let frame = reader.latest();
        assert_eq!(frame.sequence, 0);
        assert!(frame.skeletons.is_empty());
    }

    #[test]
    fn latest_wins() {
        let (feed, reader) = PoseFeed::channel();
        feed.publish(poses(1));
        feed.publish(poses(3));
        let frame = reader.latest();
        assert_eq!(frame.sequence, 2);
        assert_eq!(frame.skeletons.len(), 3);
        // Reading again without a publish returns the same (stale) frame.
        assert_eq!(reader.latest().sequence, 2);
    }

    #[tokio::test]
    async fn changed_wakes_on_publish_and_reports_closure() {
        let (feed, mut reader) = PoseFeed::channel();
        let producer = tokio::spawn(async move {
            feed.publish(poses(2));
        });
        let frame = reader.changed().await.unwrap();
        assert_eq!(frame.skeletons.len(), 2);
        producer.await.unwrap();

        assert_eq!(reader.changed().await.unwrap_err(), EngineError::FeedClosed);
    }
}
