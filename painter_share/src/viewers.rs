// THEORY:
// Every connected viewer is an independent output sink. A snapshot broadcast
// is best-effort: each sink gets its own send, all sends run concurrently, and
// one viewer failing never stops the others from receiving the picture.
// Failures are logged, not returned. A sink that reports itself closed is
// dropped from the set so the next broadcast does not try it again.

use crate::error::{ShareError, ShareResult};
use crate::snapshot::SnapshotPacket;
use futures_util::future::{BoxFuture, join_all};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// A remote viewer able to receive snapshot payloads.
pub trait SnapshotSink: Send + Sync {
    fn id(&self) -> &str;

    /// Sends one serialized payload. `ShareError::SinkClosed` marks the sink
    /// for removal.
    fn send<'a>(&'a self, payload: Arc<str>) -> BoxFuture<'a, ShareResult<()>>;
}

/// Per-broadcast outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
    pub pruned: usize,
}

#[derive(Default)]
pub struct ViewerSet {
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl ViewerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Box<dyn SnapshotSink>) {
        debug!(viewer = %sink.id(), "viewer added");
        self.sinks.push(sink);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|s| s.id() != id);
        before != self.sinks.len()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Sends `packet` to every viewer, pruning the ones that are gone.
    pub async fn broadcast(&mut self, packet: &SnapshotPacket) -> ShareResult<BroadcastReport> {
        let payload: Arc<str> = packet.payload_json()?.into();
        let outcomes = join_all(self.sinks.iter().map(|s| s.send(payload.clone()))).await;

        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();
        for (sink, outcome) in self.sinks.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(viewer = %sink.id(), error = %e, "snapshot delivery failed");
                    report.failed += 1;
                    if e.is_closed() {
                        closed.push(sink.id().to_owned());
                    }
                }
            }
        }

        if !closed.is_empty() {
            self.sinks.retain(|s| !closed.iter().any(|id| id == s.id()));
            report.pruned = closed.len();
        }
        Ok(report)
    }
}

/// A sink backed by an in-process channel. The receiving half is typically
/// drained by a transport task that owns the real peer connection. Sends never
/// wait: a full queue fails that one delivery and leaves the sink in place.
pub struct ChannelSink {
    id: String,
    tx: mpsc::Sender<Arc<str>>,
}

impl ChannelSink {
    pub fn new(id: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id: id.into(), tx }, rx)
    }
}

impl SnapshotSink for ChannelSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn send<'a>(&'a self, payload: Arc<str>) -> BoxFuture<'a, ShareResult<()>> {
        let sent = match self.tx.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(ShareError::transport(format!("viewer {} queue is full", self.id)))
            }
            Err(TrySendError::Closed(_)) => Err(ShareError::SinkClosed {
                viewer: self.id.clone(),
            }),
        };
        Box::pin(async move { sent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotFormat, encode_snapshot};
    use image::RgbaImage;

    struct FlakySink;

    impl SnapshotSink for FlakySink {
        fn id(&self) -> &str {
            "flaky"
        }

        fn send<'a>(&'a self, _payload: Arc<str>) -> BoxFuture<'a, ShareResult<()>> {
            Box::pin(async { Err(ShareError::transport("buffer full")) })
        }
    }

    fn packet() -> SnapshotPacket {
        encode_snapshot(&RgbaImage::new(4, 4), SnapshotFormat::Png, 0).unwrap()
    }

    #[tokio::test]
    async fn every_open_viewer_receives_the_payload() {
        let mut viewers = ViewerSet::new();
        let (a, mut rx_a) = ChannelSink::new("a", 1);
        let (b, mut rx_b) = ChannelSink::new("b", 1);
        viewers.add(Box::new(a));
        viewers.add(Box::new(b));

        let report = viewers.broadcast(&packet()).await.unwrap();
        assert_eq!(report.delivered, 2);

        let expected = packet().payload_json().unwrap();
        assert_eq!(&*rx_a.recv().await.unwrap(), expected);
        assert_eq!(&*rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn failures_are_isolated_and_closed_viewers_pruned() {
        let mut viewers = ViewerSet::new();
        let (open, mut rx_open) = ChannelSink::new("open", 1);
        let (gone, rx_gone) = ChannelSink::new("gone", 1);
        drop(rx_gone);
        viewers.add(Box::new(open));
        viewers.add(Box::new(gone));
        viewers.add(Box::new(FlakySink));

        let report = viewers.broadcast(&packet()).await.unwrap();
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                failed: 2,
                pruned: 1
            }
        );
        assert!(rx_open.recv().await.is_some());

        // The flaky viewer is kept for the next attempt; the closed one is not.
        assert_eq!(viewers.len(), 2);
        assert!(!viewers.remove("gone"));
        assert!(viewers.remove("flaky"));
    }

    #[tokio::test]
    async fn a_backed_up_viewer_does_not_hold_up_the_rest() {
        let mut viewers = ViewerSet::new();
        let (slow, _rx_slow) = ChannelSink::new("slow", 1);
        let (fast, mut rx_fast) = ChannelSink::new("fast", 1);
        viewers.add(Box::new(slow));
        viewers.add(Box::new(fast));

        viewers.broadcast(&packet()).await.unwrap();
        assert!(rx_fast.recv().await.is_some());

        let report = tokio::time::timeout(std::time::Duration::from_secs(1), viewers.broadcast(&packet()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                failed: 1,
                pruned: 0
            }
        );
        assert!(rx_fast.recv().await.is_some());
        assert_eq!(viewers.len(), 2);
    }

    #[tokio::test]
    async fn broadcasting_to_nobody_is_fine() {
        let mut viewers = ViewerSet::new();
        assert_eq!(viewers.broadcast(&packet()).await.unwrap(), BroadcastReport::default());
    }
}
