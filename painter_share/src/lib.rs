// THEORY:
// `painter_share` turns the installation's canvas into something visitors can
// take home. The render loop encodes a snapshot and publishes it on the
// `SnapshotBus`; everything downstream (the WebRTC server, tests, a future
// transport) subscribes to the bus and never touches the session itself.
//
// The bus keeps two views of the same stream: a broadcast channel for viewers
// that are already connected, and a single "latest" slot for viewers that
// connect later and need something to show straight away.

pub mod error;
pub mod link;
pub mod snapshot;
pub mod viewers;

#[cfg(feature = "web")]
mod server;

pub use error::{ShareError, ShareResult};
pub use link::{PeerId, peer_id_from_url, share_url};
pub use snapshot::{SnapshotFormat, SnapshotPacket, SnapshotPayload, encode_snapshot};
pub use viewers::{BroadcastReport, ChannelSink, SnapshotSink, ViewerSet};

#[cfg(feature = "web")]
pub use server::start_server;

use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Delay between a viewer connecting and the first snapshot it is sent.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct SnapshotBus {
    snapshots_tx: broadcast::Sender<SnapshotPacket>,
    latest_tx: watch::Sender<Option<SnapshotPacket>>,
}

impl SnapshotBus {
    pub fn new(capacity: usize) -> Self {
        let (snapshots_tx, _) = broadcast::channel(capacity.max(1));
        let (latest_tx, _) = watch::channel(None);
        Self {
            snapshots_tx,
            latest_tx,
        }
    }

    /// Publishes a snapshot, returning how many live subscribers saw it.
    pub fn publish(&self, packet: SnapshotPacket) -> usize {
        self.latest_tx.send_replace(Some(packet.clone()));
        self.snapshots_tx.send(packet).unwrap_or(0)
    }

    pub fn latest(&self) -> Option<SnapshotPacket> {
        self.latest_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotPacket> {
        self.snapshots_tx.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub nat_public_ip: Option<String>,
    /// Inclusive UDP port range for ICE candidates.
    pub udp_port_range: Option<(u16, u16)>,
    /// Externally reachable base URL of the viewer page, when the bind address
    /// is not what visitors' phones can reach.
    pub public_url: Option<String>,
    pub settle_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            nat_public_ip: None,
            udp_port_range: None,
            public_url: None,
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PP_BIND`, `PP_NAT_IP`, `PP_ICE_PORT_RANGE` and
    /// `PP_PUBLIC_URL`. Empty variables are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut cfg = Self::default();
        if let Some(bind) = var("PP_BIND") {
            cfg.bind_addr = bind;
        }
        cfg.nat_public_ip = var("PP_NAT_IP");
        cfg.udp_port_range = var("PP_ICE_PORT_RANGE").and_then(|r| parse_port_range(&r));
        cfg.public_url = var("PP_PUBLIC_URL");
        cfg
    }

    /// Base URL of the viewer page, before the peer id is attached.
    pub fn viewer_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://{}/view", self.bind_addr),
        }
    }
}

/// Parses `"start-end"`; rejects reversed ranges.
pub fn parse_port_range(range: &str) -> Option<(u16, u16)> {
    let (start, end) = range.split_once('-')?;
    let start = start.trim().parse::<u16>().ok()?;
    let end = end.trim().parse::<u16>().ok()?;
    (start <= end).then_some((start, end))
}

/// A running share server and the link that points visitors at it.
pub struct ShareServer {
    pub handle: tokio::task::JoinHandle<()>,
    pub peer: PeerId,
    pub share_url: String,
}

#[cfg(not(feature = "web"))]
pub async fn start_server(_bus: SnapshotBus, _cfg: ServerConfig) -> anyhow::Result<ShareServer> {
    Err(anyhow::anyhow!("web feature not enabled for painter_share"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::collections::HashMap;

    fn packet(ts: u64) -> SnapshotPacket {
        encode_snapshot(&RgbaImage::new(2, 2), SnapshotFormat::Png, ts).unwrap()
    }

    #[test]
    fn late_subscribers_still_see_the_latest_snapshot() {
        let bus = SnapshotBus::new(2);
        assert!(bus.latest().is_none());
        assert_eq!(bus.publish(packet(1)), 0);
        assert_eq!(bus.publish(packet(2)), 0);
        assert_eq!(bus.latest().unwrap().ts_millis, 2);
    }

    #[tokio::test]
    async fn live_subscribers_receive_every_publish() {
        let bus = SnapshotBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(packet(7)), 1);
        assert_eq!(rx.recv().await.unwrap().ts_millis, 7);
    }

    #[test]
    fn env_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PP_BIND", "0.0.0.0:8080"),
            ("PP_NAT_IP", "203.0.113.7"),
            ("PP_ICE_PORT_RANGE", "50000-50100"),
            ("PP_PUBLIC_URL", ""),
        ]);
        let cfg = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.nat_public_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(cfg.udp_port_range, Some((50000, 50100)));
        assert_eq!(cfg.public_url, None);
        assert_eq!(cfg.viewer_base_url(), "http://0.0.0.0:8080/view");
        assert_eq!(cfg.settle_delay, Duration::from_millis(500));
    }

    #[test]
    fn port_ranges_must_be_ordered_numbers() {
        assert_eq!(parse_port_range("10-20"), Some((10, 20)));
        assert_eq!(parse_port_range("20-10"), None);
        assert_eq!(parse_port_range("ten-20"), None);
        assert_eq!(parse_port_range("10"), None);
    }
}
