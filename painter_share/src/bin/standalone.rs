// Serves a self-driving demo painting: a synthetic figure wanders the canvas
// and a fresh snapshot is published every couple of seconds.

use painter_engine::core_modules::skeleton::{Keypoint, Skeleton};
use painter_engine::{Session, SessionConfig};
use painter_share::{ServerConfig, SnapshotBus, SnapshotFormat, encode_snapshot, start_server};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(33);
const SNAPSHOT_EVERY: u64 = 60;

/// A figure whose every keypoint follows a slow Lissajous path in 640x480.
fn wanderer(t: f64) -> Skeleton {
    let (x, y) = (320.0 + 220.0 * (t * 0.7).sin(), 240.0 + 160.0 * (t * 1.1).sin());
    let keypoints = (0..17)
        .map(|i| match i {
            5 => Keypoint::new(x - 45.0, y - 60.0, 0.9),
            6 => Keypoint::new(x + 45.0, y - 60.0, 0.9),
            _ => Keypoint::new(x, y, 0.9),
        })
        .collect();
    Skeleton::new(0.8, keypoints)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bus = SnapshotBus::new(2);
    let server = start_server(bus.clone(), ServerConfig::from_env()).await?;
    info!(url = %server.share_url, "demo painting is being shared");

    let mut session = Session::new(SessionConfig::default())?;
    let mut interval = tokio::time::interval(FRAME);
    let mut now_ms = 0u64;
    loop {
        interval.tick().await;
        now_ms += FRAME.as_millis() as u64;
        let report = session.tick(&[wanderer(now_ms as f64 / 1000.0)], now_ms);

        if report.frame % SNAPSHOT_EVERY == 0 {
            let packet = encode_snapshot(&session.compose(None), SnapshotFormat::Png, now_ms)?;
            bus.publish(packet);
        }
        if server.handle.is_finished() {
            break;
        }
    }
    Ok(())
}
