//! Pose painter installation.
//!
//! Replays a recorded pose stream through a painting session the way the live
//! installation runs: poses arrive at the recording's own cadence through the
//! latest-wins pose feed, the session renders at a fixed frame rate, and
//! visitor actions (background cycling, canvas reset, sharing) are applied as
//! they come up. The finished painting is written as a PNG.

mod recording;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use painter_engine::pose_feed::{PoseFeed, PoseReader};
use painter_engine::{Session, SessionConfig};
use painter_share::{ServerConfig, SnapshotBus, SnapshotFormat, encode_snapshot, start_server};
use recording::{Action, Event, Recording, TimedEvent};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "installation")]
#[command(about = "Replay a pose recording through the pose painter and save the painting")]
struct Cli {
    /// JSON-lines pose recording to replay
    recording: PathBuf,

    /// Where to write the finished painting (PNG)
    #[arg(short, long, default_value = "painting.png")]
    output: PathBuf,

    /// Session configuration (JSON); fields it omits keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Canvas width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Number of painters
    #[arg(long)]
    agents: Option<usize>,

    /// Random seed for roles, colors and splatter
    #[arg(long)]
    seed: Option<u64>,

    /// Render frame rate
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Replay on a virtual clock as fast as possible
    #[arg(long)]
    fast: bool,

    /// Share snapshots with viewers over WebRTC while replaying
    #[arg(long)]
    serve: bool,

    /// Share server bind address
    #[arg(long, env = "PP_BIND")]
    bind: Option<String>,

    /// Seconds between automatic snapshot refreshes while serving
    #[arg(long, default_value = "5")]
    snapshot_every: u64,

    /// Snapshot encoding
    #[arg(long, value_enum, default_value_t = Format::Png)]
    format: Format,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Png,
    Jpeg,
}

impl From<Format> for SnapshotFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => SnapshotFormat::Png,
            Format::Jpeg => SnapshotFormat::Jpeg,
        }
    }
}

/// File values first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SessionConfig::default(),
    };
    if let Some(width) = cli.width {
        config.canvas_width = width;
    }
    if let Some(height) = cli.height {
        config.canvas_height = height;
    }
    if let Some(agents) = cli.agents {
        config.agent_count = agents;
    }
    config.validate()?;
    Ok(config)
}

/// The session plus everything hanging off its output.
struct Stage {
    session: Session,
    bus: SnapshotBus,
    format: SnapshotFormat,
    snapshot_every_ms: u64,
    last_snapshot_ms: u64,
}

impl Stage {
    fn apply(&mut self, action: Action, now_ms: u64) -> Result<()> {
        match action {
            Action::CycleBackground => {
                let mode = self.session.cycle_background(now_ms);
                info!(?mode, at = now_ms, "background cycled");
            }
            Action::ResetCanvas => self.session.reset_canvas(),
            Action::Share => {
                let viewers = self.snapshot(now_ms)?;
                info!(at = now_ms, viewers, "painting shared");
            }
        }
        Ok(())
    }

    fn frame(&mut self, reader: &PoseReader, now_ms: u64) -> Result<()> {
        let poses = reader.latest();
        let report = self.session.tick(&poses.skeletons, now_ms);
        if report.background_reset {
            debug!(at = now_ms, "background returned to light");
        }
        if now_ms.saturating_sub(self.last_snapshot_ms) >= self.snapshot_every_ms {
            self.snapshot(now_ms)?;
        }
        Ok(())
    }

    fn snapshot(&mut self, now_ms: u64) -> Result<usize> {
        let packet = encode_snapshot(&self.session.compose(None), self.format, now_ms)?;
        self.last_snapshot_ms = now_ms;
        Ok(self.bus.publish(packet))
    }
}

/// Replays on a virtual clock: deterministic for a given seed and recording.
fn run_fast(stage: &mut Stage, recording: &Recording, frame_ms: u64) -> Result<()> {
    let (feed, reader) = PoseFeed::channel();
    let mut events = recording.events.iter().peekable();
    let mut now_ms = 0;
    let end_ms = recording.duration_ms() + frame_ms;
    while now_ms < end_ms {
        while let Some(TimedEvent { event, .. }) = events.next_if(|e| e.t <= now_ms) {
            match event {
                Event::Poses(poses) => {
                    feed.publish(poses.clone());
                }
                Event::Action(action) => stage.apply(*action, now_ms)?,
            }
        }
        stage.frame(&reader, now_ms)?;
        now_ms += frame_ms;
    }
    Ok(())
}

/// Publishes poses at the recording's cadence, like a live estimator would.
async fn produce(events: Vec<TimedEvent>, feed: PoseFeed, actions: mpsc::UnboundedSender<Action>, start: Instant) {
    for TimedEvent { t, event } in events {
        tokio::time::sleep_until(start + Duration::from_millis(t)).await;
        match event {
            Event::Poses(poses) => {
                feed.publish(poses);
            }
            Event::Action(action) => {
                if actions.send(action).is_err() {
                    break;
                }
            }
        }
    }
}

async fn run_realtime(stage: &mut Stage, recording: Recording, frame_ms: u64) -> Result<()> {
    let (feed, reader) = PoseFeed::channel();
    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let duration_ms = recording.duration_ms();
    let start = Instant::now();
    let producer = tokio::spawn(produce(recording.events, feed, action_tx, start));

    let mut interval = tokio::time::interval(Duration::from_millis(frame_ms));
    loop {
        interval.tick().await;
        let now_ms = start.elapsed().as_millis() as u64;
        while let Ok(action) = action_rx.try_recv() {
            stage.apply(action, now_ms)?;
        }
        stage.frame(&reader, now_ms)?;
        if producer.is_finished() && now_ms >= duration_ms {
            break;
        }
    }
    producer.await.context("pose producer panicked")?;
    while let Ok(action) = action_rx.try_recv() {
        stage.apply(action, duration_ms)?;
    }
    Ok(())
}

fn save(session: &Session, path: &Path) -> Result<()> {
    session
        .compose(None)
        .save(path)
        .with_context(|| format!("writing painting to {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    let file = File::open(&cli.recording).with_context(|| format!("opening recording {}", cli.recording.display()))?;
    let recording = Recording::parse(BufReader::new(file))?;
    let duration_ms = recording.duration_ms();
    info!(events = recording.events.len(), duration_ms, "recording loaded");

    let session = match cli.seed {
        Some(seed) => Session::with_seed(config, seed)?,
        None => Session::new(config)?,
    };
    let mut stage = Stage {
        session,
        bus: SnapshotBus::new(2),
        format: cli.format.into(),
        snapshot_every_ms: cli.snapshot_every.max(1) * 1000,
        last_snapshot_ms: 0,
    };

    let server = if cli.serve {
        let mut server_cfg = ServerConfig::from_env();
        if let Some(bind) = cli.bind.clone() {
            server_cfg.bind_addr = bind;
        }
        let server = start_server(stage.bus.clone(), server_cfg).await?;
        info!(url = %server.share_url, "scan to take the painting home");
        Some(server)
    } else {
        None
    };

    let frame_ms = (1000 / cli.fps.max(1)).max(1) as u64;
    if cli.fast {
        run_fast(&mut stage, &recording, frame_ms)?;
    } else {
        run_realtime(&mut stage, recording, frame_ms).await?;
    }

    save(&stage.session, &cli.output)?;
    info!(
        frames = stage.session.frame_count(),
        painted_pixels = stage.session.layer().painted_pixels(),
        output = %cli.output.display(),
        "painting saved"
    );

    if let Some(server) = server {
        stage.snapshot(duration_ms)?;
        info!("replay finished; still sharing, press ctrl-c to stop");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = server.handle => warn!("share server stopped"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use painter_engine::core_modules::background::BackgroundMode;
    use painter_engine::core_modules::skeleton::{Keypoint, Skeleton};

    const FRAME_MS: u64 = 16;

    fn stage(snapshot_every_ms: u64) -> Stage {
        let config = SessionConfig {
            canvas_width: 160,
            canvas_height: 120,
            ..SessionConfig::default()
        };
        Stage {
            session: Session::with_seed(config, 5).unwrap(),
            bus: SnapshotBus::new(16),
            format: SnapshotFormat::Png,
            snapshot_every_ms,
            last_snapshot_ms: 0,
        }
    }

    /// A confident visitor standing at the middle of the estimator frame.
    fn visitor() -> Skeleton {
        let mut keypoints = vec![Keypoint::new(320.0, 240.0, 0.9); 17];
        keypoints[5] = Keypoint::new(280.0, 240.0, 0.9);
        keypoints[6] = Keypoint::new(360.0, 240.0, 0.9);
        Skeleton::new(0.9, keypoints)
    }

    fn at(t: u64, event: Event) -> TimedEvent {
        TimedEvent { t, event }
    }

    #[test]
    fn share_action_publishes_a_snapshot() {
        let mut stage = stage(60_000);
        let recording = Recording {
            events: vec![at(0, Event::Poses(vec![])), at(100, Event::Action(Action::Share))],
        };
        run_fast(&mut stage, &recording, FRAME_MS).unwrap();

        let packet = stage.bus.latest().unwrap();
        assert_eq!(packet.ts_millis, 112);
        assert_eq!((packet.width, packet.height), (160, 120));
    }

    #[test]
    fn reset_action_wipes_the_painting() {
        let still = vec![
            at(0, Event::Poses(vec![visitor()])),
            at(2_000, Event::Poses(vec![])),
        ];

        let mut kept = stage(60_000);
        run_fast(&mut kept, &Recording { events: still.clone() }, FRAME_MS).unwrap();
        assert!(kept.session.layer().painted_pixels() > 0);

        let mut events = still;
        events.push(at(2_000, Event::Action(Action::ResetCanvas)));
        let mut wiped = stage(60_000);
        run_fast(&mut wiped, &Recording { events }, FRAME_MS).unwrap();
        assert_eq!(wiped.session.layer().painted_pixels(), 0);
    }

    #[test]
    fn background_action_lands_on_schedule() {
        let mut stage = stage(60_000);
        let recording = Recording {
            events: vec![
                at(0, Event::Poses(vec![])),
                at(500, Event::Action(Action::CycleBackground)),
            ],
        };
        run_fast(&mut stage, &recording, FRAME_MS).unwrap();
        assert_eq!(stage.session.background_mode(), BackgroundMode::BlankDark);
    }

    #[test]
    fn automatic_snapshots_follow_the_configured_cadence() {
        let mut stage = stage(1_000);
        let mut snapshots = stage.bus.subscribe();
        let recording = Recording {
            events: vec![at(0, Event::Poses(vec![])), at(3_000, Event::Poses(vec![]))],
        };
        run_fast(&mut stage, &recording, FRAME_MS).unwrap();

        let mut stamps = Vec::new();
        while let Ok(packet) = snapshots.try_recv() {
            stamps.push(packet.ts_millis);
        }
        assert_eq!(stamps, vec![1_008, 2_016]);
    }

    #[test]
    fn newest_poses_win_within_a_frame() {
        let mut stage = stage(60_000);
        let recording = Recording {
            events: vec![
                at(0, Event::Poses(vec![visitor(), visitor()])),
                at(0, Event::Poses(vec![visitor()])),
            ],
        };
        run_fast(&mut stage, &recording, FRAME_MS).unwrap();
        let active = stage.session.painters().iter().filter(|p| p.active).count();
        assert_eq!(active, 1);
    }
}
