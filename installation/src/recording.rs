//! Pose recordings.
//!
//! A recording is a JSON-lines file. Every line carries a timestamp `t` in
//! milliseconds since the start of the recording and either the pose list the
//! estimator produced at that moment or a visitor action:
//!
//! ```text
//! {"t": 0,    "poses": [{"score": 0.8, "keypoints": [{"position": {"x": 320.0, "y": 200.0}, "score": 0.9}]}]}
//! {"t": 1500, "action": "cycle_background"}
//! ```
//!
//! Blank lines are skipped. Timestamps must never go backwards.

use anyhow::{Context, Result, bail};
use painter_engine::core_modules::skeleton::Skeleton;
use serde::Deserialize;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CycleBackground,
    ResetCanvas,
    Share,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Poses(Vec<Skeleton>),
    Action(Action),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub t: u64,
    pub event: Event,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Line {
    t: u64,
    #[serde(default)]
    poses: Option<Vec<Skeleton>>,
    #[serde(default)]
    action: Option<Action>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub events: Vec<TimedEvent>,
}

impl Recording {
    pub fn parse(reader: impl BufRead) -> Result<Recording> {
        let mut events: Vec<TimedEvent> = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let number = index + 1;
            let line = line.with_context(|| format!("reading line {number}"))?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: Line = serde_json::from_str(&line).with_context(|| format!("parsing line {number}"))?;

            let event = match (parsed.poses, parsed.action) {
                (Some(poses), None) => Event::Poses(poses),
                (None, Some(action)) => Event::Action(action),
                _ => bail!("line {number}: expected exactly one of \"poses\" or \"action\""),
            };
            if let Some(previous) = events.last() {
                if parsed.t < previous.t {
                    bail!("line {number}: timestamp {} is earlier than {}", parsed.t, previous.t);
                }
            }
            events.push(TimedEvent { t: parsed.t, event });
        }
        Ok(Recording { events })
    }

    /// Timestamp of the last event, 0 for an empty recording.
    pub fn duration_ms(&self) -> u64 {
        self.events.last().map_or(0, |e| e.t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
{"t": 0, "poses": []}
{"t": 40, "poses": [{"score": 0.8, "keypoints": [{"position": {"x": 1.0, "y": 2.0}, "score": 0.9}]}]}

{"t": 40, "action": "cycle_background"}
{"t": 90, "action": "share"}
"#;

    #[test]
    fn parses_poses_and_actions_in_order() {
        let recording = Recording::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(recording.events.len(), 4);
        assert_eq!(recording.duration_ms(), 90);

        let Event::Poses(poses) = &recording.events[1].event else {
            panic!("second event should be poses");
        };
        assert_eq!(poses[0].keypoints[0].position.y, 2.0);
        assert_eq!(recording.events[2].event, Event::Action(Action::CycleBackground));
    }

    #[test]
    fn rejects_time_travel() {
        let input = "{\"t\": 50, \"poses\": []}\n{\"t\": 10, \"poses\": []}\n";
        let err = Recording::parse(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn rejects_lines_with_both_or_neither_payload() {
        assert!(Recording::parse("{\"t\": 0}".as_bytes()).is_err());
        assert!(Recording::parse("{\"t\": 0, \"poses\": [], \"action\": \"share\"}".as_bytes()).is_err());
        assert!(Recording::parse("{\"t\": 0, \"action\": \"dance\"}".as_bytes()).is_err());
    }

    #[test]
    fn empty_recording_is_valid() {
        assert_eq!(Recording::parse("".as_bytes()).unwrap().duration_ms(), 0);
    }
}
