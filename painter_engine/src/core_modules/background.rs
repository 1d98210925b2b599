// THEORY:
// The installation shows its painting over one of three backgrounds: plain
// light, plain dark, or the live camera feed. Visitors cycle through them, but
// the dark and live-feed modes are temporary: after a fixed delay the
// installation drifts back to light on its own.
//
// The reset is polled once per frame rather than scheduled, so it fires up to
// one frame late. That is the only clock this module needs, and it is handed
// in as a millisecond timestamp.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackgroundMode {
    #[default]
    BlankLight,
    BlankDark,
    LiveFeed,
}

impl BackgroundMode {
    pub fn next(self) -> Self {
        match self {
            BackgroundMode::BlankLight => BackgroundMode::BlankDark,
            BackgroundMode::BlankDark => BackgroundMode::LiveFeed,
            BackgroundMode::LiveFeed => BackgroundMode::BlankLight,
        }
    }

    /// Whether the mode falls back to light after the reset delay.
    pub fn is_temporary(self) -> bool {
        !matches!(self, BackgroundMode::BlankLight)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackgroundConfig {
    /// How long dark or live-feed mode lasts before reverting to light.
    pub reset_delay_ms: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            reset_delay_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundController {
    mode: BackgroundMode,
    entered_at_ms: u64,
    config: BackgroundConfig,
}

impl BackgroundController {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            mode: BackgroundMode::BlankLight,
            entered_at_ms: 0,
            config,
        }
    }

    pub fn mode(&self) -> BackgroundMode {
        self.mode
    }

    /// Advances to the next mode, restarting the reset timer when entering a
    /// temporary mode.
    pub fn cycle(&mut self, now_ms: u64) -> BackgroundMode {
        self.mode = self.mode.next();
        if self.mode.is_temporary() {
            self.entered_at_ms = now_ms;
        }
        debug!(mode = ?self.mode, "background cycled");
        self.mode
    }

    /// Per-frame check. Returns `true` when the mode was forced back to light.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.mode.is_temporary() && now_ms.saturating_sub(self.entered_at_ms) > self.config.reset_delay_ms {
            debug!(from = ?self.mode, "background reset to light");
            self.mode = BackgroundMode::BlankLight;
            return true;
        }
        false
    }
}
