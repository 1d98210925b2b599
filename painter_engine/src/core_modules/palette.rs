// THEORY:
// The role/palette registry is the static table behind a painter's identity.
// A `Role` is the body anchor a painter follows; a `Palette` is the set of
// colors a painter may be dipped in when its role is (re)assigned. Both are
// closed, small and chosen at random, so the registry is plain data plus a
// couple of `rand`-driven pickers.
//
// `ColorPolicy` sits here too: the brush never decides colors on its own, it
// is handed one by the session, and the policy is the place that decision
// lives.

use crate::error::{EngineError, EngineResult};
use image::Rgba;
use rand::Rng;
use rand::seq::SliceRandom;

/// Index of the head anchor keypoint in an estimator skeleton.
pub const HEAD: usize = 0;
/// Index of the left shoulder keypoint.
pub const LEFT_SHOULDER: usize = 5;
/// Index of the right shoulder keypoint.
pub const RIGHT_SHOULDER: usize = 6;
/// Index of the left ankle keypoint.
pub const LEFT_ANKLE: usize = 13;
/// Index of the right ankle keypoint.
pub const RIGHT_ANKLE: usize = 14;

/// The body anchor a painter is currently tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    Head,
    TorsoCentroid,
    RightAnkle,
    LeftAnkle,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Head,
        Role::TorsoCentroid,
        Role::RightAnkle,
        Role::LeftAnkle,
    ];

    /// The keypoint this role reads directly, or `None` for the torso midpoint.
    pub fn keypoint_index(self) -> Option<usize> {
        match self {
            Role::Head => Some(HEAD),
            Role::TorsoCentroid => None,
            Role::RightAnkle => Some(RIGHT_ANKLE),
            Role::LeftAnkle => Some(LEFT_ANKLE),
        }
    }

    /// Short caption shown next to a painter on the installation screen.
    pub fn label(self) -> &'static str {
        match self {
            Role::Head => "HEAD",
            Role::TorsoCentroid => "TORSO",
            Role::RightAnkle => "RIGHT FOOT",
            Role::LeftAnkle => "LEFT FOOT",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Role {
        Role::ALL[rng.gen_range(0..Role::ALL.len())]
    }
}

/// The colors painters are dipped in on (re)assignment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<String>", into = "Vec<String>")
)]
pub struct Palette {
    colors: Vec<Rgba<u8>>,
}

/// Red, blue, gold, lime, violet, orange, turquoise.
pub const DEFAULT_PALETTE: [&str; 7] = [
    "#FF0000", "#0000FF", "#FFD700", "#32CD32", "#9400D3", "#FF8C00", "#00CED1",
];

/// Soft greys and earth tones, for policies that mute the canvas.
pub const NEUTRAL_PALETTE: [&str; 4] = ["#2F2F2F", "#6B6B6B", "#A89F91", "#D8D2C4"];

impl Default for Palette {
    fn default() -> Self {
        Palette::parse(&DEFAULT_PALETTE).unwrap_or_else(|_| Palette {
            colors: vec![Rgba([0, 0, 0, 255])],
        })
    }
}

impl Palette {
    /// Builds a palette from `#RRGGBB` strings. An empty list is rejected.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> EngineResult<Palette> {
        if entries.is_empty() {
            return Err(EngineError::config("palette must contain at least one color"));
        }
        let colors = entries
            .iter()
            .map(|e| parse_hex(e.as_ref()))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Palette { colors })
    }

    pub fn from_colors(colors: Vec<Rgba<u8>>) -> EngineResult<Palette> {
        if colors.is_empty() {
            return Err(EngineError::config("palette must contain at least one color"));
        }
        Ok(Palette { colors })
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn random_color<R: Rng + ?Sized>(&self, rng: &mut R) -> Rgba<u8> {
        self.colors
            .choose(rng)
            .copied()
            .unwrap_or(Rgba([0, 0, 0, 255]))
    }

    /// Stable color for a painter id, wrapping around the palette.
    pub fn nth(&self, index: usize) -> Rgba<u8> {
        self.colors[index % self.colors.len()]
    }
}

impl TryFrom<Vec<String>> for Palette {
    type Error = EngineError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Palette::parse(&value)
    }
}

impl From<Palette> for Vec<String> {
    fn from(palette: Palette) -> Self {
        palette
            .colors
            .iter()
            .map(|c| format!("#{:02X}{:02X}{:02X}", c[0], c[1], c[2]))
            .collect()
    }
}

fn parse_hex(value: &str) -> EngineResult<Rgba<u8>> {
    let invalid = || EngineError::InvalidColor {
        value: value.to_string(),
    };
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).map_err(|_| invalid());
    Ok(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}

/// Decides which color a painter's marks are drawn with this frame.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ColorPolicy {
    /// Every mark uses the color the painter was assigned at respawn.
    #[default]
    PerPainter,
    /// A vivid palette while a subject is detected, a neutral one otherwise.
    /// Colors are indexed by painter id so each painter keeps a stable hue.
    PresenceAware { vivid: Palette, neutral: Palette },
}

impl ColorPolicy {
    pub fn pick(&self, painter_id: usize, painter_color: Rgba<u8>, subject_present: bool) -> Rgba<u8> {
        match self {
            ColorPolicy::PerPainter => painter_color,
            ColorPolicy::PresenceAware { vivid, neutral } => {
                if subject_present {
                    vivid.nth(painter_id)
                } else {
                    neutral.nth(painter_id)
                }
            }
        }
    }
}
