//! Framing settings the editor applies around a screenshot: padding, corner
//! radius, shadow, background and output aspect ratio.
//!
//! Only the data lives here. Rendering happens in the editor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stock gradient backgrounds, `(name, css gradient)`.
pub const BACKGROUND_PRESETS: [(&str, &str); 5] = [
    ("Desktop", "linear-gradient(135deg, #667eea 0%, #764ba2 100%)"),
    ("Cool", "linear-gradient(135deg, #2196F3 0%, #00BCD4 100%)"),
    ("Nice", "linear-gradient(135deg, #E91E63 0%, #9C27B0 100%)"),
    ("Morning", "linear-gradient(135deg, #FF9800 0%, #FFC107 100%)"),
    ("Bright", "linear-gradient(135deg, #9C27B0 0%, #673AB7 100%)"),
];

/// Stock output ratios, `(label, ratio)`.
pub const ASPECT_PRESETS: [(&str, AspectRatio); 5] = [
    ("Auto", AspectRatio::Auto),
    ("4:3", AspectRatio::Fixed { width: 4, height: 3 }),
    ("3:2", AspectRatio::Fixed { width: 3, height: 2 }),
    ("16:9", AspectRatio::Fixed { width: 16, height: 9 }),
    ("1:1", AspectRatio::Fixed { width: 1, height: 1 }),
];

const MAX_PADDING: u32 = 100;
const MAX_INSET: u32 = 20;
const MAX_BORDER_RADIUS: u32 = 50;
const MAX_SHADOW: u32 = 100;

/// Output aspect ratio. `Auto` follows the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    #[default]
    Auto,
    Fixed { width: u32, height: u32 },
}

impl AspectRatio {
    /// Smallest canvas with this ratio that contains a `width` x `height` box.
    pub fn canvas_size(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            Self::Auto => (width, height),
            Self::Fixed { width: rw, height: rh } => {
                let (w, h, rw, rh) = (width as u64, height as u64, rw as u64, rh as u64);
                if w * rh >= h * rw {
                    // Content is wider than the ratio: grow height.
                    (width, saturate((w * rh).div_ceil(rw)))
                } else {
                    (saturate((h * rw).div_ceil(rh)), height)
                }
            }
        }
    }
}

fn saturate(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fixed { width, height } => write!(f, "{width}:{height}"),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid aspect ratio {s:?}: expected \"auto\" or \"W:H\""))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|e| format!("Invalid aspect ratio width {w:?}: {e}"))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|e| format!("Invalid aspect ratio height {h:?}: {e}"))?;
        if width == 0 || height == 0 {
            return Err(format!("Invalid aspect ratio {s:?}: sides must be non-zero"));
        }
        Ok(Self::Fixed { width, height })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

/// Editor framing preferences. Values outside the slider ranges are clamped
/// by [`FrameStyle::clamped`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameStyle {
    pub padding: u32,
    pub inset: u32,
    pub border_radius: u32,
    pub shadow: u32,
    pub background: String,
    pub aspect_ratio: AspectRatio,
    pub show_watermark: bool,
    pub redact_emails: bool,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            padding: 40,
            inset: 0,
            border_radius: 12,
            shadow: 20,
            background: BACKGROUND_PRESETS[0].1.to_string(),
            aspect_ratio: AspectRatio::Auto,
            show_watermark: false,
            redact_emails: false,
        }
    }
}

impl FrameStyle {
    pub fn clamped(mut self) -> Self {
        self.padding = self.padding.min(MAX_PADDING);
        self.inset = self.inset.min(MAX_INSET);
        self.border_radius = self.border_radius.min(MAX_BORDER_RADIUS);
        self.shadow = self.shadow.min(MAX_SHADOW);
        if self.background.trim().is_empty() {
            self.background = BACKGROUND_PRESETS[0].1.to_string();
        }
        self
    }

    /// Resolves a stock gradient name (case-insensitive) to its CSS; anything
    /// else is taken as CSS already.
    pub fn background_for(name_or_css: &str) -> String {
        BACKGROUND_PRESETS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(name_or_css.trim()))
            .map(|(_, css)| css.to_string())
            .unwrap_or_else(|| name_or_css.to_string())
    }
}
