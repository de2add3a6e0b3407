use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scheduler::NoteOffPolicy;
use crate::timeline::DeltaPolicy;

pub const CONFIG_FILE: &str = "pitch-spiral.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spiral: SpiralConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct SpiralConfig {
    /// Frequency drawn straight up for spectrograms.
    #[serde(default = "default_reference_hz")]
    pub reference_hz: f64,
    #[serde(default = "default_note_anchor")]
    pub note_anchor: u8,
    #[serde(default = "default_note_anchor_hz")]
    pub note_anchor_hz: f64,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub mute: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MidiConfig {
    #[serde(default)]
    pub delta_policy: DeltaPolicy,
    #[serde(default)]
    pub note_off: NoteOffPolicy,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub svg_dir: Option<PathBuf>,
    #[serde(default = "default_svg_every")]
    pub svg_every: usize,
    #[serde(default)]
    pub json: Option<PathBuf>,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            reference_hz: default_reference_hz(),
            note_anchor: default_note_anchor(),
            note_anchor_hz: default_note_anchor_hz(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_fft: default_n_fft(),
            hop_size: default_hop_size(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            mute: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            svg_dir: None,
            svg_every: default_svg_every(),
            json: None,
        }
    }
}

fn default_reference_hz() -> f64 { 55.0 }
fn default_note_anchor() -> u8 { 33 }
fn default_note_anchor_hz() -> f64 { 33.0 }
fn default_n_fft() -> usize { 2048 }
fn default_hop_size() -> usize { 2048 }
fn default_poll_interval_ms() -> u64 { 1 }
fn default_svg_every() -> usize { 10 }

/// `./pitch-spiral.toml`, then `~/.config/pitch-spiral/config.toml`, then the platform config dir.
pub fn discover() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("pitch-spiral").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("pitch-spiral").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
