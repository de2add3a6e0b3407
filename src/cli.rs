use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum InputMode {
    /// Decide from the file extension
    Auto,
    Audio,
    Midi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum NoteOffArg {
    /// One note-off releases one note-on
    One,
    /// One note-off releases every instance of the note
    All,
}

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg"];
pub const MIDI_EXTENSIONS: &[&str] = &["mid", "midi"];

#[derive(Parser, Debug)]
#[command(name = "pitch-spiral", about = "Pitch spiral visualizer for audio and MIDI files")]
pub struct Cli {
    /// Input file (WAV, MP3, FLAC, OGG or MIDI)
    pub input: Option<PathBuf>,

    /// List playable files in a folder and exit
    #[arg(long, value_name = "DIR")]
    pub list: Option<PathBuf>,

    /// How to interpret the input file
    #[arg(long, value_enum, default_value_t = InputMode::Auto)]
    pub mode: InputMode,

    /// Config file (defaults to pitch-spiral.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Clock polling interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Frequency placed at the top of spectrogram spirals (Hz); MIDI spirals put the tuning anchor on top
    #[arg(long)]
    pub reference_hz: Option<f64>,

    /// STFT window length in samples
    #[arg(long)]
    pub n_fft: Option<usize>,

    /// STFT hop length in samples
    #[arg(long)]
    pub hop: Option<usize>,

    /// Note-off semantics for retriggered notes
    #[arg(long, value_enum)]
    pub note_off: Option<NoteOffArg>,

    /// Only advance MIDI time on note messages
    #[arg(long)]
    pub legacy_deltas: bool,

    /// Write every snapshot as a JSON line to this file ("-" for stdout)
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write SVG frames into this directory
    #[arg(long)]
    pub svg_dir: Option<PathBuf>,

    /// Write one SVG per this many snapshots
    #[arg(long)]
    pub svg_every: Option<usize>,

    /// Do not play audio; follow the wall clock instead
    #[arg(long)]
    pub mute: bool,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

impl InputMode {
    /// Resolves `Auto` from the extension; `None` if it is not recognized.
    pub fn resolve(self, path: &Path) -> Option<InputMode> {
        match self {
            InputMode::Auto if has_extension(path, MIDI_EXTENSIONS) => Some(InputMode::Midi),
            InputMode::Auto if has_extension(path, AUDIO_EXTENSIONS) => Some(InputMode::Audio),
            InputMode::Auto => None,
            explicit => Some(explicit),
        }
    }
}

impl Cli {
    /// Flags that were given but have no effect on `mode` input.
    pub fn ignored_options(&self, mode: InputMode) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if mode == InputMode::Midi {
            if self.reference_hz.is_some() {
                ignored.push("--reference-hz");
            }
            if self.n_fft.is_some() {
                ignored.push("--n-fft");
            }
            if self.hop.is_some() {
                ignored.push("--hop");
            }
        } else {
            if self.note_off.is_some() {
                ignored.push("--note-off");
            }
            if self.legacy_deltas {
                ignored.push("--legacy-deltas");
            }
        }
        ignored
    }
}

/// Playable files directly inside `dir`, sorted by name.
pub fn list_candidates(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file()
            && (has_extension(&path, AUDIO_EXTENSIONS) || has_extension(&path, MIDI_EXTENSIONS))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
