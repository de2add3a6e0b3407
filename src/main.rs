mod audio;
mod cli;
mod config;
mod error;
mod midi;
mod playback;
mod render;
mod scheduler;
mod spiral;
mod timeline;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, InputMode, NoteOffArg};
use config::Config;
use playback::{SilentTransport, Transport};
use render::json::JsonLinesRenderer;
use render::logger::LogRenderer;
use render::svg::SvgRenderer;
use render::Renderer;
use scheduler::driver::Driver;
use scheduler::{NoteOffPolicy, Scheduler};
use spiral::NoteTuning;
use timeline::{frames, notes, DeltaPolicy, NoteTimelineOptions, Timeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::default();
    if let Some(path) = cli.config.clone().or_else(config::discover) {
        match config::load_config(&path) {
            Ok(loaded) => {
                log::info!("Loaded config from {}", path.display());
                cfg = loaded;
            }
            Err(err) => log::warn!("Failed to load config from {}: {:#}", path.display(), err),
        }
    }
    apply_overrides(&mut cfg, &cli);

    if let Some(ref dir) = cli.list {
        let files = cli::list_candidates(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        println!("Playable files in {}:", dir.display());
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input file is required (or use --list DIR)")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let mode = cli
        .mode
        .resolve(input)
        .with_context(|| format!("Cannot tell audio from MIDI for {}; pass --mode", input.display()))?;

    log::info!("pitch-spiral - pitch spiral visualizer");
    log::info!("Input: {} ({:?})", input.display(), mode);
    for flag in cli.ignored_options(mode) {
        log::info!("{} has no effect on {:?} input", flag, mode);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let tuning = NoteTuning {
        anchor_note: cfg.spiral.note_anchor,
        anchor_hz: cfg.spiral.note_anchor_hz,
    };

    match mode {
        InputMode::Midi => run_midi(input, &cfg, tuning, &stop),
        _ => run_audio(input, &cfg, tuning, &stop),
    }
}

/// CLI values win over config values.
fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(hz) = cli.reference_hz {
        cfg.spiral.reference_hz = hz;
    }
    if let Some(n) = cli.n_fft {
        cfg.analysis.n_fft = n;
    }
    if let Some(hop) = cli.hop {
        cfg.analysis.hop_size = hop;
    }
    if let Some(ms) = cli.poll_ms {
        cfg.playback.poll_interval_ms = ms;
    }
    if cli.mute {
        cfg.playback.mute = true;
    }
    if let Some(arg) = cli.note_off {
        cfg.midi.note_off = match arg {
            NoteOffArg::One => NoteOffPolicy::RemoveOne,
            NoteOffArg::All => NoteOffPolicy::RemoveAll,
        };
    }
    if cli.legacy_deltas {
        cfg.midi.delta_policy = DeltaPolicy::NoteMessagesOnly;
    }
    if cli.json.is_some() {
        cfg.output.json = cli.json.clone();
    }
    if cli.svg_dir.is_some() {
        cfg.output.svg_dir = cli.svg_dir.clone();
    }
    if let Some(every) = cli.svg_every {
        cfg.output.svg_every = every;
    }
}

fn run_midi(input: &Path, cfg: &Config, tuning: NoteTuning, stop: &AtomicBool) -> Result<()> {
    log::info!("Parsing MIDI...");
    let source = midi::parse_file(input)?;

    // Notes are laid out around their own tuning anchor, so note 33 points up;
    // spiral.reference_hz only applies to spectrograms.
    let options = NoteTimelineOptions {
        ms_per_tick: source.ms_per_tick,
        delta_policy: cfg.midi.delta_policy,
        tuning,
        reference_hz: tuning.anchor_hz,
    };
    let timeline = notes::build(&source.messages, &options)?;
    if cfg.midi.note_off == NoteOffPolicy::RemoveAll {
        log::info!("Note-off releases every instance of a retriggered note");
    }

    let mut renderer = build_renderers(cfg, options.reference_hz, &tuning)?;
    if !cfg.playback.mute {
        log::info!("MIDI files are not synthesized; following the wall clock");
    }
    let transport = SilentTransport::new();
    drive(Timeline::Notes(timeline), &transport, cfg, &mut renderer, stop)
}

fn run_audio(input: &Path, cfg: &Config, tuning: NoteTuning, stop: &AtomicBool) -> Result<()> {
    log::info!("Decoding audio...");
    let audio = audio::decode::decode_audio(input)?;
    log::info!("Duration: {:.1}s @ {}Hz", audio.duration_secs(), audio.sample_rate);

    log::info!("Computing spectrogram...");
    let spectrogram = audio::stft::stft(&audio, cfg.analysis.n_fft, cfg.analysis.hop_size)?;
    log::info!(
        "Spectrogram: {} frames x {} bins",
        spectrogram.frames.len(),
        spectrogram.num_bins()
    );
    let timeline = frames::build_from_spectrogram(&spectrogram, cfg.spiral.reference_hz)?;

    let mut renderer = build_renderers(cfg, cfg.spiral.reference_hz, &tuning)?;

    #[cfg(feature = "playback")]
    if !cfg.playback.mute {
        let transport = playback::output::CpalTransport::load(&audio)?;
        return drive(Timeline::Frames(timeline), &transport, cfg, &mut renderer, stop);
    }

    #[cfg(not(feature = "playback"))]
    if !cfg.playback.mute {
        log::warn!(
            "Audio output requires the 'playback' feature; following the wall clock. \
             Rebuild with: cargo build --features playback"
        );
    }

    let transport = SilentTransport::new();
    drive(Timeline::Frames(timeline), &transport, cfg, &mut renderer, stop)
}

fn build_renderers(cfg: &Config, reference_hz: f64, tuning: &NoteTuning) -> Result<Vec<Box<dyn Renderer>>> {
    let mut renderers: Vec<Box<dyn Renderer>> = vec![Box::new(LogRenderer::new())];

    if let Some(ref path) = cfg.output.json {
        let out: Box<dyn Write> = if path.as_os_str() == "-" {
            Box::new(std::io::stdout().lock())
        } else {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        };
        log::info!("Writing JSON snapshots to {}", path.display());
        renderers.push(Box::new(JsonLinesRenderer::new(out)));
    }

    if let Some(ref dir) = cfg.output.svg_dir {
        renderers.push(Box::new(SvgRenderer::new(dir, cfg.output.svg_every, reference_hz, tuning)?));
    }

    Ok(renderers)
}

fn drive<T: Transport>(
    timeline: Timeline,
    transport: &T,
    cfg: &Config,
    renderer: &mut Vec<Box<dyn Renderer>>,
    stop: &AtomicBool,
) -> Result<()> {
    let mut scheduler = Scheduler::new(cfg.midi.note_off);
    scheduler.start(timeline, transport)?;
    transport.play()?;

    let driver = Driver::new(Duration::from_millis(cfg.playback.poll_interval_ms));
    let result = driver.run(&mut scheduler, renderer, stop);
    transport.stop();

    let summary = result?;
    if summary.regressions > 0 {
        log::warn!("Playback clock went backwards {} times", summary.regressions);
    }
    log::info!("Done: {:?}", summary.outcome);
    Ok(())
}
