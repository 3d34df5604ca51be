//! Tagline - tag file inspector
//!
//! Loads a tag file and prints the tags active at a position.
//!
//! ```text
//! tagline <tags.json> [position] [--rate R] [--drop-frame] [--config editor.json]
//! ```
//!
//! `position` is an SMPTE label (`00:01:00;02`), a frame number (`#1800`)
//! or seconds (`60.06`). Without it a per-track summary is printed.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tagline_core::{FrameRate, FrameRounding, TimecodeEngine, UuidIds};
use tagline_timeline::{load_tag_set, EditorConfig, TagFile, TrackStore};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tagline")]
#[command(version)]
#[command(about = "Inspect a tag file at a playhead position")]
struct Args {
    /// Tag file to load
    tags: PathBuf,

    /// SMPTE label, `#frame` or seconds; omit for a per-track summary
    position: Option<String>,

    /// Frame rate, e.g. `30000/1001`, `29.97` or `25`
    #[arg(long, value_parser = parse_rate)]
    rate: Option<FrameRate>,

    /// Use drop-frame labels
    #[arg(long)]
    drop_frame: bool,

    /// Editor configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_rate(value: &str) -> std::result::Result<FrameRate, String> {
    FrameRate::parse(value).map_err(|e| e.to_string())
}

/// Frame for an SMPTE label, `#frame` or seconds.
fn parse_position(engine: &TimecodeEngine, position: &str) -> Result<i64> {
    if position.contains([':', ';']) {
        return Ok(engine.smpte_to_frame(position));
    }
    if let Some(frame) = position.strip_prefix('#') {
        return frame.parse().with_context(|| format!("invalid frame {frame:?}"));
    }
    let seconds: f64 = position
        .parse()
        .with_context(|| format!("invalid position {position:?}"))?;
    Ok(engine.time_to_frame(seconds, FrameRounding::Floor))
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EditorConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => EditorConfig::default(),
    };
    if let Some(rate) = args.rate {
        config.frame_rate = rate;
    }
    config.drop_frame |= args.drop_frame;

    let file = TagFile::load_from_file(&args.tags).with_context(|| format!("reading {}", args.tags.display()))?;
    let mut store = TrackStore::new(&config, UuidIds::shared());
    let summary = load_tag_set(&mut store, &file.tracks);
    info!(path = %args.tags.display(), tracks = summary.tracks, tags = summary.tags, "Loaded");

    let engine = *store.engine();
    let Some(position) = args.position else {
        for track in store.tracks() {
            let skipped = track.index().skipped();
            println!(
                "{:<24} {:>6} tags  {:?}{}",
                track.label(),
                track.tag_count(),
                track.kind(),
                if skipped > 0 { format!("  ({skipped} unreadable)") } else { String::new() }
            );
        }
        return Ok(());
    };

    let frame = parse_position(&engine, &position)?;
    let seconds = engine.frame_to_seconds(frame);
    println!(
        "{}  frame {}  {}",
        engine.frame_to_smpte(frame),
        frame,
        engine.time_to_string(seconds)
    );
    for (track, tags) in store.active_tags_at(seconds) {
        for tag in tags {
            println!(
                "  [{}] {} ({} - {})",
                track.label(),
                tag.text,
                engine.time_to_smpte(tag.start_time),
                engine.time_to_smpte(tag.end_time)
            );
        }
    }
    Ok(())
}
