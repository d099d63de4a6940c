//! Montage - timeline inspector
//!
//! Loads a timeline file, refreshes it, and prints how every frame resolves
//! and bakes. Without a path a small built-in timeline is used.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use montage_core::{FrameRange, FrameRate, FrameRateDuration, TickDuration};
use montage_timeline::{
    ClipRegistry, Item, ItemType, MediaClipSource, TimelineConfig, TimelineFile,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match std::env::var_os("MONTAGE_CONFIG") {
        Some(path) => TimelineConfig::load(&PathBuf::from(&path))
            .with_context(|| format!("loading config {:?}", path))?,
        None => TimelineConfig::default(),
    };

    let mut timeline = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Loading timeline: {:?}", path);
            TimelineFile::load_from_file(&path)
                .with_context(|| format!("loading timeline {:?}", path))?
                .timeline
        }
        None => {
            info!("No timeline given, using built-in example");
            demo_timeline(config.default_rate)
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(inspect(&mut timeline, &config))
}

async fn inspect(timeline: &mut Item, config: &TimelineConfig) -> Result<()> {
    if timeline.available_range().is_none() {
        timeline.set_available_range(FrameRange::empty(config.default_rate));
    }
    if !timeline.valid() {
        warn!(uuid = %timeline.uuid(), "Timeline has children in invalid positions");
    }
    let changes = timeline.refresh(config.refresh_depth());
    info!(changes = changes.len(), "Refreshed ranges");

    let registry = Arc::new(ClipRegistry::new());
    let bound = bind_clip_sources(timeline, &registry);
    info!(clips = bound, "Registered clip sources");

    let rate = timeline.rate();
    let frames = timeline.trimmed_frame_duration().frames();
    println!("{} \"{}\"", timeline.item_type(), timeline.name());
    println!("  duration: {} frames @ {}", frames, rate);
    println!("  valid:    {}", timeline.valid());

    let options = &config.bake;
    println!("\nResolution ({}):", options.media_type);
    for frame in 0..frames {
        let time = rate.frames_to_ticks(frame);
        match timeline.resolve_time(time, options.media_type, &options.focus, false) {
            Some((item, local)) => println!(
                "  {:>5}  {} @ {}",
                frame,
                item.name(),
                item.rate().frames_in(local)
            ),
            None => println!("  {:>5}  -", frame),
        }
    }

    let map = timeline
        .bake(registry, options)
        .await
        .context("baking frame map")?;
    println!(
        "\nFrame map: {} frames @ {}, {} with media",
        map.len(),
        map.rate,
        map.resolved_count()
    );
    for (frame, id) in map.iter().enumerate() {
        println!("  {:>5}  {}", frame, id);
    }

    Ok(())
}

/// Register a media-backed source for every clip that references media.
fn bind_clip_sources(timeline: &mut Item, registry: &ClipRegistry) -> usize {
    let clips: Vec<(Uuid, Uuid, String, FrameRate)> = timeline
        .find_all_items(ItemType::Clip, None)
        .into_iter()
        .filter_map(|clip| {
            let media = clip.media_uuid()?;
            let uri = clip
                .prop()
                .get("uri")
                .and_then(|v| v.as_str())
                .unwrap_or_else(|| clip.name())
                .to_string();
            Some((clip.uuid(), media, uri, clip.rate()))
        })
        .collect();

    let mut bound = 0;
    for (clip_uuid, media, uri, rate) in clips {
        let source = MediaClipSource::new(media, uri, rate).with_clip(clip_uuid);
        let handle = registry.register(Arc::new(source));
        if let Some(clip) = timeline.find_item_mut(clip_uuid) {
            clip.set_handle(Some(handle));
            bound += 1;
        }
    }
    bound
}

fn demo_timeline(rate: FrameRate) -> Item {
    let clip = |name: &str, start: i64, frames: i64| {
        Item::clip(name, Some(Uuid::new_v4()))
            .with_available_range(FrameRange::from_frames(0, start + frames, rate))
            .with_active_range(FrameRange::from_frames(start, frames, rate))
    };

    let upper = Item::video_track("V2")
        .with_child(Item::gap("Gap", FrameRateDuration::from_frames(4, rate)))
        .with_child(clip("Insert", 10, 4));
    let lower = Item::video_track("V1")
        .with_child(clip("Wide", 0, 6))
        .with_child(clip("Close", 24, 6));
    let music = Item::audio_track("A1").with_child(clip("Music", 0, 12));

    Item::timeline("Demo")
        .with_available_range(FrameRange::new(rate, TickDuration::ZERO, TickDuration::ZERO))
        .with_child(
            Item::stack("Stack")
                .with_child(upper)
                .with_child(lower)
                .with_child(music),
        )
}
