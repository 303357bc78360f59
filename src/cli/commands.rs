//! CLI Command Implementations
//!
//! Each command builds an explicit store from the editor configuration, runs
//! one operation through it and reports the result on stdout.

use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use crate::config::EditorConfig;
use crate::dsp::EffectSpec;
use crate::engine::{read_audio_file, write_audio_file, WavCodec};
use crate::state::{load_project_dir, read_project_document, Scope, TrackStore};

/// Print duration, layout and levels of a WAV file.
pub fn inspect(path: &Path) -> Result<()> {
    let buffer = read_audio_file(path, &WavCodec)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("File:        {}", path.display());
    println!("Duration:    {:.3}s", buffer.duration_secs());
    println!("Frames:      {}", buffer.len());
    println!("Channels:    {}", buffer.num_channels());
    println!("Sample rate: {} Hz", buffer.sample_rate());
    println!("Peak:        {:.2} dBFS", buffer.peak_db());
    println!("RMS:         {:.2} dBFS", buffer.rms_db());
    if buffer.is_silent() {
        println!("(silent)");
    }
    Ok(())
}

/// Apply one effect to a WAV file, optionally limited to `[start, end)`.
pub fn process(
    config: &EditorConfig,
    input: &Path,
    output: &Path,
    effect_json: &str,
    start: Option<f64>,
    end: Option<f64>,
) -> Result<()> {
    let effect = EffectSpec::from_json(effect_json).context("Invalid effect description")?;
    let buffer = read_audio_file(input, &WavCodec)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let duration = buffer.duration_secs();

    let mut store = TrackStore::new(config);
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let track_id = store.add_track(name, Some(buffer));

    let scope = if start.is_some() || end.is_some() {
        store.set_selection(track_id, start.unwrap_or(0.0), end.unwrap_or(duration))?;
        Scope::Selection
    } else {
        Scope::Track
    };

    let changed = store.apply_effect(&effect, scope)?;
    if changed == 0 {
        bail!("Selection does not overlap the audio");
    }

    let Some(processed) = store.track(track_id).and_then(|t| t.buffer()) else {
        bail!("The effect left the track empty");
    };
    write_audio_file(output, processed, &config.export, &WavCodec)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Applied {} to {}", effect, input.display());
    println!(
        "{} -> {} ({:.3}s)",
        effect,
        output.display(),
        processed.duration_secs()
    );
    Ok(())
}

/// Render a saved project to a stereo file.
pub fn mixdown(
    config: &EditorConfig,
    project: &Path,
    output: &Path,
    sample_rate: Option<u32>,
) -> Result<()> {
    let mut store = TrackStore::new(config);
    let document = load_project_dir(project, &mut store, &WavCodec)
        .with_context(|| format!("Failed to load project {}", project.display()))?;

    let rate = sample_rate.unwrap_or(config.default_sample_rate);
    let mixed = store.export_mixdown(rate)?;
    write_audio_file(output, &mixed, &config.export, &WavCodec)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Rendered '{}' ({} tracks) to {} [{:.3}s, {} Hz, {}]",
        document.project_name,
        store.tracks().len(),
        output.display(),
        mixed.duration_secs(),
        rate,
        config.export.quality.label()
    );
    Ok(())
}

/// Print the tracks of a saved project without decoding any audio.
pub fn project_info(project: &Path) -> Result<()> {
    let document = read_project_document(project)
        .with_context(|| format!("Failed to read project {}", project.display()))?;

    println!("Project: {}", document.project_name);
    println!("Schema:  {}", document.schema_version);
    if let Some(saved_at) = document.saved_at {
        println!("Saved:   {}", saved_at);
    }
    if let Some(region) = document.repeat_region {
        println!("Repeat:  {:.2}s - {:.2}s", region.start, region.end);
    }
    println!("{:-<72}", "");
    println!(
        "{:<3} {:<24} {:>6} {:>6} {:<5} {:<5} {}",
        "#", "Name", "Vol", "Pan", "Mute", "Solo", "Audio"
    );
    for (i, track) in document.tracks.iter().enumerate() {
        println!(
            "{:<3} {:<24} {:>6.2} {:>6.2} {:<5} {:<5} {}",
            i + 1,
            track.name,
            track.volume,
            track.pan,
            if track.muted { "yes" } else { "" },
            if track.soloed { "yes" } else { "" },
            track.audio_ref.as_deref().unwrap_or("(empty)")
        );
    }
    Ok(())
}
