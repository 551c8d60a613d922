//! Miniview - FBX model viewer
//!
//! Loads the viewer settings, imports a model and prepares the interleaved
//! vertex and index buffers the renderer uploads.

mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use miniview_assets::{import_fbx, VertexAttribute, VERTEX_STRIDE};
use settings::ViewerSettings;

#[derive(Debug, Parser)]
#[command(name = "miniview", about = "Import an FBX model into GPU-ready buffers")]
struct Args {
    /// FBX file to load, defaults to `[import].model` from the settings file
    model: Option<PathBuf>,

    /// Settings file to use instead of `~/.config/miniview/settings.toml`
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the current settings to the config file
    #[arg(long)]
    save_settings: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => ViewerSettings::load_from(path),
        None => ViewerSettings::load(),
    };

    if args.save_settings {
        let saved = match &args.config {
            Some(path) => settings.save_to(path),
            None => settings.save(),
        };
        saved.context("Failed to save settings")?;
    }

    let requested = args.model.as_ref().unwrap_or(&settings.import.model);
    let path = settings.import.resolve(requested);

    info!("Importing {}", path.display());
    let model = import_fbx(&path, &settings.import.options())
        .with_context(|| format!("Failed to import {}", path.display()))?;

    for name in &model.mesh_names {
        info!("Mesh: {}", name);
    }
    for attribute in VertexAttribute::ALL {
        info!(
            "Attribute '{}': location {}, {} floats at offset {}",
            attribute.name(),
            attribute.location(),
            attribute.components(),
            attribute.offset()
        );
    }
    info!(
        "Vertex buffer: {} bytes ({} vertices, stride {})",
        model.mesh.vertex_bytes().len(),
        model.mesh.vertex_count(),
        VERTEX_STRIDE
    );
    info!(
        "Index buffer: {} bytes, draw count {}",
        model.mesh.index_bytes().len(),
        model.draw_count()
    );
    if model.mesh.stats.skipped_polygons > 0 {
        info!(
            "{} degenerate polygons were skipped",
            model.mesh.stats.skipped_polygons
        );
    }

    Ok(())
}
