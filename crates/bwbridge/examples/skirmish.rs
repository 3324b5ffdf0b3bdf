//! Windowed skirmish on the two-bases demo map against the sandbox AI.
//!
//! Run with:
//!   cargo run --example skirmish --features present -p bwbridge [ASSET_DIR]
//!
//! Without `ASSET_DIR` a generated badlands tileset is used. Set
//! `RUST_LOG=bwbridge=debug` to see dropped commands and game events.

use std::path::PathBuf;

use bwbridge::prelude::*;
use bwbridge_render::palette::WPE_SIZE;
use bwbridge_render::tileset::MEGATILE_BYTES;
use tracing_subscriber::EnvFilter;

/// A muted earth palette and 16 noisy megatiles.
fn generated_assets() -> MemoryAssets {
    let mut wpe = vec![0u8; WPE_SIZE];
    for (i, entry) in wpe.chunks_exact_mut(4).enumerate() {
        let v = i as u8;
        entry.copy_from_slice(&[v / 2 + 40, v / 3 + 30, v / 4 + 20, 0]);
    }
    let mut state = 0x2545_f491_u32;
    let mega = (0..MEGATILE_BYTES * 16)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            96 + (state % 24) as u8
        })
        .collect();
    MemoryAssets::new()
        .with("tileset/badlands.wpe", wpe)
        .with("tileset/badlands.mega", mega)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bwbridge=info")),
        )
        .init();

    let map = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/two_bases.json");
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());

    match std::env::args().nth(1) {
        Some(dir) => {
            let loaded = runner.load_image_data_from_path(&dir)?;
            tracing::info!(dir = %dir, tilesets = loaded, "image data loaded");
        }
        None => {
            runner.load_image_data(&generated_assets())?;
        }
    }
    runner.start_game(&map, Race::Terran, 2)?;

    run_windowed(
        runner,
        "bwbridge skirmish -- click/drag select, right click command, Esc quits",
        960,
        720,
    )
}
