//! Tile cache invalidation sinks
//!
//! The tile renderer watches `outdated.txt`: one `xmin,ymin,xmax,ymax` line per
//! area to re-render.

use async_trait::async_trait;
use batimap_core::error::Result;
use batimap_core::models::Bbox;
use batimap_core::ports::TileInvalidator;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const OUTDATED_FILE: &str = "outdated.txt";

/// Whole world, written when every tile is stale
const WORLD: Bbox = Bbox {
    xmin: -180.0,
    ymin: -90.0,
    xmax: 180.0,
    ymax: 90.0,
};

/// Appends outdated areas to `<tiles_dir>/outdated.txt`
#[derive(Debug, Clone)]
pub struct FileTileInvalidator {
    dir: PathBuf,
}

impl FileTileInvalidator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn outdated_file(&self) -> PathBuf {
        self.dir.join(OUTDATED_FILE)
    }

    async fn append(&self, path: &Path, line: String) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TileInvalidator for FileTileInvalidator {
    async fn invalidate_all(&self) -> Result<()> {
        tracing::info!("All tiles must be regenerated");
        fs::create_dir_all(&self.dir).await?;
        // pending boxes are covered by the world box
        fs::write(self.outdated_file(), format!("{}\n", WORLD)).await?;
        Ok(())
    }

    async fn invalidate_bbox(&self, bbox: &Bbox) -> Result<()> {
        tracing::info!(bbox = %bbox, "Tiles must be regenerated");
        self.append(&self.outdated_file(), format!("{}\n", bbox)).await
    }
}

/// Invalidation request captured by [`RecordingTiles`]
#[derive(Debug, Clone, PartialEq)]
pub enum TileEvent {
    All,
    Bbox(Bbox),
}

/// Keeps invalidation requests in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingTiles {
    events: Arc<RwLock<Vec<TileEvent>>>,
}

impl RecordingTiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TileEvent> {
        self.events.read().unwrap().clone()
    }
}

#[async_trait]
impl TileInvalidator for RecordingTiles {
    async fn invalidate_all(&self) -> Result<()> {
        self.events.write().unwrap().push(TileEvent::All);
        Ok(())
    }

    async fn invalidate_bbox(&self, bbox: &Bbox) -> Result<()> {
        self.events.write().unwrap().push(TileEvent::Bbox(*bbox));
        Ok(())
    }
}
