//! Filesystem sentinels shared with the web front and the tile renderer

use batimap_core::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

const MAINTENANCE_TEMPLATE: &str = ".maintenance.html";
const MAINTENANCE_PAGE: &str = "maintenance.html";
const DATA_READY: &str = "initdb_is_done";

#[derive(Debug, Clone)]
pub struct Maintenance {
    html_dir: PathBuf,
    tiles_dir: PathBuf,
}

impl Maintenance {
    pub fn new(html_dir: impl Into<PathBuf>, tiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            html_dir: html_dir.into(),
            tiles_dir: tiles_dir.into(),
        }
    }

    pub fn page(&self) -> PathBuf {
        self.html_dir.join(MAINTENANCE_PAGE)
    }

    pub fn ready_marker(&self) -> PathBuf {
        self.tiles_dir.join(DATA_READY)
    }

    /// Put the maintenance page in place and withdraw the data-ready marker
    pub async fn begin(&self) -> Result<()> {
        let template = self.html_dir.join(MAINTENANCE_TEMPLATE);
        let page = self.page();
        if exists(&template).await && !exists(&page).await {
            tracing::info!(page = %page.display(), "Enabling maintenance page");
            fs::copy(&template, &page).await?;
        }
        remove_if_exists(&self.ready_marker()).await
    }

    /// Create the data-ready marker and take the maintenance page down
    pub async fn finish(&self) -> Result<()> {
        fs::create_dir_all(&self.tiles_dir).await?;
        fs::write(self.ready_marker(), b"").await?;
        remove_if_exists(&self.page()).await
    }

    pub async fn is_data_ready(&self) -> bool {
        exists(&self.ready_marker()).await
    }
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    if exists(path).await {
        fs::remove_file(path).await?;
    }
    Ok(())
}
