//! Cadastre generation log parsing
//!
//! The generator cuts the city into an `x * y` grid of PDF pages, announces
//! the total, then logs each page file it downloads (`...-<x>-<y>.pdf`).

use batimap_core::error::{BatimapError, Result};
use regex::Regex;
use std::sync::LazyLock;

static TOTAL_PAGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r".*coupe la bbox en (\d+) \* (\d+) \[(\d+) pdfs\]$").expect("valid total pattern")
});

static PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*\d+-(\d+)-(\d+)\.pdf$").expect("valid page pattern"));

/// Running state of one generation log
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationLog {
    total_y: u64,
    total: u64,
}

impl GenerationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Feed one line; returns the completion percentage when it moved
    ///
    /// Error markers (`ERROR:` / `ERREUR:`) are fatal.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<f64>> {
        if let Some(caps) = TOTAL_PAGES.captures(line) {
            self.total_y = caps[2].parse().unwrap_or(0);
            self.total = caps[3].parse().unwrap_or(0);
        }

        let mut percent = None;
        if let Some(caps) = PAGE.captures(line) {
            let x: u64 = caps[1].parse().unwrap_or(0);
            let y: u64 = caps[2].parse().unwrap_or(0);
            let current = x * self.total_y + y;
            if self.total > 0 {
                percent = Some((current as f64 * 100.0 / self.total as f64).min(100.0));
            }
            tracing::info!(current, total = self.total, "Cadastre page downloaded");
        }

        if line.contains("Termin") {
            return Ok(Some(100.0));
        }
        if line.contains("ERROR:") || line.contains("ERREUR:") {
            tracing::error!("{}", line);
            return Err(BatimapError::Generation { line: line.to_string() });
        }
        Ok(percent)
    }
}
