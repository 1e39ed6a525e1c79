// Conversion history: titles already turned into pointer files by earlier runs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionHistory {
    entries: BTreeMap<String, HistoryEntry>,
}

impl ConversionHistory {
    /// Load the history file; a missing file starts an empty history
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!("No history file at {}; starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read history {}", path.display()))?;
        let history: ConversionHistory = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history {}", path.display()))?;

        tracing::debug!("Loaded history with {} entries", history.len());
        Ok(history)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write history {}", path.display()))?;

        tracing::debug!("Saved history with {} entries", self.len());
        Ok(())
    }

    /// True when this title was converted before with the same stream URL
    pub fn is_converted(&self, title: &str, url: &str) -> bool {
        self.entries.get(title).is_some_and(|entry| entry.url == url)
    }

    pub fn record(&mut self, title: &str, url: &str) {
        self.entries.insert(
            title.to_string(),
            HistoryEntry {
                url: url.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
