use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::fs;
use walkdir::{DirEntry, WalkDir};

pub mod normalize;

use crate::models::{CanonicalKey, Category};
use normalize::{normalize_title, parse_episode};

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "mpg", "mpeg", "webm", "m4v", "ts",
];

static RE_SEASON_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:season[\s._-]*\d+|s\d{1,3}|specials?)$").unwrap());

/// Folders to skip during scanning (case-insensitive check)
const SKIP_FOLDER_NAMES: &[&str] = &[
    "extras",
    "extra",
    "bonus",
    "behind the scenes",
    "deleted scenes",
    "featurettes",
    "trailers",
    "sample",
    "samples",
];

/// An existing-media directory and the category its files count towards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDir {
    pub path: PathBuf,
    pub category: Category,
}

pub fn is_video_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

/// Check if a folder should be skipped (extras, trailers, samples)
fn should_skip_folder(folder_name: &str) -> bool {
    SKIP_FOLDER_NAMES.contains(&folder_name.to_lowercase().as_str())
}

fn is_season_folder(folder_name: &str) -> bool {
    RE_SEASON_FOLDER.is_match(folder_name.trim())
}

/// Keys of titles already present in the user's library.
///
/// Partitioned by category, but duplicate checks go through [`MediaCache::contains`]
/// which looks at every partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaCache {
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
    #[serde(default)]
    categories: BTreeMap<Category, BTreeSet<CanonicalKey>>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self {
            built_at: Some(Utc::now()),
            categories: BTreeMap::new(),
        }
    }

    pub fn extend(&mut self, category: Category, keys: impl IntoIterator<Item = CanonicalKey>) {
        self.categories.entry(category).or_default().extend(keys);
    }

    /// Category-agnostic lookup against the combined cache
    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.categories.values().any(|keys| keys.contains(key))
    }

    pub fn contains_in(&self, category: Category, key: &CanonicalKey) -> bool {
        self.categories
            .get(&category)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Number of distinct keys across all categories
    pub fn len(&self) -> usize {
        self.categories
            .values()
            .flatten()
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|keys| keys.is_empty())
    }

    pub fn category_len(&self, category: Category) -> usize {
        self.categories.get(&category).map_or(0, |keys| keys.len())
    }

    /// Load a previously saved cache
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read media cache {}", path.display()))?;
        let cache: MediaCache = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse media cache {}", path.display()))?;

        tracing::debug!(
            "Loaded media cache with {} entries from {}",
            cache.len(),
            path.display()
        );
        Ok(cache)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write media cache {}", path.display()))?;

        tracing::debug!(
            "Saved media cache with {} entries to {}",
            self.len(),
            path.display()
        );
        Ok(())
    }
}

/// Build the media cache from all library directories.
///
/// Each directory is walked on its own blocking worker, at most `workers`
/// at a time. Workers return their own key sets, merged once at the end.
/// Missing or unreadable directories are logged and contribute nothing.
pub async fn build_media_cache(
    dirs: &[LibraryDir],
    workers: usize,
    extensions: &[String],
) -> MediaCache {
    let extensions: Arc<[String]> = extensions.into();

    let results = stream::iter(dirs.iter().cloned())
        .map(|dir| {
            let extensions = Arc::clone(&extensions);
            async move {
                let category = dir.category;
                let path = dir.path.clone();
                let scanned =
                    tokio::task::spawn_blocking(move || scan_directory(&dir, &extensions)).await;
                (category, path, scanned)
            }
        })
        .buffer_unordered(workers.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut cache = MediaCache::new();
    for (category, path, scanned) in results {
        match scanned {
            Ok(keys) => cache.extend(category, keys),
            Err(e) => {
                tracing::error!("Error building cache for {}: {}", path.display(), e);
            }
        }
    }

    for category in Category::ALL {
        tracing::debug!("Media cache {}: {} entries", category, cache.category_len(category));
    }
    tracing::info!(
        "Media cache built from {} directories: {} entries",
        dirs.len(),
        cache.len()
    );
    cache
}

/// Walk one library directory and collect the keys of its video files
pub fn scan_directory(dir: &LibraryDir, extensions: &[String]) -> HashSet<CanonicalKey> {
    let mut keys = HashSet::new();

    if !dir.path.is_dir() {
        tracing::warn!(
            "Directory {} does not exist; skipping {} library",
            dir.path.display(),
            dir.category
        );
        return keys;
    }

    tracing::info!(
        "Building media cache from directory: {} ({})",
        dir.path.display(),
        dir.category
    );

    let walker = WalkDir::new(&dir.path)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", dir.path.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_video_file(entry.path(), extensions) {
            continue;
        }

        let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) else {
            tracing::debug!("Skipping non UTF-8 file name: {}", entry.path().display());
            continue;
        };

        let key = if dir.category.is_tv_like() {
            episode_key_for_file(&dir.path, entry.path(), stem).unwrap_or_else(|| {
                tracing::debug!("No SxxExx in '{}', indexing as single file", stem);
                CanonicalKey::title(&normalize_title(stem))
            })
        } else {
            CanonicalKey::title(&normalize_title(stem))
        };

        tracing::trace!("Found file in {}: {}", dir.path.display(), key);
        keys.insert(key);
    }

    tracing::info!(
        "Built cache with {} entries from {}",
        keys.len(),
        dir.path.display()
    );
    keys
}

/// Skip special folders and subtrees marked with a `.ignore` file
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_str().unwrap_or_default();
    should_skip_folder(name) || entry.path().join(".ignore").exists()
}

/// Key for an episode file. When the file name is only a marker
/// ("Show/Season 1/S01E02.mkv") the show name comes from the nearest
/// enclosing folder that is not a season folder.
fn episode_key_for_file(root: &Path, path: &Path, stem: &str) -> Option<CanonicalKey> {
    let parsed = parse_episode(stem)?;
    if !parsed.show_name.is_empty() {
        return Some(parsed.key());
    }

    let relative = path.strip_prefix(root).ok()?;
    let show_folder = relative
        .parent()?
        .components()
        .rev()
        .filter_map(|c| c.as_os_str().to_str())
        .find(|name| !is_season_folder(name))?;

    let show_name = normalize_title(show_folder);
    if show_name.is_empty() {
        return None;
    }
    Some(CanonicalKey::episode(&show_name, parsed.season, parsed.episode))
}
