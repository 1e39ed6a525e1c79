// Conversion pass: playlist entries in, pointer files out, skipping
// whatever the library or an earlier run already has.

use anyhow::Result;
use std::collections::HashSet;
use std::fmt;

pub mod writer;

use crate::config::AppConfig;
use crate::models::{CanonicalKey, Category, PlaylistEntry};
use crate::playlist::classify::{ClassificationRule, Classifier, GenreLookup};
use crate::playlist::{read_playlist, Playlist};
use crate::scanner::normalize::canonical_key;
use crate::scanner::{build_media_cache, MediaCache};
use crate::services::history::ConversionHistory;
use writer::{StrmWriter, WriteOutcome};

/// Counters for the end-of-run summary
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub parsed: usize,
    pub malformed: usize,
    pub created: usize,
    pub would_create: usize,
    /// Already in the existing media library
    pub duplicates: usize,
    /// Same title seen earlier in this playlist
    pub repeated: usize,
    /// Recorded in the history with the same URL
    pub already_converted: usize,
    /// Pointer file already on disk
    pub already_exists: usize,
    pub failed: usize,
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parsed {}, created {}, would create {}, duplicates {}, repeated {}, \
             already converted {}, existing files {}, malformed {}, failed {}",
            self.parsed,
            self.created,
            self.would_create,
            self.duplicates,
            self.repeated,
            self.already_converted,
            self.already_exists,
            self.malformed,
            self.failed
        )
    }
}

/// Everything the conversion pass needs, built once per run
pub struct RunContext<G> {
    pub cache: MediaCache,
    pub history: ConversionHistory,
    pub classifier: Classifier<G>,
    pub writer: StrmWriter,
    seen: HashSet<CanonicalKey>,
}

impl<G: GenreLookup> RunContext<G> {
    pub fn new(
        cache: MediaCache,
        history: ConversionHistory,
        classifier: Classifier<G>,
        writer: StrmWriter,
    ) -> Self {
        Self {
            cache,
            history,
            classifier,
            writer,
            seen: HashSet::new(),
        }
    }

    /// Run every playlist entry through history check, classification,
    /// duplicate filter and writer. Per-entry failures are counted, never fatal.
    pub async fn convert(&mut self, playlist: &Playlist) -> ConversionReport {
        let mut report = ConversionReport {
            parsed: playlist.entries.len(),
            malformed: playlist.skipped,
            ..Default::default()
        };

        for entry in &playlist.entries {
            self.convert_entry(entry, &mut report).await;
        }

        report
    }

    async fn convert_entry(&mut self, entry: &PlaylistEntry, report: &mut ConversionReport) {
        if self.history.is_converted(&entry.title, &entry.url) {
            tracing::debug!("Already converted in an earlier run: {}", entry.title);
            report.already_converted += 1;
            return;
        }

        let category = self.classifier.classify(entry).await;
        let key = canonical_key(&entry.title, category.is_tv_like());

        if self.cache.contains(&key) {
            let found_in = Category::ALL
                .into_iter()
                .find(|c| self.cache.contains_in(*c, &key))
                .unwrap_or(category);
            tracing::info!(
                "Skipping duplicate: {} ({} already in {} library)",
                entry.title,
                key,
                found_in
            );
            report.duplicates += 1;
            return;
        }

        if self.seen.contains(&key) {
            tracing::debug!(
                "Skipping repeated playlist entry '{}' (line {})",
                entry.title,
                entry.line
            );
            report.repeated += 1;
            return;
        }

        // A failed write leaves the key open for a later mirror of the same title
        match self.writer.write(category, &entry.title, &entry.url).await {
            Ok(WriteOutcome::Created(path)) => {
                tracing::info!("Created {} ({})", path.display(), category);
                self.history.record(&entry.title, &entry.url);
                self.seen.insert(key);
                report.created += 1;
            }
            Ok(WriteOutcome::DryRun(path)) => {
                tracing::debug!("Dry run target for '{}': {}", entry.title, path.display());
                self.seen.insert(key);
                report.would_create += 1;
            }
            Ok(WriteOutcome::AlreadyExists(path)) => {
                tracing::info!("Already converted: {}", path.display());
                self.history.record(&entry.title, &entry.url);
                self.seen.insert(key);
                report.already_exists += 1;
            }
            Err(e) => {
                tracing::error!(
                    "Failed to write '{}' (line {}): {:#}",
                    entry.title,
                    entry.line,
                    e
                );
                report.failed += 1;
            }
        }
    }
}

/// Use the persisted cache when configured and readable, otherwise scan.
/// Returns the cache and whether it was freshly built.
async fn load_or_build_cache(config: &AppConfig) -> (MediaCache, bool) {
    if let Some(path) = config.media_cache_file.as_deref() {
        if config.rescan {
            tracing::info!("Rescan requested; ignoring media cache {}", path.display());
        } else if path.exists() {
            match MediaCache::load(path).await {
                Ok(cache) => {
                    tracing::info!(
                        "Using media cache {} ({} entries)",
                        path.display(),
                        cache.len()
                    );
                    return (cache, false);
                }
                Err(e) => tracing::warn!("Ignoring unusable media cache: {:#}", e),
            }
        }
    }

    let cache = build_media_cache(
        &config.library_dirs,
        config.max_workers,
        &config.video_extensions,
    )
    .await;
    if cache.is_empty() {
        tracing::warn!("No existing media found; every playlist entry counts as new");
    }
    (cache, true)
}

/// One full conversion run
pub async fn run<G: GenreLookup>(
    config: &AppConfig,
    genre_lookup: Option<G>,
) -> Result<ConversionReport> {
    let (cache, fresh_cache) = load_or_build_cache(config).await;
    let history = ConversionHistory::load(&config.history_file).await?;
    if !history.is_empty() {
        tracing::info!("{} titles converted in earlier runs", history.len());
    }
    let playlist = read_playlist(&config.playlist).await?;

    let classifier = Classifier::new(ClassificationRule::ordered(&config.classifier), genre_lookup);
    let writer = StrmWriter::new(
        config.output_dir.clone(),
        &config.strm_extension,
        config.dry_run,
    );

    let mut ctx = RunContext::new(cache, history, classifier, writer);
    let report = ctx.convert(&playlist).await;

    if config.dry_run {
        tracing::info!("[DRY RUN] Not saving history or media cache");
    } else {
        ctx.history.save(&config.history_file).await?;
        if let (Some(path), true) = (config.media_cache_file.as_deref(), fresh_cache) {
            if let Err(e) = ctx.cache.save(path).await {
                tracing::error!("Failed to save media cache: {:#}", e);
            }
        }
    }

    tracing::info!("Conversion finished: {}", report);
    Ok(report)
}
