// M3U playlist parsing
// Format reference: https://en.wikipedia.org/wiki/M3U#Extended_M3U

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;

pub mod classify;

use crate::models::PlaylistEntry;

static RE_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).unwrap());

#[derive(Debug, Default)]
pub struct Playlist {
    pub entries: Vec<PlaylistEntry>,
    /// Entries dropped because they were malformed
    pub skipped: usize,
}

/// `#EXTINF` line waiting for its URL
#[derive(Debug)]
struct PendingEntry {
    title: String,
    group: Option<String>,
    line: usize,
}

/// Read and parse the playlist file. An unreadable playlist is fatal.
pub async fn read_playlist(path: &Path) -> Result<Playlist> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read playlist {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    let playlist = parse_playlist(&text);
    tracing::info!(
        "Parsed {} entries from playlist {} ({} malformed)",
        playlist.entries.len(),
        path.display(),
        playlist.skipped
    );
    Ok(playlist)
}

/// Parse extended M3U text entry by entry.
///
/// Malformed entries (no title, no URL) are logged and counted, never fatal.
pub fn parse_playlist(text: &str) -> Playlist {
    let mut playlist = Playlist::default();
    let mut pending: Option<PendingEntry> = None;
    let mut pending_group: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim().trim_start_matches('\u{feff}');

        if line.is_empty() {
            continue;
        }

        if let Some(info) = line.strip_prefix("#EXTINF:") {
            if let Some(previous) = pending.take() {
                tracing::warn!(
                    "Skipping playlist entry '{}' at line {}: no stream URL",
                    previous.title,
                    previous.line
                );
                playlist.skipped += 1;
            }
            pending_group = None;

            match parse_extinf(info) {
                Some((title, group)) => {
                    pending = Some(PendingEntry {
                        title,
                        group,
                        line: line_no,
                    });
                }
                None => {
                    tracing::warn!("Skipping malformed #EXTINF at line {}: {}", line_no, line);
                    playlist.skipped += 1;
                }
            }
            continue;
        }

        if let Some(group) = line.strip_prefix("#EXTGRP:") {
            pending_group = Some(group.trim().to_string());
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        // Anything else is a URL line
        match pending.take() {
            Some(entry) => {
                let group = entry
                    .group
                    .or_else(|| pending_group.take())
                    .unwrap_or_default();
                playlist.entries.push(PlaylistEntry {
                    title: entry.title,
                    group,
                    url: line.to_string(),
                    line: entry.line,
                });
            }
            None => {
                tracing::debug!("Ignoring URL without #EXTINF at line {}", line_no);
            }
        }
        pending_group = None;
    }

    if let Some(previous) = pending {
        tracing::warn!(
            "Skipping playlist entry '{}' at line {}: no stream URL",
            previous.title,
            previous.line
        );
        playlist.skipped += 1;
    }

    playlist
}

/// Split `-1 tvg-name="x" group-title="Movies",Title` into (title, group).
/// The title starts after the first comma outside quotes.
fn parse_extinf(info: &str) -> Option<(String, Option<String>)> {
    let mut in_quotes = false;
    let comma = info.char_indices().find_map(|(i, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ',' if !in_quotes => Some(i),
        _ => None,
    })?;

    let (attributes, title) = (&info[..comma], info[comma + 1..].trim());
    if title.is_empty() {
        return None;
    }

    let group = RE_ATTRIBUTE
        .captures_iter(attributes)
        .find(|caps| caps[1].eq_ignore_ascii_case("group-title"))
        .map(|caps| caps[2].trim().to_string());

    Some((title.to_string(), group))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="" tvg-name="The Matrix (1999)" tvg-logo="http://x/y.png" group-title="VOD | Movies",The Matrix (1999)
http://example.com/movie/1.mkv

#EXTINF:-1 group-title="Series EN",Breaking Bad S01E01
http://example.com/series/1.mkv
#EXTINF:-1 tvg-name="Comma, Inside",Comma, In Title
#EXTGRP:Documentaries
http://example.com/doc/1.mp4
"#;

    #[test]
    fn test_parse_sample_playlist() {
        let playlist = parse_playlist(SAMPLE);
        assert_eq!(playlist.skipped, 0);
        assert_eq!(playlist.entries.len(), 3);

        let movie = &playlist.entries[0];
        assert_eq!(movie.title, "The Matrix (1999)");
        assert_eq!(movie.group, "VOD | Movies");
        assert_eq!(movie.url, "http://example.com/movie/1.mkv");
        assert_eq!(movie.line, 2);

        let episode = &playlist.entries[1];
        assert_eq!(episode.title, "Breaking Bad S01E01");
        assert_eq!(episode.group, "Series EN");

        let doc = &playlist.entries[2];
        assert_eq!(doc.title, "Comma, In Title");
        assert_eq!(doc.group, "Documentaries");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let text = "#EXTM3U\n\
#EXTINF:-1 group-title=\"Movies\",No Url Here\n\
#EXTINF:-1 group-title=\"Movies\",\n\
http://example.com/orphan.mkv\n\
#EXTINF:-1 group-title=\"Movies\" no comma at all\n\
#EXTINF:-1 group-title=\"Movies\",Good Movie\n\
http://example.com/good.mkv\n\
#EXTINF:-1 group-title=\"Movies\",Trailing Entry\n";

        let playlist = parse_playlist(text);
        assert_eq!(playlist.entries.len(), 1);
        assert_eq!(playlist.entries[0].title, "Good Movie");
        assert_eq!(playlist.skipped, 4);
    }

    #[test]
    fn test_missing_group_is_empty() {
        let playlist = parse_playlist("#EXTINF:-1,Just A Title\nhttp://example.com/a\n");
        assert_eq!(playlist.entries.len(), 1);
        assert_eq!(playlist.entries[0].group, "");
    }

    #[tokio::test]
    async fn test_read_missing_playlist_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_playlist(&dir.path().join("nope.m3u")).await.is_err());
    }
}
