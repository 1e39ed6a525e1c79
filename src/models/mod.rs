use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `#EXTINF` entry from the playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Display title as written after the comma
    pub title: String,
    /// Group label (`group-title` attribute or `#EXTGRP`)
    pub group: String,
    /// Stream URL
    pub url: String,
    /// 1-based line number of the `#EXTINF` directive
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movie,
    TvShow,
    Documentary,
    Animation,
    StandUp,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Movie,
        Category::TvShow,
        Category::Documentary,
        Category::Animation,
        Category::StandUp,
    ];

    /// Folder created under the output directory for this category
    pub fn folder_name(&self) -> &'static str {
        match self {
            Category::Movie => "Movies",
            Category::TvShow => "TV Shows",
            Category::Documentary => "Documentaries",
            Category::Animation => "Animation",
            Category::StandUp => "Stand-Up",
        }
    }

    /// Whether titles in this category carry season/episode markers
    pub fn is_tv_like(&self) -> bool {
        matches!(self, Category::TvShow | Category::Animation)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Movie => "movie",
            Category::TvShow => "tvshow",
            Category::Documentary => "documentary",
            Category::Animation => "animation",
            Category::StandUp => "standup",
        };
        f.write_str(s)
    }
}

/// Comparison unit for duplicate detection.
///
/// Both variants are lower-cased so that library files and playlist titles
/// compare equal regardless of casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CanonicalKey {
    Title(TitleKey),
    Episode(EpisodeKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TitleKey {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub show: String,
    pub season: u32,
    pub episode: u32,
}

impl CanonicalKey {
    pub fn title(title: &str) -> Self {
        CanonicalKey::Title(TitleKey {
            title: fold_key(title),
        })
    }

    pub fn episode(show: &str, season: u32, episode: u32) -> Self {
        CanonicalKey::Episode(EpisodeKey {
            show: fold_key(show),
            season,
            episode,
        })
    }
}

/// Lower-case, treat hyphens as spaces and collapse whitespace.
/// "Spider-Man" and "spider man" fold to the same key.
fn fold_key(s: &str) -> String {
    s.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalKey::Title(key) => f.write_str(&key.title),
            CanonicalKey::Episode(key) => {
                write!(f, "{} s{:02}e{:02}", key.show, key.season, key.episode)
            }
        }
    }
}
