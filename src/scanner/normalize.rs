// Title normalization shared by the library scanner and the playlist pass.
// Both sides must go through the same functions so their keys compare equal.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::CanonicalKey;

const RELEASE_TAGS: &str = r"2160p|1080p|1080i|720p|576p|480p|4k|uhd|blu[\s\-]?ray|bdrip|brrip|bdremux|web[\s\-]?dl|webrip|hdtv|hdrip|dvdrip|dvdscr|x26[45]|h\s?26[45]|hevc|xvid|divx|aac|ac3|dts|atmos|10bit|hdr10|hdr|remux|repack";

static RE_IMDB_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\[\{\(]?\s*(?:imdb(?:id)?\s*[-_:=]?\s*)?\btt\d{5,}\b\s*[\]\}\)]?").unwrap()
});
static RE_BRACKET_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\(\[]\s*((?:19|20)\d{2})\s*[\)\]]").unwrap());
// A bare year is only a release year when release tags or a tag group follow it
static RE_BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^(.*\S)\s+((?:19|20)\d{{2}})\s+(?:(?:{})\b|[\[\{{]).*$",
        RELEASE_TAGS
    ))
    .unwrap()
});
static RE_RELEASE_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\s(?:{})\b.*$", RELEASE_TAGS)).unwrap());
static RE_BRACKET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\{[^\}]*\}").unwrap());
static RE_INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\(\)\-]").unwrap());
static RE_EMPTY_PARENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*\)").unwrap());
static RE_SPACE_COLLAPSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_SEASON_EP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^A-Za-z0-9])s(?:eason)?\s*(\d{1,3})\s*-?\s*e(?:p(?:isode)?)?\s*(\d{1,4})")
        .unwrap()
});
static RE_CROSS_EP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9])(\d{1,2})x(\d{2,3})(?:[^A-Za-z0-9]|$)").unwrap()
});

/// Season/episode information parsed from a TV-like title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEpisode {
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
}

impl ParsedEpisode {
    pub fn key(&self) -> CanonicalKey {
        CanonicalKey::episode(&self.show_name, self.season, self.episode)
    }

    /// "Show Name S01E02"
    pub fn display(&self) -> String {
        format!(
            "{} S{:02}E{:02}",
            self.show_name, self.season, self.episode
        )
    }
}

/// Dots and underscores always separate words. Hyphens only do when the
/// title has no whitespace at all ("Show-Name-S01E02").
fn split_separators(raw: &str) -> String {
    let spaced = raw.replace(['.', '_'], " ");
    if spaced.trim().contains(char::is_whitespace) {
        spaced
    } else {
        spaced.replace('-', " ")
    }
}

fn sanitize(name: &str) -> String {
    let name = RE_INVALID_CHARS.replace_all(name, "");
    let name = RE_EMPTY_PARENS.replace_all(&name, " ");
    let name = RE_SPACE_COLLAPSE.replace_all(&name, " ");
    name.trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}

/// Cut the title at its release year, returning the part before it.
/// A bracketed year wins over a bare one; a bare year only counts when release
/// tags follow it, so "Blade Runner 2049" and "The Class of 1999 Reunion" keep
/// their numbers.
fn split_at_year(name: &str) -> (String, Option<i32>) {
    if let Some(caps) = RE_BRACKET_YEAR.captures(name) {
        let (Some(whole), Some(year)) = (caps.get(0), caps.get(1)) else {
            return (name.to_string(), None);
        };
        let year = year.as_str().parse().ok();
        let before = name[..whole.start()].trim();
        if before.is_empty() {
            // "[2019] Title" - drop the year, keep the rest
            let mut rest = name.to_string();
            rest.replace_range(whole.range(), " ");
            return (rest, year);
        }
        return (before.to_string(), year);
    }

    if let Some(caps) = RE_BARE_YEAR.captures(name) {
        if let (Some(title), Some(year)) = (caps.get(1), caps.get(2)) {
            return (title.as_str().to_string(), year.as_str().parse().ok());
        }
    }

    (name.to_string(), None)
}

fn clean_title_once(raw: &str) -> String {
    let name = split_separators(raw);
    let name = RE_IMDB_ID.replace_all(&name, " ");
    let (name, _) = split_at_year(&name);
    let name = RE_RELEASE_INFO.replace(&name, "");
    let name = RE_BRACKET_GROUP.replace_all(&name, " ");

    let cleaned = sanitize(&name);
    if cleaned.is_empty() {
        // Nothing survived the stripping; keep what we can of the input
        return sanitize(&split_separators(raw));
    }
    cleaned
}

/// Generic normalization: strips years, IMDb ids, release tags and noise.
///
/// Returns the display form ("Movie Title"); lower-casing happens when the
/// result is turned into a [`CanonicalKey`]. Idempotent.
pub fn normalize_title(raw: &str) -> String {
    let mut current = clean_title_once(raw);
    // A pass that changes the title either shortens it or splits separators,
    // so it settles well within this bound
    for _ in 0..=current.len() + 1 {
        let next = clean_title_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Release year removed by [`normalize_title`], if any
pub fn extract_year(raw: &str) -> Option<i32> {
    let name = split_separators(raw);
    let name = RE_IMDB_ID.replace_all(&name, " ");
    split_at_year(&name).1
}

/// "Movie Title (2019)" style name used for folders and pointer files
pub fn movie_display_name(raw: &str) -> String {
    let title = normalize_title(raw);
    match extract_year(raw) {
        Some(year) => format!("{} ({})", title, year),
        None => title,
    }
}

/// Parse season/episode markers from a TV-like title.
/// Supports:
/// - "Show Name S01E02" / "Show.Name.S01E02.1080p" / "Show-Name-S01E02"
/// - "Show Name Season 1 Episode 2"
/// - "Show Name 1x02"
///
/// The show name may be empty when the title is only a marker ("S01E02").
pub fn parse_episode(raw: &str) -> Option<ParsedEpisode> {
    let name = split_separators(raw);
    let name = RE_BRACKET_GROUP.replace_all(&name, " ");

    let caps = RE_SEASON_EP
        .captures(&name)
        .or_else(|| RE_CROSS_EP.captures(&name))?;

    let marker = caps.get(0)?;
    let season: u32 = caps.get(1)?.as_str().parse().ok()?;
    let episode: u32 = caps.get(2)?.as_str().parse().ok()?;

    let prefix = name[..marker.start()].trim();
    let show_name = if prefix.is_empty() {
        String::new()
    } else {
        normalize_title(prefix)
    };

    Some(ParsedEpisode {
        show_name,
        season,
        episode,
    })
}

/// Canonical key for a title, TV-like or generic.
///
/// TV-like titles without usable season/episode markers fall back to the
/// generic key and are treated as a single movie-like file.
pub fn canonical_key(raw: &str, tv_like: bool) -> CanonicalKey {
    if tv_like {
        match parse_episode(raw) {
            Some(parsed) if !parsed.show_name.is_empty() => return parsed.key(),
            _ => {
                tracing::warn!(
                    "No season/episode markers in '{}', treating it as a single file",
                    raw
                );
            }
        }
    }
    CanonicalKey::title(&normalize_title(raw))
}
