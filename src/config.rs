// Configuration module for m3u2strm
// Handles XDG-compliant directory paths and the TOML configuration file

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Category;
use crate::scanner::{LibraryDir, VIDEO_EXTENSIONS};

const APP_NAME: &str = "m3u2strm";
const CONFIG_FILENAME: &str = "config.toml";

/// Fatal startup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no playlist configured (set paths.playlist or M3U2STRM_PLAYLIST)")]
    MissingPlaylist,

    #[error("playlist file {0} does not exist")]
    PlaylistNotFound(PathBuf),

    #[error("run.max_workers must be at least 1")]
    InvalidWorkers,
}

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Input/output file locations
    pub paths: PathsConfig,

    /// Existing media directories to scan for duplicates
    pub library: LibraryConfig,

    /// Group-label keywords per category
    pub classifier: ClassifierConfig,

    /// Genre lookup configuration
    pub metadata: MetadataConfig,

    /// Run behaviour
    pub run: RunConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// M3U playlist to convert (required)
    pub playlist: Option<PathBuf>,

    /// Root for the generated pointer files (default: <data_dir>/strm)
    pub output_dir: Option<PathBuf>,

    /// Log file (default: <data_dir>/m3u2strm.log)
    pub log_file: Option<PathBuf>,

    /// Conversion history (default: <data_dir>/history.json)
    pub history_file: Option<PathBuf>,

    /// Persisted existing-media cache; unset disables persistence
    pub media_cache_file: Option<PathBuf>,

    /// Override data directory
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Fallback directory for every category without its own list
    pub existing_media_dir: Option<PathBuf>,

    pub movies: Vec<PathBuf>,
    pub tv: Vec<PathBuf>,
    pub documentaries: Vec<PathBuf>,
    pub animation: Vec<PathBuf>,
    pub standup: Vec<PathBuf>,

    /// Video file extensions to scan (lowercase, without dots)
    pub video_extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            existing_media_dir: None,
            movies: Vec::new(),
            tv: Vec::new(),
            documentaries: Vec::new(),
            animation: Vec::new(),
            standup: Vec::new(),
            video_extensions: VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl LibraryConfig {
    fn dirs_for(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Movie => &self.movies,
            Category::TvShow => &self.tv,
            Category::Documentary => &self.documentaries,
            Category::Animation => &self.animation,
            Category::StandUp => &self.standup,
        }
    }

    /// Directories to scan, one entry per (path, category).
    ///
    /// A path listed under several categories that share a normalization
    /// variant is only scanned once.
    pub fn library_dirs(&self) -> Vec<LibraryDir> {
        let mut dirs: Vec<LibraryDir> = Vec::new();

        for category in Category::ALL {
            let configured = self.dirs_for(category);
            let paths: Vec<&PathBuf> = if configured.is_empty() {
                self.existing_media_dir.iter().collect()
            } else {
                configured.iter().collect()
            };

            for path in paths {
                let already_scanned = dirs.iter().any(|d| {
                    d.path == *path && d.category.is_tv_like() == category.is_tv_like()
                });
                if !already_scanned {
                    dirs.push(LibraryDir {
                        path: path.clone(),
                        category,
                    });
                }
            }
        }

        dirs
    }
}

/// Keywords matched (case-insensitively, as substrings) against group labels
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub tv_keywords: Vec<String>,
    pub animation_keywords: Vec<String>,
    pub documentary_keywords: Vec<String>,
    pub standup_keywords: Vec<String>,
    pub movie_keywords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tv_keywords: strings(&["series", "tv show", "tv series", "| tv", "tv |"]),
            animation_keywords: strings(&["animation", "anime", "cartoon"]),
            documentary_keywords: strings(&["documentar", "docs"]),
            standup_keywords: strings(&["stand-up", "standup", "stand up"]),
            movie_keywords: strings(&["movie", "film", "vod", "cinema"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// TMDB API key (optional, enables genre lookups)
    pub tmdb_api_key: Option<String>,

    /// Query TMDB genres to spot documentaries in movie groups (default: true)
    pub lookup_genres: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            lookup_genres: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Log what would be written without touching the disk (default: false)
    pub dry_run: bool,

    /// Directories scanned in parallel (default: 5)
    pub max_workers: usize,

    /// Ignore a persisted media cache and scan again (default: false)
    pub rescan: bool,

    /// Pointer file extension (default: strm)
    pub strm_extension: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_workers: 5,
            rescan: false,
            strm_extension: "strm".to_string(),
        }
    }
}

/// Environment variables that override the config file
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub playlist: Option<PathBuf>,
    pub tmdb_api_key: Option<String>,
    pub dry_run: Option<bool>,
    pub max_workers: Option<usize>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            playlist: std::env::var("M3U2STRM_PLAYLIST").ok().map(PathBuf::from),
            tmdb_api_key: std::env::var("TMDB_API_KEY").ok().filter(|k| !k.is_empty()),
            dry_run: std::env::var("M3U2STRM_DRY_RUN")
                .ok()
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1"),
            max_workers: std::env::var("M3U2STRM_MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// Application paths following XDG Base Directory Specification on Unix
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding config.toml
    /// XDG: $XDG_CONFIG_HOME/m3u2strm or ~/.config/m3u2strm
    pub config_dir: PathBuf,

    /// Directory for history, caches, logs and default output
    /// XDG: $XDG_DATA_HOME/m3u2strm or ~/.local/share/m3u2strm
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Resolve the data directory once the config file is known
    ///
    /// Priority order:
    /// 1. M3U2STRM_DATA_DIR
    /// 2. Config file override
    /// 3. XDG/platform data directory
    /// 4. Current directory
    pub fn new(config_dir: PathBuf, data_override: &Option<PathBuf>) -> Self {
        Self {
            data_dir: Self::resolve_data_dir(data_override),
            config_dir,
        }
    }

    /// Current directory for everything (portable mode)
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_dir: cwd.clone(),
            data_dir: cwd,
        }
    }

    fn resolve_data_dir(config_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("M3U2STRM_DATA_DIR") {
            return PathBuf::from(path);
        }

        if let Some(ref path) = config_override {
            return path.clone();
        }

        if let Some(dir) = dirs::data_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("M3U2STRM_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub paths: AppPaths,
    pub playlist: PathBuf,
    pub output_dir: PathBuf,
    pub log_file: PathBuf,
    pub history_file: PathBuf,
    pub media_cache_file: Option<PathBuf>,
    pub library_dirs: Vec<LibraryDir>,
    pub video_extensions: Vec<String>,
    pub classifier: ClassifierConfig,
    pub tmdb_api_key: Option<String>,
    pub lookup_genres: bool,
    pub dry_run: bool,
    pub max_workers: usize,
    pub rescan: bool,
    pub strm_extension: String,
}

impl AppConfig {
    /// Load configuration from the TOML file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let portable_mode = std::env::var("M3U2STRM_PORTABLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let config_dir = if portable_mode {
            AppPaths::current_dir().config_dir
        } else {
            AppPaths::find_config_dir()
        };

        let config_path = config_dir.join(CONFIG_FILENAME);
        let config_file = Self::load_config_file(&config_path)?;

        let paths = if portable_mode {
            AppPaths::current_dir()
        } else {
            AppPaths::new(config_dir, &config_file.paths.data_dir)
        };

        let config = Self::build(config_file, paths, EnvOverrides::from_env())?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config.toml
    pub fn load_config_file(config_path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(config_path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: config_path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Combine the config file, resolved paths and environment overrides
    pub fn build(
        config_file: ConfigFile,
        paths: AppPaths,
        env: EnvOverrides,
    ) -> Result<Self, ConfigError> {
        let ConfigFile {
            paths: file_paths,
            library,
            classifier,
            metadata,
            run,
        } = config_file;

        // Playlist: env > config, required
        let playlist = env
            .playlist
            .or(file_paths.playlist)
            .ok_or(ConfigError::MissingPlaylist)?;

        let max_workers = env.max_workers.unwrap_or(run.max_workers);
        if max_workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }

        let data_dir = paths.data_dir.clone();
        let strm_extension = run.strm_extension.trim_start_matches('.').to_string();

        Ok(Self {
            playlist,
            output_dir: file_paths
                .output_dir
                .unwrap_or_else(|| data_dir.join("strm")),
            log_file: file_paths
                .log_file
                .unwrap_or_else(|| data_dir.join(format!("{}.log", APP_NAME))),
            history_file: file_paths
                .history_file
                .unwrap_or_else(|| data_dir.join("history.json")),
            media_cache_file: file_paths.media_cache_file,
            library_dirs: library.library_dirs(),
            video_extensions: library
                .video_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            classifier,
            // TMDB API key: env > config
            tmdb_api_key: env
                .tmdb_api_key
                .or(metadata.tmdb_api_key)
                .filter(|k| !k.trim().is_empty()),
            lookup_genres: metadata.lookup_genres,
            dry_run: env.dry_run.unwrap_or(run.dry_run),
            max_workers,
            rescan: run.rescan,
            strm_extension: if strm_extension.is_empty() {
                "strm".to_string()
            } else {
                strm_extension
            },
            paths,
        })
    }

    /// Checks that need the filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.playlist.is_file() {
            return Err(ConfigError::PlaylistNotFound(self.playlist.clone()));
        }
        Ok(())
    }

    /// Log configuration status
    pub fn log_config(&self) {
        tracing::info!(
            "Loaded configuration from {}",
            self.paths.config_file_path().display()
        );
        tracing::info!("Playlist: {}", self.playlist.display());
        tracing::info!("Output directory: {}", self.output_dir.display());
        tracing::debug!("Data directory: {}", self.paths.data_dir.display());
        tracing::debug!("History file: {}", self.history_file.display());

        if self.library_dirs.is_empty() {
            tracing::warn!("No existing media directories configured; nothing will be deduplicated");
        }
        for dir in &self.library_dirs {
            tracing::debug!("Library ({}): {}", dir.category, dir.path.display());
        }

        if let Some(ref path) = self.media_cache_file {
            tracing::debug!("Media cache file: {}", path.display());
        }

        if !self.lookup_genres {
            tracing::debug!("Genre lookups: disabled");
        } else if self.tmdb_api_key.is_some() {
            tracing::info!("Genre lookups: TMDB");
        } else {
            tracing::warn!("TMDB API key not configured; genre lookups disabled");
            tracing::info!("Hint: Add tmdb_api_key to config.toml or set TMDB_API_KEY env var");
        }

        if self.dry_run {
            tracing::info!("Dry run: ENABLED (no files will be written)");
        }
        tracing::debug!("Cache build workers: {}", self.max_workers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> AppPaths {
        AppPaths {
            config_dir: PathBuf::from("/config"),
            data_dir: PathBuf::from("/data"),
        }
    }

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();
        assert!(config.paths.playlist.is_none());
        assert!(!config.run.dry_run);
        assert_eq!(config.run.max_workers, 5);
        assert_eq!(config.run.strm_extension, "strm");
        assert!(config.metadata.lookup_genres);
        assert!(config.library.video_extensions.contains(&"mkv".to_string()));
    }

    #[test]
    fn test_default_tv_keywords_need_more_than_two_letters() {
        use crate::playlist::classify::{ClassificationRule, Classifier};
        use crate::playlist::classify::tests::FakeGenres;

        let rules = ClassificationRule::ordered(&ClassifierConfig::default());
        let classifier: Classifier<FakeGenres> = Classifier::new(rules, None);

        assert_eq!(classifier.classify_group("TVOD Movies"), Category::Movie);
        assert_eq!(classifier.classify_group("HBO MAX TV Films"), Category::Movie);
        assert_eq!(classifier.classify_group("TV Shows"), Category::TvShow);
        assert_eq!(classifier.classify_group("UK | TV"), Category::TvShow);
        assert_eq!(classifier.classify_group("Netflix Series"), Category::TvShow);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[paths]
playlist = "/iptv/playlist.m3u"
output_dir = "/media/strm"
media_cache_file = "/var/cache/media.json"

[library]
existing_media_dir = "/media"
tv = ["/media/TV", "/media/More TV"]

[classifier]
tv_keywords = ["series"]
movie_keywords = ["vod"]

[metadata]
tmdb_api_key = "test_key"

[run]
dry_run = true
max_workers = 8
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.paths.playlist,
            Some(PathBuf::from("/iptv/playlist.m3u"))
        );
        assert_eq!(config.library.tv.len(), 2);
        assert_eq!(config.classifier.tv_keywords, vec!["series".to_string()]);
        // Unspecified keyword lists keep their defaults
        assert!(!config.classifier.documentary_keywords.is_empty());
        assert_eq!(config.metadata.tmdb_api_key, Some("test_key".to_string()));
        assert!(config.run.dry_run);
        assert_eq!(config.run.max_workers, 8);

        let app = AppConfig::build(config, test_paths(), EnvOverrides::default()).unwrap();
        assert_eq!(app.output_dir, PathBuf::from("/media/strm"));
        assert_eq!(app.log_file, PathBuf::from("/data/m3u2strm.log"));
        assert_eq!(app.history_file, PathBuf::from("/data/history.json"));
        assert_eq!(
            app.media_cache_file,
            Some(PathBuf::from("/var/cache/media.json"))
        );
        assert!(app.dry_run);
    }

    #[test]
    fn test_missing_playlist_is_fatal() {
        let result = AppConfig::build(
            ConfigFile::default(),
            test_paths(),
            EnvOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::MissingPlaylist)));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut config = ConfigFile::default();
        config.paths.playlist = Some(PathBuf::from("/p.m3u"));
        config.run.max_workers = 0;
        let result = AppConfig::build(config, test_paths(), EnvOverrides::default());
        assert!(matches!(result, Err(ConfigError::InvalidWorkers)));
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = ConfigFile::default();
        config.paths.playlist = Some(PathBuf::from("/from/file.m3u"));
        config.metadata.tmdb_api_key = Some("file_key".to_string());

        let env = EnvOverrides {
            playlist: Some(PathBuf::from("/from/env.m3u")),
            tmdb_api_key: Some("env_key".to_string()),
            dry_run: Some(true),
            max_workers: Some(2),
        };
        let app = AppConfig::build(config, test_paths(), env).unwrap();
        assert_eq!(app.playlist, PathBuf::from("/from/env.m3u"));
        assert_eq!(app.tmdb_api_key, Some("env_key".to_string()));
        assert!(app.dry_run);
        assert_eq!(app.max_workers, 2);
    }

    #[test]
    fn test_library_dirs_fallback_and_dedup() {
        let library = LibraryConfig {
            existing_media_dir: Some(PathBuf::from("/media")),
            tv: vec![PathBuf::from("/media/TV")],
            ..Default::default()
        };
        let dirs = library.library_dirs();

        // /media once for the generic categories, /media/TV for TV and
        // /media again for animation (TV-like variant)
        assert_eq!(
            dirs,
            vec![
                LibraryDir {
                    path: PathBuf::from("/media"),
                    category: Category::Movie
                },
                LibraryDir {
                    path: PathBuf::from("/media/TV"),
                    category: Category::TvShow
                },
                LibraryDir {
                    path: PathBuf::from("/media"),
                    category: Category::Animation
                },
            ]
        );
    }

    #[test]
    fn test_load_config_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.toml");
        assert!(matches!(
            AppConfig::load_config_file(&missing),
            Err(ConfigError::NotFound(_))
        ));

        std::fs::write(&missing, "[run]\nmax_workers = \"lots\"\n").unwrap();
        assert!(matches!(
            AppConfig::load_config_file(&missing),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_requires_existing_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigFile::default();
        config.paths.playlist = Some(dir.path().join("missing.m3u"));
        let app = AppConfig::build(config, test_paths(), EnvOverrides::default()).unwrap();
        assert!(matches!(
            app.validate(),
            Err(ConfigError::PlaylistNotFound(_))
        ));

        std::fs::write(dir.path().join("missing.m3u"), "#EXTM3U\n").unwrap();
        assert!(app.validate().is_ok());
    }
}
