// Pointer file output
//
// Layout under the output directory:
//   <Category>/<Title (Year)>/<Title (Year)>.strm
//   <Category>/<Show>/Season <N>/<Show> SxxEyy.strm

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::models::Category;
use crate::scanner::normalize::{movie_display_name, parse_episode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Created(PathBuf),
    /// Dry run: the file would have been created here
    DryRun(PathBuf),
    /// A file already exists at the target and was left untouched
    AlreadyExists(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StrmWriter {
    output_dir: PathBuf,
    extension: String,
    dry_run: bool,
}

impl StrmWriter {
    pub fn new(output_dir: PathBuf, extension: &str, dry_run: bool) -> Self {
        Self {
            output_dir,
            extension: extension.trim_start_matches('.').to_string(),
            dry_run,
        }
    }

    /// Where the pointer file for `title` goes.
    ///
    /// TV-like titles with a show name and markers get the season layout,
    /// everything else the movie layout.
    pub fn target_path(&self, category: Category, title: &str) -> Result<PathBuf> {
        let category_dir = self.output_dir.join(category.folder_name());

        if category.is_tv_like() {
            if let Some(parsed) = parse_episode(title).filter(|p| !p.show_name.is_empty()) {
                return Ok(category_dir
                    .join(&parsed.show_name)
                    .join(format!("Season {}", parsed.season))
                    .join(format!("{}.{}", parsed.display(), self.extension)));
            }
        }

        let name = movie_display_name(title);
        if name.trim().is_empty() {
            anyhow::bail!("No usable file name for title '{}'", title);
        }

        Ok(category_dir
            .join(&name)
            .join(format!("{}.{}", name, self.extension)))
    }

    /// Write the pointer file. Never overwrites an existing file.
    pub async fn write(&self, category: Category, title: &str, url: &str) -> Result<WriteOutcome> {
        let path = self.target_path(category, title)?;

        if self.dry_run {
            tracing::info!("[DRY RUN] Would create {} with URL {}", path.display(), url);
            return Ok(WriteOutcome::DryRun(path));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(WriteOutcome::AlreadyExists(path));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()));
            }
        };

        write_or_remove(file, &path, url).await?;
        Ok(WriteOutcome::Created(path))
    }
}

/// Write the URL line into a freshly created file. On failure the file is
/// removed so a later run can create it again.
async fn write_or_remove<W: AsyncWrite + Unpin>(mut file: W, path: &Path, url: &str) -> Result<()> {
    let written = async {
        file.write_all(format!("{}\n", url).as_bytes()).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path).await {
            tracing::warn!(
                "Failed to remove incomplete {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};

    /// Writer whose every write fails, like a full disk
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_movie_layout() {
        let writer = StrmWriter::new(PathBuf::from("/out"), "strm", false);
        let path = writer
            .target_path(Category::Movie, "The.Matrix.1999.1080p.BluRay")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/out/Movies/The Matrix (1999)/The Matrix (1999).strm")
        );

        let path = writer.target_path(Category::StandUp, "Some Special").unwrap();
        assert_eq!(
            path,
            PathBuf::from("/out/Stand-Up/Some Special/Some Special.strm")
        );
    }

    #[test]
    fn test_episode_layout() {
        let writer = StrmWriter::new(PathBuf::from("/out"), ".strm", false);
        let path = writer
            .target_path(Category::TvShow, "Breaking.Bad.S02E05.720p")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/out/TV Shows/Breaking Bad/Season 2/Breaking Bad S02E05.strm")
        );
    }

    #[test]
    fn test_tv_title_without_markers_uses_movie_layout() {
        let writer = StrmWriter::new(PathBuf::from("/out"), "strm", false);
        let path = writer
            .target_path(Category::Animation, "Spirited Away (2001)")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/out/Animation/Spirited Away (2001)/Spirited Away (2001).strm")
        );
    }

    #[tokio::test]
    async fn test_write_creates_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StrmWriter::new(dir.path().to_path_buf(), "strm", false);

        let outcome = writer
            .write(Category::Movie, "Heat (1995)", "http://example.com/heat")
            .await
            .unwrap();
        let path = match outcome {
            WriteOutcome::Created(path) => path,
            other => panic!("expected a created file, got {:?}", other),
        };
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "http://example.com/heat\n"
        );

        // Existing files are never overwritten
        let outcome = writer
            .write(Category::Movie, "Heat (1995)", "http://example.com/other")
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::AlreadyExists(path.clone()));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "http://example.com/heat\n"
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StrmWriter::new(dir.path().to_path_buf(), "strm", false);
        let path = writer.target_path(Category::Movie, "Heat (1995)").unwrap();

        // The file exists once create_new succeeded, before any write
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"").unwrap();

        let result = write_or_remove(FullDisk, &path, "http://example.com/heat").await;
        assert!(result.is_err());
        assert!(!path.exists());

        // The next attempt creates the file instead of reporting it as converted
        let outcome = writer
            .write(Category::Movie, "Heat (1995)", "http://example.com/heat")
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Created(path.clone()));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "http://example.com/heat\n"
        );
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let writer = StrmWriter::new(out.clone(), "strm", true);

        let outcome = writer
            .write(Category::Documentary, "Free Solo (2018)", "http://example.com/fs")
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::DryRun(_)));
        assert!(!out.exists());
    }
}
