//! Read-on-first-need access to the file being identified.

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::warn;

/// Number of leading bytes ever inspected for content matching.
pub const MAX_DATA: usize = 16 * 1024;

#[derive(Debug)]
enum State {
    NotRead,
    Read(Bytes),
    Unavailable,
}

/// Lazily reads the first [`MAX_DATA`] bytes of a file, at most once.
///
/// A failure to open or read is logged once and then remembered: the file is
/// reported as unreadable and its data as empty.
#[derive(Debug)]
pub struct FileMatchContext {
    path: PathBuf,
    file_name: String,
    state: State,
}

impl FileMatchContext {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path,
            file_name,
            state: State::NotRead,
        }
    }

    /// The final path component, or an empty string.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub async fn is_readable(&mut self) -> bool {
        self.load().await;
        matches!(self.state, State::Read(_))
    }

    /// The file's leading bytes; empty when the file could not be read.
    pub async fn data(&mut self) -> Bytes {
        self.load().await;
        match &self.state {
            State::Read(data) => data.clone(),
            _ => Bytes::new(),
        }
    }

    async fn load(&mut self) {
        if !matches!(self.state, State::NotRead) {
            return;
        }
        self.state = match read_prefix(&self.path).await {
            Ok(data) => State::Read(data),
            Err(e) => {
                warn!("Cannot open {}: {e}", self.path.display());
                State::Unavailable
            }
        };
    }
}

async fn read_prefix(path: &Path) -> io::Result<Bytes> {
    let file = File::open(path).await?;
    let mut data = Vec::new();
    file.take(MAX_DATA as u64).read_to_end(&mut data).await?;
    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_test::traced_test;

    #[test]
    fn test_reads_bounded_prefix() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'a'; MAX_DATA + 100]).unwrap();

        tokio_test::block_on(async {
            let mut ctx = FileMatchContext::new(file.path());
            assert!(ctx.is_readable().await);
            assert_eq!(ctx.data().await.len(), MAX_DATA);
        });
    }

    #[test]
    fn test_small_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4").unwrap();

        tokio_test::block_on(async {
            let mut ctx = FileMatchContext::new(file.path());
            assert_eq!(&ctx.data().await[..], b"%PDF-1.4");
        });
    }

    #[test]
    #[traced_test]
    fn test_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        tokio_test::block_on(async {
            let mut ctx = FileMatchContext::new(&path);
            assert_eq!(ctx.file_name(), "missing.txt");
            assert!(!ctx.is_readable().await);
            assert!(ctx.data().await.is_empty());
        });
        assert!(logs_contain("Cannot open"));
    }

    #[test]
    fn test_file_name_of_bare_root() {
        assert_eq!(FileMatchContext::new("/").file_name(), "");
        assert_eq!(FileMatchContext::new("dir/report.txt").file_name(), "report.txt");
    }
}
