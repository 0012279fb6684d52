//! On-disk archive of fetched pages
//!
//! Each page is written once to `<dir>/<sanitized url>.html`. The returned
//! path is what the frontier stores as the record's `content_ref`.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

/// Longest file stem kept before the collision suffix and extension
const MAX_STEM_LEN: usize = 150;

/// Give up after this many same-named files
const MAX_COLLISIONS: u32 = 10_000;

/// Writes fetched HTML under a directory
#[derive(Debug, Clone)]
pub struct PageArchive {
    dir: PathBuf,
}

impl PageArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves `html` for `url` and returns the path written
    ///
    /// Never overwrites: a name already taken gets a `_1`, `_2`, ... suffix.
    pub async fn save(&self, url: &Url, html: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stem = file_stem_for(url);

        for n in 0..MAX_COLLISIONS {
            let name = if n == 0 {
                format!("{}.html", stem)
            } else {
                format!("{}_{}.html", stem, n)
            };
            let path = self.dir.join(name);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(html.as_bytes()).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("too many archived pages named {}", stem),
        ))
    }
}

/// Builds a filesystem-safe stem from host, path and query
pub fn file_stem_for(url: &Url) -> String {
    let mut raw = String::new();
    raw.push_str(url.host_str().unwrap_or("page"));
    raw.push_str(url.path());
    if let Some(query) = url.query() {
        raw.push('_');
        raw.push_str(query);
    }

    let mut stem = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            c
        } else {
            '_'
        };
        // collapse runs of separators
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }

    let stem = stem.trim_matches(|c| c == '_' || c == '.');
    let stem: String = stem.chars().take(MAX_STEM_LEN).collect();
    if stem.is_empty() {
        "index".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_stem_from_host_and_path() {
        assert_eq!(
            file_stem_for(&url("http://example.com/news/today")),
            "example.com_news_today"
        );
    }

    #[test]
    fn test_stem_root_path() {
        assert_eq!(file_stem_for(&url("http://example.com/")), "example.com");
    }

    #[test]
    fn test_stem_includes_query() {
        assert_eq!(
            file_stem_for(&url("http://example.com/list?page=2&sort=asc")),
            "example.com_list_page_2_sort_asc"
        );
    }

    #[test]
    fn test_stem_is_truncated() {
        let long = format!("http://example.com/{}", "a".repeat(400));
        assert_eq!(file_stem_for(&url(&long)).len(), MAX_STEM_LEN);
    }

    #[test]
    fn test_stem_percent_encoding_sanitized() {
        let stem = file_stem_for(&url("http://example.com/矿山/新闻"));
        assert!(stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_'));
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = TempDir::new().unwrap();
        let archive = PageArchive::new(dir.path().join("pages"));

        let path = archive
            .save(&url("http://example.com/a"), "<html>A</html>")
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "example.com_a.html");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html>A</html>");
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let archive = PageArchive::new(dir.path());

        let first = archive
            .save(&url("http://example.com/a?x=1"), "first")
            .await
            .unwrap();
        // Different URL, same sanitized stem
        let second = archive
            .save(&url("http://example.com/a?x_1"), "second")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "example.com_a_x_1_1.html");
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "second");
    }
}
