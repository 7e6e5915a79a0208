//! The read-only input boundary: something that can hand over the page markup.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Markup and location of the chat page at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub html: String,
    pub url: String,
}

impl PageSnapshot {
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            url: url.into(),
        }
    }
}

/// Source of page snapshots. Only called when the extractor actually parses.
pub trait PageSource {
    fn snapshot(&self) -> Result<PageSnapshot>;
}

impl PageSource for PageSnapshot {
    fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(self.clone())
    }
}

/// A page saved to disk.
#[derive(Debug, Clone)]
pub struct HtmlFile {
    path: PathBuf,
    url: Option<String>,
}

impl HtmlFile {
    pub fn new(path: impl AsRef<Path>, url: Option<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            url,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for HtmlFile {
    fn snapshot(&self) -> Result<PageSnapshot> {
        let html = fs::read_to_string(&self.path)?;
        let url = self
            .url
            .clone()
            .unwrap_or_else(|| format!("file://{}", self.path.display()));
        Ok(PageSnapshot { html, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_page_defaults_to_file_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html><title>Saved</title></html>").unwrap();

        let page = HtmlFile::new(file.path(), None);
        let snapshot = page.snapshot().unwrap();
        assert!(snapshot.html.contains("<title>Saved</title>"));
        assert_eq!(snapshot.url, format!("file://{}", file.path().display()));

        let page = HtmlFile::new(file.path(), Some("https://chat.example/c/1".into()));
        assert_eq!(page.snapshot().unwrap().url, "https://chat.example/c/1");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let page = HtmlFile::new("/nonexistent/chatpack/page.html", None);
        assert!(matches!(page.snapshot(), Err(crate::error::Error::Io(_))));
    }
}
