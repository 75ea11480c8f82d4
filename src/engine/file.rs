//! Parsed source files.

use super::{
    content::Content,
    directive::assemble,
    error::{Error, Result},
    scanner::scan,
};
use compact_str::CompactString;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug)]
pub struct ProcessedFile {
    pub path: PathBuf,
    /// Nodes as scanned, before any wrapping.
    pub raw: Arc<[Content]>,
    /// Nodes to render; differs from `raw` once Markdown-wrapped.
    pub content: Arc<[Content]>,
    /// Output extension replacing the source one, e.g. `html` for `.md`.
    pub new_extension: Option<CompactString>,
}

impl ProcessedFile {
    /// Scan and assemble `text`.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let nodes: Arc<[Content]> = Arc::from(assemble(scan(text, path)?));
        Ok(Self {
            path: path.to_path_buf(),
            raw: Arc::clone(&nodes),
            content: nodes,
            new_extension: None,
        })
    }

    /// Read and parse a template source.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let text = String::from_utf8(bytes).map_err(|_| Error::Utf8(path.to_path_buf()))?;
        Self::parse(path, &text)
    }

    /// A static asset: one node copying the file verbatim.
    pub fn asset(path: &Path) -> Self {
        let nodes: Arc<[Content]> = Arc::from(vec![Content::Copy {
            source: path.to_path_buf(),
        }]);
        Self {
            path: path.to_path_buf(),
            raw: Arc::clone(&nodes),
            content: nodes,
            new_extension: None,
        }
    }

    /// Replace the content with a single Markdown node over the raw nodes.
    pub fn wrap_markdown(&mut self, extension: &str) {
        self.content = Arc::from(vec![Content::Markdown {
            body: Arc::clone(&self.raw),
        }]);
        self.new_extension = Some(extension.into());
    }

    /// `rel` with the output extension applied.
    pub fn output_name(&self, rel: &Path) -> PathBuf {
        match &self.new_extension {
            Some(ext) => rel.with_extension(ext.as_str()),
            None => rel.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "{{ define t 1 }}x{{ if true }}{{ define inner 2 }}{{ end }}").unwrap();

        let file = ProcessedFile::load(&path).unwrap();
        assert_eq!(file.raw.len(), 3);
        assert!(Arc::ptr_eq(&file.raw, &file.content));
        assert!(file.new_extension.is_none());
        assert_eq!(file.output_name(Path::new("a.txt")), PathBuf::from("a.txt"));
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.txt");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(ProcessedFile::load(&path), Err(Error::Utf8(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.txt");
        assert!(matches!(ProcessedFile::load(&path), Err(Error::Io(..))));
    }

    #[test]
    fn test_wrap_markdown_keeps_raw() {
        let mut file = ProcessedFile::parse(Path::new("/s/a.md"), "# {{ eval t }}").unwrap();
        file.wrap_markdown("html");
        assert_eq!(file.raw.len(), 2);
        assert_eq!(file.content.len(), 1);
        assert!(matches!(&file.content[0], Content::Markdown { body } if body.len() == 2));
        assert_eq!(file.new_extension.as_deref(), Some("html"));
        assert_eq!(
            file.output_name(Path::new("posts/a.md")),
            PathBuf::from("posts/a.html")
        );
    }

    #[test]
    fn test_asset_is_single_copy() {
        let file = ProcessedFile::asset(Path::new("/s/static/logo.png"));
        assert!(matches!(&file.content[0], Content::Copy { .. }));
    }
}
