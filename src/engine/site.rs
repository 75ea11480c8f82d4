//! Site registry: where sources live, how they map to URLs, and a cache of
//! parsed files shared by every render of one build.
//!
//! ```text
//! root/
//! ├── processed/            templated sources   ──► public/<rel>[.html]
//! │   └── _partials/        private: includable, never written
//! └── static/               copied verbatim     ──► public/<rel>
//! ```

use super::{
    error::Result,
    expr::PathRef,
    file::ProcessedFile,
    include,
    location::Location,
    scope::Context,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Source extensions converted from Markdown, without the dot.
    pub extensions: Vec<String>,
    /// syntect theme used for fenced code blocks.
    pub highlight: String,
    pub output_extension: String,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_owned()],
            highlight: "InspiredGitHub".to_owned(),
            output_extension: "html".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteOptions {
    /// Absolute root of templated sources; `/x` resolves against it.
    pub source: PathBuf,
    /// Absolute root of static assets.
    pub assets: PathBuf,
    pub markdown: MarkdownOptions,
}

pub struct Site {
    options: SiteOptions,
    cache: RwLock<FxHashMap<PathBuf, Arc<ProcessedFile>>>,
    global: Option<Arc<Context>>,
}

impl Site {
    pub fn new(options: SiteOptions) -> Self {
        Self {
            options,
            cache: RwLock::new(FxHashMap::default()),
            global: None,
        }
    }

    pub fn with_global(mut self, global: Context) -> Self {
        self.global = Some(Arc::new(global));
        self
    }

    pub fn options(&self) -> &SiteOptions {
        &self.options
    }

    pub fn global(&self) -> Option<Arc<Context>> {
        self.global.clone()
    }

    /// Parsed file at `path`, read on first use.
    pub fn load(&self, path: &Path) -> Result<Arc<ProcessedFile>> {
        if let Some(file) = self.cache.read().get(path) {
            return Ok(Arc::clone(file));
        }

        let file = if path.starts_with(&self.options.assets) {
            ProcessedFile::asset(path)
        } else {
            let mut file = ProcessedFile::load(path)?;
            if self.is_markdown(path) {
                file.wrap_markdown(&self.options.markdown.output_extension);
            }
            file
        };

        let mut cache = self.cache.write();
        let entry = cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(file));
        Ok(Arc::clone(entry))
    }

    /// Resolve an include-style path written at `from`.
    pub fn resolve(&self, raw: &str, from: &Location) -> PathBuf {
        include::resolve(&self.options.source, &from.dir(), raw)
    }

    pub fn is_markdown(&self, path: &Path) -> bool {
        !path.starts_with(&self.options.assets)
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.options.markdown.extensions.iter().any(|m| m == ext))
    }

    /// Path relative to whichever root contains it.
    pub fn relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.options.source)
            .or_else(|_| path.strip_prefix(&self.options.assets))
            .ok()
    }

    /// A file is private when any component of its relative path starts
    /// with `_`.
    pub fn is_private(&self, path: &Path) -> bool {
        self.relative(path).is_some_and(|rel| {
            rel.components().any(|c| match c {
                Component::Normal(name) => name.to_string_lossy().starts_with('_'),
                _ => false,
            })
        })
    }

    /// Output path of `path` predicted from its name, for URLs of files not
    /// loaded yet. Loaded files go through [`Site::output_of`].
    pub fn output_relative(&self, path: &Path) -> Option<PathBuf> {
        let rel = self.relative(path)?;
        if self.is_markdown(path) {
            Some(rel.with_extension(&self.options.markdown.output_extension))
        } else {
            Some(rel.to_path_buf())
        }
    }

    /// Output path of a loaded file, relative to the output root.
    pub fn output_of(&self, file: &ProcessedFile) -> Option<PathBuf> {
        self.relative(&file.path).map(|rel| file.output_name(rel))
    }

    /// Site URL of the output of `path`, e.g. `/posts/hello.html`.
    pub fn url(&self, path: &Path) -> String {
        let Some(rel) = self.output_relative(path) else {
            return path.display().to_string();
        };
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        format!("/{}", parts.join("/"))
    }

    pub fn path_ref(&self, path: &Path) -> PathRef {
        PathRef {
            source: path.to_path_buf(),
            url: self.url(path),
        }
    }

    /// Non-private files directly inside `dir`, by file name.
    pub fn files_in(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('_') {
                continue;
            }
            files.push(entry.path());
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::content::Content;
    use tempfile::TempDir;

    fn site(root: &Path) -> Site {
        Site::new(SiteOptions {
            source: root.join("processed"),
            assets: root.join("static"),
            markdown: MarkdownOptions::default(),
        })
    }

    #[test]
    fn test_url_and_output_paths() {
        let site = site(Path::new("/proj"));
        let md = Path::new("/proj/processed/posts/hello.md");
        assert_eq!(
            site.output_relative(md),
            Some(PathBuf::from("posts/hello.html"))
        );
        assert_eq!(site.url(md), "/posts/hello.html");
        assert_eq!(site.url(Path::new("/proj/static/css/a.css")), "/css/a.css");
        assert!(!site.is_markdown(Path::new("/proj/static/readme.md")));
    }

    #[test]
    fn test_private_files() {
        let site = site(Path::new("/proj"));
        assert!(site.is_private(Path::new("/proj/processed/_layout.html")));
        assert!(site.is_private(Path::new("/proj/processed/_parts/nav.html")));
        assert!(!site.is_private(Path::new("/proj/processed/index.html")));
    }

    #[test]
    fn test_load_caches_and_wraps_markdown() {
        let dir = TempDir::new().unwrap();
        let processed = dir.path().join("processed");
        fs::create_dir_all(&processed).unwrap();
        fs::write(processed.join("a.md"), "# Title").unwrap();

        let site = site(dir.path());
        let first = site.load(&processed.join("a.md")).unwrap();
        let second = site.load(&processed.join("a.md")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(&first.content[0], Content::Markdown { .. }));
        assert_eq!(site.output_of(&first), Some(PathBuf::from("a.html")));
    }

    #[test]
    fn test_load_static_asset() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("static");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("logo.svg"), "{{ not a directive").unwrap();

        let site = site(dir.path());
        let file = site.load(&assets.join("logo.svg")).unwrap();
        assert!(matches!(&file.content[0], Content::Copy { .. }));
    }

    #[test]
    fn test_files_in_skips_private_and_dirs() {
        let dir = TempDir::new().unwrap();
        let posts = dir.path().join("processed/posts");
        fs::create_dir_all(posts.join("nested")).unwrap();
        for name in ["b.md", "a.md", "_draft.md"] {
            fs::write(posts.join(name), "").unwrap();
        }

        let site = site(dir.path());
        let files = site.files_in(&posts).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
