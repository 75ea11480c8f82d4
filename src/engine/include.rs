//! Path resolution for the include family and the inclusion chain.
//!
//! # Resolution
//!
//! | Argument      | Resolved against                                       |
//! |---------------|--------------------------------------------------------|
//! | `/a/b.html`   | the source root                                        |
//! | `.../b.html`  | the including file's directory, then each ancestor     |
//! | `a/../b.html` | the including file's directory, `..` clamped at root   |

use super::{
    error::{Error, Result},
    location::Location,
};
use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

const CLIMB: &str = ".../";

/// Resolve `raw` as written in a file located in `from_dir`.
///
/// A climbing path that matches nothing comes back joined onto `from_dir`,
/// where it is already known to be missing.
pub fn resolve(root: &Path, from_dir: &Path, raw: &str) -> PathBuf {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('/') {
        return join_clamped(root, root, rest);
    }
    if let Some(tail) = raw.strip_prefix(CLIMB) {
        return climb(root, from_dir, tail);
    }
    join_clamped(root, from_dir, raw)
}

/// Join `rel` onto `base` without letting `..` leave the root.
///
/// `base` outside of `root` (static assets) is its own floor.
fn join_clamped(root: &Path, base: &Path, rel: &str) -> PathBuf {
    let floor = if base.starts_with(root) { root } else { base };
    let mut out = base.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::ParentDir => {
                if out != floor && out.starts_with(floor) {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn climb(root: &Path, from_dir: &Path, tail: &str) -> PathBuf {
    let mut dir = from_dir.to_path_buf();
    loop {
        let candidate = join_clamped(root, &dir, tail);
        if candidate.is_file() {
            return candidate;
        }
        if dir == root || !dir.starts_with(root) || !dir.pop() {
            break;
        }
    }
    join_clamped(root, from_dir, tail)
}

// ============================================================================
// Inclusion chain
// ============================================================================

#[derive(Debug, Clone)]
struct Link {
    path: PathBuf,
    location: Location,
}

/// Files currently being expanded, outermost first.
#[derive(Debug, Clone)]
pub struct Chain {
    links: Vec<Link>,
}

impl Chain {
    /// Chain rooted at the file being rendered.
    pub fn new(root: &Path) -> Self {
        Self {
            links: vec![Link {
                path: root.to_path_buf(),
                location: Location::start_of(root),
            }],
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.links.iter().any(|link| link.path == path)
    }

    /// Fail if expanding `path` from `location` would re-enter a file
    /// already on the chain.
    pub fn check(&self, path: &Path, location: &Location) -> Result<()> {
        if self.contains(path) {
            return Err(Error::Cycle {
                path: path.to_path_buf(),
                location: location.clone(),
                chain: format!("{self} -> {location}"),
            });
        }
        Ok(())
    }

    pub fn push(&mut self, path: PathBuf, location: Location) {
        self.links.push(Link { path, location });
    }

    pub fn pop(&mut self) {
        // The root link stays for the whole render.
        if self.links.len() > 1 {
            self.links.pop();
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", link.location)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_absolute_joins_root() {
        let root = Path::new("/site/processed");
        let from = Path::new("/site/processed/posts/2024");
        assert_eq!(
            resolve(root, from, "/partials/head.html"),
            PathBuf::from("/site/processed/partials/head.html")
        );
    }

    #[test]
    fn test_relative_joins_file_dir() {
        let root = Path::new("/site/processed");
        let from = Path::new("/site/processed/posts");
        assert_eq!(
            resolve(root, from, "./img/../a.txt"),
            PathBuf::from("/site/processed/posts/a.txt")
        );
    }

    #[test]
    fn test_parent_segments_are_clamped() {
        let root = Path::new("/site/processed");
        let from = Path::new("/site/processed/posts");
        assert_eq!(
            resolve(root, from, "../../../../etc/passwd"),
            PathBuf::from("/site/processed/etc/passwd")
        );
        assert_eq!(
            resolve(root, from, "/../secret"),
            PathBuf::from("/site/processed/secret")
        );
    }

    #[test]
    fn test_climb_finds_nearest_ancestor() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("layout.html"), "root").unwrap();
        fs::write(root.join("a/layout.html"), "a").unwrap();

        let found = resolve(root, &root.join("a/b/c"), ".../layout.html");
        assert_eq!(found, root.join("a/layout.html"));

        let found = resolve(root, root, ".../layout.html");
        assert_eq!(found, root.join("layout.html"));
    }

    #[test]
    fn test_climb_miss_stays_under_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("processed");
        fs::create_dir_all(root.join("posts")).unwrap();
        // same name outside the root must not be picked up
        fs::write(dir.path().join("nowhere.html"), "outside").unwrap();

        let found = resolve(&root, &root.join("posts"), ".../nowhere.html");
        assert_eq!(found, root.join("posts/nowhere.html"));
        assert!(!found.is_file());
    }

    #[test]
    fn test_chain_detects_self_inclusion() {
        let root = Path::new("/site/a.txt");
        let chain = Chain::new(root);
        let loc = Location::start_of(root).at(3, 1);

        let err = chain.check(root, &loc).unwrap_err();
        match err {
            Error::Cycle { chain, .. } => {
                assert_eq!(chain, "/site/a.txt:1:1 -> /site/a.txt:3:1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_chain_push_pop() {
        let root = Path::new("/site/a.txt");
        let b = PathBuf::from("/site/b.txt");
        let mut chain = Chain::new(root);
        let loc = Location::start_of(root).at(2, 1);

        assert!(chain.check(&b, &loc).is_ok());
        chain.push(b.clone(), loc.clone());
        assert!(chain.check(&b, &loc).is_err());
        assert_eq!(chain.to_string(), "/site/a.txt:1:1 -> /site/a.txt:2:1");

        chain.pop();
        chain.pop();
        assert_eq!(chain.to_string(), "/site/a.txt:1:1");
        assert!(!chain.contains(&b));
    }
}
