//! Default values for `quill.toml` fields, referenced by serde and educe.

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build]
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn source() -> PathBuf {
        "processed".into()
    }

    pub fn assets() -> PathBuf {
        "static".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn global() -> Option<PathBuf> {
        None
    }
}

// ============================================================================
// [markdown]
// ============================================================================

pub mod markdown {
    pub fn extensions() -> Vec<String> {
        vec!["md".into()]
    }

    pub fn highlight() -> String {
        "InspiredGitHub".into()
    }

    pub fn output_extension() -> String {
        "html".into()
    }
}

// ============================================================================
// [watch]
// ============================================================================

pub mod watch {
    pub fn debounce_ms() -> u64 {
        300
    }
}
