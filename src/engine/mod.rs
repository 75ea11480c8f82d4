//! The directive language engine.
//!
//! ```text
//! source text ─► scanner ─► directive ─► ProcessedFile ─► Renderer ─► bytes
//!                  │            │                            │
//!                escapes    content tree              Stack + Chain
//!                            (+ expr)                 (per render)
//! ```
//!
//! A [`Site`] caches parsed files and is shared by all renders of a build.
//! Each render owns its own context stack and inclusion chain.

pub mod content;
pub mod directive;
pub mod error;
pub mod expr;
pub mod file;
pub mod include;
pub mod iter;
pub mod location;
pub mod render;
pub mod scanner;
pub mod scope;
pub mod site;

pub use render::{Renderer, file_scope};
pub use scope::{Context, Stack};
pub use site::{MarkdownOptions, Site, SiteOptions};
