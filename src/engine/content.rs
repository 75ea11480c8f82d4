//! Content nodes: the parsed, immutable form of a source file.
//!
//! ```text
//! "A {{ if x }}B{{ end }}"
//!        │
//!        ▼
//! [Text("A "), If { cond: x, body: [Text("B")] }]
//! ```
//!
//! Nodes never change after scanning. Rendering asks each node for a [`Step`]:
//! write bytes, expand into further nodes, or do nothing visible.

use super::{
    expr::{Expr, Value},
    iter::Iterable,
    location::Location,
    scope::Frame,
};
use compact_str::CompactString;
use std::{path::PathBuf, sync::Arc};

/// Original directive text and where it started.
///
/// Any directive that fails at render time writes `text` back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub text: String,
    pub location: Location,
}

/// Argument of the include family: a literal path or `eval <expr>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Literal(String),
    Eval(Expr),
}

/// A node sequence with the location it was declared at.
///
/// Carried inside [`Value::Content`] for slots and `__contents__`.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub nodes: Arc<[Content]>,
    pub location: Location,
}

#[derive(Debug)]
pub enum Content {
    Text(String),
    Define {
        name: CompactString,
        expr: Expr,
        origin: Origin,
    },
    Eval {
        expr: Expr,
        origin: Origin,
    },
    If {
        cond: Expr,
        body: Arc<[Content]>,
        origin: Origin,
    },
    For {
        var: CompactString,
        iterable: Iterable,
        body: Arc<[Content]>,
        origin: Origin,
    },
    Include {
        target: Target,
        /// Already HTML: rendered outside the surrounding Markdown run.
        html: bool,
        origin: Origin,
    },
    IncludeRaw {
        target: Target,
        origin: Origin,
    },
    IncludeB64 {
        target: Target,
        /// Encode the source bytes instead of the rendering.
        plain: bool,
        origin: Origin,
    },
    Component {
        target: Target,
        html: bool,
        body: Arc<[Content]>,
        origin: Origin,
    },
    Slot {
        name: CompactString,
        body: Arc<[Content]>,
        origin: Origin,
    },
    /// Static asset, copied byte for byte.
    Copy { source: PathBuf },
    /// One loop pass: binds `var` to `value` in a fresh frame around `body`.
    Iteration {
        var: CompactString,
        value: Value,
        body: Arc<[Content]>,
    },
    /// Wraps a Markdown file's nodes; runs between HTML inclusions are
    /// converted as a whole.
    Markdown { body: Arc<[Content]> },
}

/// Reserved binding exposing a component caller's body to the template.
pub const CONTENTS: &str = "__contents__";

impl Content {
    /// Marked `(html)` inside a Markdown file.
    pub const fn is_html(&self) -> bool {
        matches!(
            self,
            Self::Include { html: true, .. } | Self::Component { html: true, .. }
        )
    }
}

// ============================================================================
// Render protocol
// ============================================================================

/// Result of one node's render step.
#[derive(Debug)]
pub enum Step {
    /// Bytes went straight to the output.
    Written,
    /// Render these nodes in place of the current one.
    Expand(Expansion),
    /// No output; at most a binding changed.
    Nothing,
}

/// Nodes to render next, with the frame and inclusion link active around them.
#[derive(Debug)]
pub struct Expansion {
    pub nodes: Arc<[Content]>,
    pub frame: Option<Frame>,
    pub include: Option<(PathBuf, Location)>,
}

impl Expansion {
    /// Same stack, same chain.
    pub fn inline(nodes: Arc<[Content]>) -> Self {
        Self {
            nodes,
            frame: None,
            include: None,
        }
    }

    /// Inside `frame`, popped once the nodes are rendered.
    pub fn scoped(nodes: Arc<[Content]>, frame: Frame) -> Self {
        Self {
            nodes,
            frame: Some(frame),
            include: None,
        }
    }
}
