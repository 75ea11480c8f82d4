//! Rendering: walks a node sequence and produces bytes.
//!
//! ```text
//! render(nodes) ──► step(node) ──► Written   bytes already in `out`
//!      ▲                      ├──► Nothing   binding changed, no output
//!      │                      └──► Expand    push frame / chain link
//!      └──────────────────────────────┘      render expansion, pop
//! ```
//!
//! One [`Renderer`] renders one output file on one thread. It owns the
//! context stack and the inclusion chain; the node trees it walks are shared
//! and never modified.

use super::{
    content::{CONTENTS, Content, Expansion, Fragment, Origin, Step, Target},
    error::{Error, Result},
    expr::{Env, EvalError, Expr, PathRef, Value, evaluate_forced},
    file::ProcessedFile,
    iter::IterEnv,
    location::Location,
    scope::{Context, Frame, Stack},
    include::Chain,
    site::Site,
};
use crate::{log, utils::markdown};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

pub struct Renderer<'s> {
    site: &'s Site,
    stack: Stack,
    chain: Chain,
}

/// What [`Renderer::enter`] pushed, so [`Renderer::leave`] pops the same.
struct Entered {
    scoped: bool,
    linked: bool,
}

impl<'s> Renderer<'s> {
    pub fn new(site: &'s Site, root: &Path) -> Self {
        Self {
            site,
            stack: Stack::new(site.global()),
            chain: Chain::new(root),
        }
    }

    /// Render `file` as an output page.
    ///
    /// The file's own top-level defines are resolved into its frame first,
    /// so they are visible everywhere in the file.
    pub fn render_file(site: &'s Site, file: &ProcessedFile) -> Result<Vec<u8>> {
        let mut renderer = Self::new(site, &file.path);
        renderer.stack.push();
        define_all(site, &file.raw, &mut renderer.stack);

        let mut out = Vec::new();
        renderer.render(&file.content, &mut out)?;
        Ok(out)
    }

    pub fn render(&mut self, nodes: &[Content], out: &mut Vec<u8>) -> Result<()> {
        for node in nodes {
            match self.step(node, out)? {
                Step::Written | Step::Nothing => {}
                Step::Expand(expansion) => self.expand(expansion, out)?,
            }
        }
        Ok(())
    }

    fn expand(&mut self, expansion: Expansion, out: &mut Vec<u8>) -> Result<()> {
        let Expansion {
            nodes,
            frame,
            include,
        } = expansion;
        let entered = self.enter(frame, include);
        let result = self.render(&nodes, out);
        self.leave(entered);
        result
    }

    /// Render `nodes` into a buffer of their own.
    fn render_to_vec(
        &mut self,
        nodes: &[Content],
        frame: Frame,
        include: (PathBuf, Location),
    ) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let entered = self.enter(Some(frame), Some(include));
        let result = self.render(nodes, &mut buf);
        self.leave(entered);
        result.map(|()| buf)
    }

    fn enter(&mut self, frame: Option<Frame>, include: Option<(PathBuf, Location)>) -> Entered {
        let entered = Entered {
            scoped: frame.is_some(),
            linked: include.is_some(),
        };
        if let Some(frame) = frame {
            self.stack.push_frame(frame);
        }
        if let Some((path, location)) = include {
            self.chain.push(path, location);
        }
        entered
    }

    fn leave(&mut self, entered: Entered) {
        if entered.linked {
            self.chain.pop();
        }
        if entered.scoped {
            self.stack.pop();
        }
    }

    fn step(&mut self, node: &Content, out: &mut Vec<u8>) -> Result<Step> {
        let step = match node {
            Content::Text(text) => {
                out.extend_from_slice(text.as_bytes());
                Step::Written
            }

            Content::Define { name, expr, origin } => match self.evaluate(expr, &origin.location) {
                Ok(Value::Nil) => {
                    self.stack.remove(name);
                    Step::Nothing
                }
                Ok(value) => {
                    self.stack.set(name.clone(), value);
                    Step::Nothing
                }
                Err(err) => reject(origin, &err, out),
            },

            Content::Eval { expr, origin } => match self.evaluate(expr, &origin.location) {
                Ok(Value::Content(fragment)) => {
                    Step::Expand(Expansion::scoped(fragment.nodes, Frame::new()))
                }
                Ok(Value::Nil) => Step::Nothing,
                Ok(value) => {
                    out.extend_from_slice(value.to_string().as_bytes());
                    Step::Written
                }
                Err(err) => reject(origin, &err, out),
            },

            Content::If { cond, body, origin } => match self.evaluate(cond, &origin.location) {
                Ok(Value::Bool(true)) => {
                    Step::Expand(Expansion::scoped(Arc::clone(body), Frame::new()))
                }
                Ok(Value::Bool(false)) => Step::Nothing,
                Ok(other) => {
                    log!("warn"; "{}: condition is {}, assumed false", origin.location, other.describe());
                    Step::Nothing
                }
                Err(err) => reject(origin, &err, out),
            },

            Content::For {
                var,
                iterable,
                body,
                origin,
            } => {
                let items = iterable.resolve(&mut Evaluation {
                    site: self.site,
                    stack: &mut self.stack,
                    location: &origin.location,
                });
                match items {
                    Ok(items) => {
                        let passes: Vec<Content> = items
                            .into_iter()
                            .map(|value| Content::Iteration {
                                var: var.clone(),
                                value,
                                body: Arc::clone(body),
                            })
                            .collect();
                        Step::Expand(Expansion::inline(Arc::from(passes)))
                    }
                    Err(err) => reject(origin, &err, out),
                }
            }

            Content::Iteration { var, value, body } => Step::Expand(Expansion::scoped(
                Arc::clone(body),
                Frame::new().with(var.clone(), value.clone()),
            )),

            Content::Include { target, origin, .. } => match self.target(target, origin, out)? {
                Some((path, file)) => Step::Expand(Expansion {
                    nodes: Arc::clone(&file.content),
                    frame: None,
                    include: Some((path, origin.location.clone())),
                }),
                None => Step::Written,
            },

            Content::IncludeRaw { target, origin } => {
                if let Some((path, file)) = self.target(target, origin, out)? {
                    let link = (path, origin.location.clone());
                    let text = self.render_to_vec(&file.raw, Frame::new(), link)?;
                    out.extend_from_slice(&text);
                }
                Step::Written
            }

            Content::IncludeB64 {
                target,
                plain,
                origin,
            } => {
                if let Some((path, file)) = self.target(target, origin, out)? {
                    let bytes = if *plain {
                        fs::read(&path).map_err(|e| Error::io(&path, e))?
                    } else {
                        let link = (path, origin.location.clone());
                        self.render_to_vec(&file.content, Frame::new(), link)?
                    };
                    out.extend_from_slice(STANDARD.encode(bytes).as_bytes());
                }
                Step::Written
            }

            Content::Component {
                target,
                body,
                origin,
                ..
            } => match self.target(target, origin, out)? {
                Some((path, file)) => {
                    let frame = self.component_frame(body, origin);
                    Step::Expand(Expansion {
                        nodes: Arc::clone(&file.content),
                        frame: Some(frame),
                        include: Some((path, origin.location.clone())),
                    })
                }
                None => Step::Written,
            },

            Content::Slot { name, body, origin } => {
                // Only the component instance's own caller can pre-fill a slot.
                if !self.stack.filled_by_caller(name) {
                    let fragment = Fragment {
                        nodes: Arc::clone(body),
                        location: origin.location.clone(),
                    };
                    self.stack.set(name.clone(), Value::Content(fragment));
                }
                Step::Nothing
            }

            Content::Copy { source } => {
                let bytes = fs::read(source).map_err(|e| Error::io(source, e))?;
                out.extend_from_slice(&bytes);
                Step::Written
            }

            Content::Markdown { body } => {
                self.render_markdown(body, out)?;
                Step::Written
            }
        };
        Ok(step)
    }

    /// Frame for a component instance: the caller's defines and slots, and
    /// its whole body under `__contents__`.
    fn component_frame(&mut self, body: &Arc<[Content]>, origin: &Origin) -> Frame {
        self.stack.push_frame(Frame::component());
        for node in body.iter() {
            match node {
                Content::Define { name, expr, origin } => {
                    match self.evaluate(expr, &origin.location) {
                        Ok(Value::Nil) => self.stack.remove(name),
                        Ok(value) => self.stack.set(name.clone(), value),
                        Err(err) => log!("warn"; "{}: {err}", origin.location),
                    }
                }
                Content::Slot { name, body, origin } => {
                    let fragment = Fragment {
                        nodes: Arc::clone(body),
                        location: origin.location.clone(),
                    };
                    self.stack.set(name.clone(), Value::Content(fragment));
                }
                _ => {}
            }
        }
        let contents = Fragment {
            nodes: Arc::clone(body),
            location: origin.location.clone(),
        };
        self.stack.set(CONTENTS, Value::Content(contents));
        self.stack
            .pop()
            .unwrap_or_else(Frame::component)
    }

    /// Convert runs of Markdown between `(html)` inclusions.
    fn render_markdown(&mut self, body: &[Content], out: &mut Vec<u8>) -> Result<()> {
        let site = self.site;
        let theme = &site.options().markdown.highlight;
        let mut run = Vec::new();
        for node in body {
            if node.is_html() {
                if !run.is_empty() {
                    out.extend(markdown::to_html(&run, theme));
                    run.clear();
                }
                self.render(std::slice::from_ref(node), out)?;
            } else {
                self.render(std::slice::from_ref(node), &mut run)?;
            }
        }
        if !run.is_empty() {
            out.extend(markdown::to_html(&run, theme));
        }
        Ok(())
    }

    /// Resolve and load an include-family target.
    ///
    /// A target that is missing or fails to evaluate is reported, its
    /// directive text is written to `out`, and `None` is returned. Cycles and
    /// unparsable targets are fatal.
    fn target(
        &mut self,
        target: &Target,
        origin: &Origin,
        out: &mut Vec<u8>,
    ) -> Result<Option<(PathBuf, Arc<ProcessedFile>)>> {
        let path = match target {
            Target::Literal(raw) => self.site.resolve(raw, &origin.location),
            Target::Eval(expr) => match self.evaluate(expr, &origin.location) {
                Ok(Value::String(raw)) => self.site.resolve(&raw, &origin.location),
                Ok(Value::Path(path)) => path.source,
                Ok(other) => {
                    let err = EvalError::Constructor {
                        name: "include",
                        got: other.describe(),
                    };
                    reject(origin, &err, out);
                    return Ok(None);
                }
                Err(err) => {
                    reject(origin, &err, out);
                    return Ok(None);
                }
            },
        };

        if !path.is_file() {
            log!("warn"; "{}: cannot find `{}`, kept as text", origin.location, path.display());
            out.extend_from_slice(origin.text.as_bytes());
            return Ok(None);
        }

        self.chain.check(&path, &origin.location)?;
        let file = self.site.load(&path)?;
        Ok(Some((path, file)))
    }

    fn evaluate(&mut self, expr: &Expr, location: &Location) -> Result<Value, EvalError> {
        let mut env = Evaluation {
            site: self.site,
            stack: &mut self.stack,
            location,
        };
        evaluate_forced(expr, &mut env)
    }
}

/// Log a directive failure and write its text back unchanged.
fn reject(origin: &Origin, err: &EvalError, out: &mut Vec<u8>) -> Step {
    log!("warn"; "{}: {err}", origin.location);
    out.extend_from_slice(origin.text.as_bytes());
    Step::Written
}

// ============================================================================
// File scopes
// ============================================================================

/// Evaluate every top-level `define` of `nodes` into the innermost frame.
/// Failures leave the name unbound; they are reported when the node renders.
fn define_all(site: &Site, nodes: &[Content], stack: &mut Stack) {
    for node in nodes {
        let Content::Define { name, expr, origin } = node else {
            continue;
        };
        let result = evaluate_forced(
            expr,
            &mut Evaluation {
                site,
                stack: &mut *stack,
                location: &origin.location,
            },
        );
        match result {
            Ok(Value::Nil) => stack.remove(name),
            Ok(value) => stack.set(name.clone(), value),
            Err(_) => {}
        }
    }
}

/// Top-level scope of `file`, computed on top of `stack` without changing it.
pub fn file_scope(site: &Site, file: &ProcessedFile, stack: &mut Stack) -> Result<Context, EvalError> {
    if stack.is_resolving(&file.path) {
        return Err(EvalError::Load {
            path: site.url(&file.path),
            reason: "its defines refer back to itself".to_owned(),
        });
    }

    stack.begin_resolving(file.path.clone());
    stack.push();
    define_all(site, &file.raw, stack);
    let frame = stack.pop();
    stack.end_resolving();

    Ok(frame.map(|f| f.context).unwrap_or_default())
}

// ============================================================================
// Expression environment
// ============================================================================

/// What an expression sees while one directive is evaluated.
struct Evaluation<'a> {
    site: &'a Site,
    stack: &'a mut Stack,
    location: &'a Location,
}

impl Env for Evaluation<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.stack.lookup(name).cloned()
    }

    fn resolve_path(&self, raw: &str) -> Result<PathRef, EvalError> {
        let path = self.site.resolve(raw, self.location);
        if path.is_file() {
            Ok(self.site.path_ref(&path))
        } else {
            Err(EvalError::Path(raw.to_owned()))
        }
    }

    fn property(&mut self, path: &PathRef, name: &str) -> Result<Value, EvalError> {
        let file = self.site.load(&path.source).map_err(|err| EvalError::Load {
            path: path.url.clone(),
            reason: err.to_string(),
        })?;
        let scope = file_scope(self.site, &file, self.stack)?;
        Ok(scope.get(name).cloned().unwrap_or(Value::Nil))
    }
}

impl IterEnv for Evaluation<'_> {
    fn list_dir(&self, raw: &str) -> Result<Vec<PathRef>, EvalError> {
        let dir = self.site.resolve(raw, self.location);
        if !dir.is_dir() {
            return Err(EvalError::Path(raw.to_owned()));
        }
        let files = self.site.files_in(&dir).map_err(|err| EvalError::Load {
            path: raw.to_owned(),
            reason: err.to_string(),
        })?;
        Ok(files.iter().map(|path| self.site.path_ref(path)).collect())
    }
}
