//! Fatal engine errors.
//!
//! Directive-level failures (bad expressions, unknown names, missing include
//! targets) never reach this type: they are logged and the directive text is
//! reproduced in the output. Only the conditions below abort a render.

use super::location::Location;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("`{}` is not valid UTF-8", .0.display())]
    Utf8(PathBuf),

    #[error("unterminated directive opened at {start}, input ended at {end}")]
    Parse { start: Location, end: Location },

    #[error("inclusion cycle: `{}` included at {location}\n  chain: {chain}", path.display())]
    Cycle {
        path: PathBuf,
        location: Location,
        chain: String,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}
