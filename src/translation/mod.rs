//! The two-tier body compiler.
//!
//! [`recovery`] copies a companion body into the instruction model with every
//! operand resolved; [`translator`] rewrites such a body so it marshals values
//! between the bridging and native representations. Anything the translator
//! cannot express comes back as [`Translation::Unsupported`] and the method is
//! bridged instead.

pub mod conversion;
pub mod recovery;
pub mod translator;

pub use recovery::recover;
pub use translator::translate;

use crate::assembly::MethodBody;

/// Outcome of translating one method.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The complete rewritten body.
    Translated(MethodBody),
    /// Translation gave up; the reason names the first construct it could not handle.
    Unsupported(String),
}

impl Translation {
    /// Returns `true` for [`Translation::Translated`].
    #[must_use]
    pub fn is_translated(&self) -> bool {
        matches!(self, Translation::Translated(_))
    }

    /// The body, if translation succeeded.
    #[must_use]
    pub fn into_body(self) -> Option<MethodBody> {
        match self {
            Translation::Translated(body) => Some(body),
            Translation::Unsupported(_) => None,
        }
    }
}
