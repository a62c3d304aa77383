//! The trait every generator pass implements.
//!
//! Passes run strictly one after another. Each receives exclusive mutable
//! access to the whole [`AppContext`] for its duration, so a pass may inject
//! types, methods and fields while it walks the graph without any locking.

use crate::{model::AppContext, Result};

/// A stage of the generator pipeline.
///
/// Passes are stateless apart from the configuration they were built with.
/// Everything a pass produces is written into the context: either as new
/// members of the arena or as side-table data for later passes to consume.
///
/// # Pipeline Integration
///
/// Passes don't declare dependencies on each other. The scheduler runs them
/// in the fixed order built by
/// [`PassScheduler::from_config`](crate::compiler::PassScheduler::from_config),
/// and a pass may assume that every earlier pass has completed.
pub trait GeneratorPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Stable identifier, used as the `pass` field of recorded events.
    fn id(&self) -> &'static str;

    /// Run the pass over the whole context.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The application context, borrowed exclusively.
    ///
    /// # Errors
    ///
    /// Returns an error if a structural invariant established by an earlier
    /// pass does not hold. Missing optional input is logged, not returned.
    fn process(&self, ctx: &mut AppContext) -> Result<()>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
