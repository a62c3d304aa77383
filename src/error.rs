use thiserror::Error;

/// Builds an [`Error::Invariant`] carrying the source location of the check.
///
/// Structural invariants are conditions earlier passes guarantee; a violation
/// points at a defect in the pipeline rather than in the input.
macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}


/// The generic Error type, which covers every failure the generator can report.
///
/// Recoverable conditions are deliberately absent from this enum: an
/// unsupported bytecode construct is reported as
/// [`crate::translation::Translation::Unsupported`] and a missing optional
/// input only produces a warning. What remains are conditions that must stop
/// the run because continuing would produce incorrect output.
///
/// # Error Categories
///
/// ## Pipeline Defects
/// - [`Error::Invariant`] - A structural guarantee of an earlier pass does not hold
/// - [`Error::DuplicateData`] - Auxiliary data was attached to a node twice
///
/// ## Resolution Errors
/// - [`Error::Unresolved`] - A signature that must resolve did not
/// - [`Error::MissingMember`] - A runtime-support member is absent
/// - [`Error::AmbiguousMethod`] - A tokenless native method lookup is ambiguous
///
/// ## Setup Errors
/// - [`Error::Config`] - The generator configuration is invalid
///
/// # Examples
///
/// ```rust,no_run
/// use il2cpp_bridge::{Error, GeneratorConfig, AppContext, PassScheduler};
///
/// let mut context = AppContext::new();
/// let scheduler = PassScheduler::from_config(&GeneratorConfig::default()).unwrap();
/// match scheduler.run(&mut context) {
///     Ok(()) => println!("done"),
///     Err(Error::Invariant { message, file, line }) => {
///         eprintln!("pipeline defect: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("generation failed: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A structural invariant was violated.
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// Description of the violated condition.
        message: String,
        /// Source file of the failing check.
        file: &'static str,
        /// Source line of the failing check.
        line: u32,
    },

    /// A side-table entry was attached to a node that already had one.
    #[error("Auxiliary data '{what}' is already attached to {node}")]
    DuplicateData {
        /// Name of the side table.
        what: &'static str,
        /// Display form of the node.
        node: String,
    },

    /// A signature could not be mapped into the analysis universe.
    #[error("Unable to resolve {0}")]
    Unresolved(String),

    /// A runtime-support member is missing.
    #[error("Missing member '{name}' on {owner}")]
    MissingMember {
        /// Full name of the owning type.
        owner: String,
        /// Member name.
        name: String,
    },

    /// A method without a token cannot be told apart from an overload by name and signature text.
    #[error("Tokenless method lookup is ambiguous for {0}")]
    AmbiguousMethod(String),

    /// The configuration was rejected.
    #[error("Invalid configuration - {0}")]
    Config(String),
}
