//! Error types for edgecfg.
//!
//! All failures are terminal for the current reconciliation request; the
//! engine never retries on its own. Errors carry enough context (failing
//! command, offending line) to diagnose without device access.

use thiserror::Error;

/// Result type alias for edgecfg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for edgecfg.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter value is not valid for its option.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required parameter is missing or an exclusive pair is violated.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A section opener appeared while another section was still open.
    /// The source grammar closes every section with the terminator before
    /// the next one may open.
    #[error("section '{section}' opened at line {line} while '{open}' is still open")]
    NestedSection {
        /// The opener line that was encountered
        section: String,
        /// The section that was still open
        open: String,
        /// 1-based line number in the source text
        line: usize,
    },

    /// A terminator line appeared with no section open.
    #[error("terminator at line {line} has no matching section opener")]
    UnexpectedTerminator {
        /// 1-based line number in the source text
        line: usize,
    },

    /// A section was opened but never closed before end of input.
    #[error("section '{section}' is never closed")]
    UnterminatedSection {
        /// The opener line of the unclosed section
        section: String,
    },

    /// A device command failed during apply. Remaining commands are not
    /// issued once this is raised.
    #[error("command '{command}' failed: {response}")]
    CommandFailed {
        /// The command that failed
        command: String,
        /// Any response captured from the device
        response: String,
    },

    /// Transport-level failure reported by the device collaborator.
    #[error("device error: {0}")]
    Device(String),

    /// IO error (e.g., loading a candidate config file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A section opener pattern failed to compile.
    #[error("invalid section pattern: {0}")]
    Pattern(#[from] regex::Error),
}
