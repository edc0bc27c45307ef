//! Diagnostic error types for the configuration and harness surface.
//!
//! The algebra engine itself never returns errors: its operations are total
//! over well-formed inputs and treat misuse (out-of-range thresholds or
//! densities) as programmer error via assertions. Recoverable failures only
//! arise at the edges, when loading configuration or driving the harness.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error, Diagnostic)]
pub enum HvError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Harness(#[from] HarnessError),
}

/// Result type for fallible harness/config operations.
pub type HvResult<T> = std::result::Result<T, HvError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    #[diagnostic(
        code(hyperbits::config::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config: {message}")]
    #[diagnostic(
        code(hyperbits::config::parse),
        help(
            "The harness config is a flat TOML table, e.g. \
             `iterations = 1000` and `majority_sizes = [3, 5, 7]`."
        )
    )]
    Parse { message: String },

    #[error("invalid config value for `{field}`: {message}")]
    #[diagnostic(
        code(hyperbits::config::invalid),
        help("Sizes and iteration counts must be positive; densities must lie in [0, 1].")
    )]
    Invalid { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Harness errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("kernel tier {isa} is not supported on this CPU")]
    #[diagnostic(
        code(hyperbits::harness::unsupported_isa),
        help("Run `hvbench info` to list the tiers this machine supports.")
    )]
    UnsupportedIsa { isa: String },

    #[error("unknown benchmark `{name}`")]
    #[diagnostic(
        code(hyperbits::harness::unknown_op),
        help(
            "Known benchmarks: and, or, xor, invert, swap-halves, rehash, active, \
             hamming, majority, rand, rand2, random, permute."
        )
    )]
    UnknownOp { name: String },

    #[error("{op}: result disagrees with the reference implementation")]
    #[diagnostic(
        code(hyperbits::harness::mismatch),
        help(
            "A tiered kernel or fast path produced a different answer than its \
             reference. This is an implementation defect; rerun with \
             `--isa generic` to isolate the failing tier."
        )
    )]
    Mismatch { op: String },
}
