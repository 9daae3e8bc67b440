//! Error types with actionable diagnostics.
//!
//! Every resolution failure names the section, the field and the
//! expected-vs-actual values so the raw input can be corrected without
//! reading source code.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for trainconf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while declaring schemas or resolving a configuration.
#[derive(Error, Debug)]
pub enum Error {
    // === Schema errors ===
    /// A key in a section mapping is not declared by the section schema.
    #[error("Unknown field '{field}' in section '{section}'\n  → Declared fields: {declared}")]
    UnknownField { section: String, field: String, declared: String },

    /// A required field was not supplied and has no default.
    #[error("Missing required field '{field}' in section '{section}'")]
    MissingField { section: String, field: String },

    /// A field was supplied with a value of the wrong type.
    #[error("Type mismatch for '{section}.{field}': expected {expected}, got {actual}")]
    TypeMismatch { section: String, field: String, expected: String, actual: String },

    /// A top-level key does not name a built-in or registered section.
    #[error("Unknown section '{section}'\n  → Known sections: {known}")]
    UnknownSection { section: String, known: String },

    /// A section was given something other than a mapping.
    #[error("Section '{section}' must be a mapping, got {actual}")]
    SectionNotMapping { section: String, actual: String },

    /// A field validator rejected the supplied (or defaulted) value.
    #[error("Invalid value for '{section}.{field}': {value} ({reason})")]
    InvalidValue { section: String, field: String, value: String, reason: String },

    /// An alias and its canonical key were both supplied with different values.
    #[error("Conflicting values for '{section}.{field}' and its alias '{alias}': {value} != {alias_value}")]
    AliasConflict {
        section: String,
        field: String,
        alias: String,
        value: String,
        alias_value: String,
    },

    /// An extension schema loosens or contradicts an inherited declaration.
    #[error("Schema conflict in section '{section}' on field '{field}': {reason}")]
    SchemaConflict { section: String, field: String, reason: String },

    /// A section name was registered twice.
    #[error("Section '{section}' is already registered")]
    DuplicateSection { section: String },

    /// An argument name is already declared on a node.
    #[error("Config arg '{field}' already registered with section '{section}'")]
    DuplicateField { section: String, field: String },

    // === Batch arithmetic errors ===
    /// All batch quantities were supplied but their product does not match.
    #[error(
        "Inconsistent batch configuration: train_batch_size={train_batch_size} but \
         micro_batch_size_per_worker ({micro}) * gradient_accumulation_steps ({accum}) * \
         world_size ({world_size}) = {expected}"
    )]
    InconsistentBatchSize {
        train_batch_size: u64,
        micro: u64,
        accum: u64,
        world_size: u64,
        expected: u64,
    },

    /// train_batch_size cannot be split evenly across workers and accumulation steps.
    #[error(
        "train_batch_size={train_batch_size} is not divisible by \
         gradient_accumulation_steps ({accum}) * world_size ({world_size}) = {divisor}"
    )]
    NonDivisibleBatchSize { train_batch_size: u64, accum: u64, world_size: u64, divisor: u64 },

    /// Neither micro_batch_size_per_worker nor train_batch_size was supplied.
    #[error(
        "Batch configuration is under-determined: supply micro_batch_size_per_worker or \
         train_batch_size (gradient_accumulation_steps={accum}, world_size={world_size})"
    )]
    UnderspecifiedBatchConfig { accum: u64, world_size: u64 },

    /// A batch quantity is zero or negative.
    #[error("Invalid batch value for '{field}': {value} (must be > 0)")]
    InvalidBatchValue { field: String, value: i64 },

    /// The batch product does not fit in an unsigned 64-bit integer.
    #[error(
        "Batch size overflow: {micro} * {accum} * {world_size} exceeds the largest integer field value (i64::MAX)"
    )]
    BatchOverflow { micro: u64, accum: u64, world_size: u64 },

    // === Cross-section errors ===
    /// A cross-section rule failed after every section parsed successfully.
    #[error("Cross-section rule '{rule}' failed for sections [{sections}]: {reason}")]
    CrossValidation { rule: String, sections: String, reason: String },

    // === Input errors ===
    /// Raw input text could not be parsed.
    #[error("Invalid configuration syntax: {message}\n  → Check JSON/YAML syntax and remove duplicate keys")]
    Parse { message: String },

    /// IO error with context.
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an IO error bound to the path being read.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Check if this error is caused by user input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownField { .. } => "E001",
            Self::MissingField { .. } => "E002",
            Self::TypeMismatch { .. } => "E003",
            Self::UnknownSection { .. } => "E004",
            Self::SectionNotMapping { .. } => "E005",
            Self::InvalidValue { .. } => "E006",
            Self::AliasConflict { .. } => "E007",
            Self::SchemaConflict { .. } => "E010",
            Self::DuplicateSection { .. } => "E011",
            Self::DuplicateField { .. } => "E012",
            Self::InconsistentBatchSize { .. } => "E020",
            Self::NonDivisibleBatchSize { .. } => "E021",
            Self::UnderspecifiedBatchConfig { .. } => "E022",
            Self::InvalidBatchValue { .. } => "E023",
            Self::BatchOverflow { .. } => "E024",
            Self::CrossValidation { .. } => "E030",
            Self::Parse { .. } => "E040",
            Self::Io { .. } => "E050",
        }
    }
}
