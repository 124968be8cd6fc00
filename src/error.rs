use thiserror::Error;

/// Top-level error type for the Fissura fracture kernel.
#[derive(Debug, Error)]
pub enum FissuraError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Errors raised while constructing a cell complex.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cell decomposition produced no cells")]
    EmptyResult,

    #[error("cell index {index} out of range (complex has {count} cells)")]
    CellOutOfRange { index: usize, count: usize },
}

/// Errors raised while constructing the link graph.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link graph is empty")]
    NoLinks,

    #[error("link graph has no wall links to enter from")]
    NoExternalLinks,

    #[error("link not found: {0}")]
    NotFound(String),
}

/// Errors raised by the infiltration simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no state backup to restore")]
    NoBackup,

    #[error("backup does not match fracture: {0}")]
    BackupMismatch(String),
}

/// Errors related to configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors related to the handle store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(&'static str),
}

/// Convenience type alias for results using [`FissuraError`].
pub type Result<T> = std::result::Result<T, FissuraError>;
