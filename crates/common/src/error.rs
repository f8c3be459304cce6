use thiserror::Error;

/// Top-level error type for the nodewarden operator.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Declared configuration is self-contradictory or violates an invariant
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Artifact fetch, checksum or mechanism install failure
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Process supervision failure
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Post-migration verification failure
    #[error("Data migration error: {0}")]
    Migration(#[from] DataMigrationError),

    /// Node control-interface failure, treated as transient by status polling
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored-state persistence errors
    #[error("State store error: {0}")]
    State(String),
}

/// Operator-declared desired state is invalid. Never retried automatically;
/// a new configuration event is required.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("'{0}' must be set in 'service-args'.")]
    MissingFlag(&'static str),

    #[error("'--prometheus-port' may not be set! The operator assumes default port 9615.")]
    PrometheusPortSet,

    #[error("'--node-key-file' may not be set! Path is managed by the operator: {0}")]
    NodeKeyFileSet(String),

    #[error("Only one of 'binary-url', 'docker-tag' or 'snap-name' can be set at the same time!")]
    ConflictingSources,

    #[error("One of 'binary-url', 'docker-tag' or 'snap-name' must be set!")]
    NoSourceSet,

    #[error("Invalid snap-name provided: {name}. Must be one of {supported:?}.")]
    UnsupportedSnap { name: String, supported: Vec<&'static str> },

    #[error("{chain} is not a supported chain using Docker!")]
    UnsupportedDockerChain { chain: String },

    #[error("Could not extract tarball since {chain} lacks a tarball handler!")]
    UnsupportedTarballChain { chain: String },

    #[error("Sha256 file is larger than 1KB. Was the correct sha256 url provided?")]
    OversizedChecksum,

    #[error("Invalid file format provided for wasm-runtime-url: {0}")]
    InvalidWasmArtifact(String),

    #[error("{0}")]
    Invalid(String),
}

/// Installation failures. Surfaced as blocked; the triggering event should be
/// redelivered since the same desired state may succeed later.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Download of {url} failed with: {reason}")]
    Download { url: String, reason: String },

    #[error("Binary {0} downloaded has wrong hash!")]
    ChecksumMismatch(String),

    #[error("Could not find target hash for {0}. Was the correct sha256 url provided?")]
    ChecksumTargetMissing(String),

    #[error("Validating chain spec {path} failed with error: {reason}")]
    InvalidChainSpec { path: String, reason: String },

    #[error("Command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Start/stop/restart or argument persistence failures for the managed
/// process. Does not roll back already-applied artifact changes.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service start failed: {0}")]
    Start(String),

    #[error("Service stop failed: {0}")]
    Stop(String),

    #[error("Service restart failed: {0}")]
    Restart(String),

    #[error("Failed to read service args: {0}")]
    ReadArgs(String),

    #[error("Failed to write service args: {0}")]
    WriteArgs(String),

    #[error("No binary file found to generate node key. Please check your configuration.")]
    NoBinaryForKey,

    #[error("{0}")]
    Failed(String),
}

/// Raised when a data or key migration cannot be verified. The caller must
/// not start the new workload on unverified data.
#[derive(Error, Debug)]
pub enum DataMigrationError {
    #[error("Migration verification failed: {0}")]
    VerificationFailed(String),

    #[error("Move operation failed: {0}")]
    MoveFailed(String),

    #[error("Copy operation failed: {0}")]
    CopyFailed(String),
}

/// Node control-interface failures.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Protocol(String),

    #[error("RPC error response: {0}")]
    Server(String),
}
