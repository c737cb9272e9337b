use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load config: {0}")]
    Config(#[from] config::Error),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("No scan paths")]
    NoScanPaths,

    #[error("Signature file {0:?} holds no rules")]
    NoRules(PathBuf),

    #[error("Failed to read signature file: {0}")]
    Signatures(#[from] toml_edit::de::Error),

    #[error("Invalid rule name: {0:?}")]
    InvalidRuleName(String),

    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Path must be absolute and not the root: {0:?}")]
    InvalidPath(PathBuf),

    #[error("Refusing to move a directory: {0:?}")]
    IsDirectory(PathBuf),

    #[error("Fanotify failed: {0}")]
    Fanotify(#[from] nix::Error),

    #[error("Unknown fanotify event mask {0:#x}")]
    UnknownEvent(u64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid endpoint: {0:?}")]
    InvalidEndpoint(String),

    #[error("Invalid signing key")]
    SigningKey,

    #[error("Remote storage region is not configured")]
    MissingRegion,

    #[error("Remote storage is not configured")]
    RemoteDisabled,

    #[error("Quarantine directory is not configured")]
    QuarantineDisabled,

    #[error("Alert sender {0} is not loaded")]
    SenderNotLoaded(&'static str),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Email(#[from] lettre::error::Error),

    #[error("SMTP failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Invalid clean expression {expr:?}: {reason}")]
    InvalidCleanExpr { expr: String, reason: String },

    #[error("No clean expression for rule {rule}: {}", path.display())]
    NoCleanExpr { rule: String, path: PathBuf },

    #[error("Rule {rule} still matches after cleaning: {}", path.display())]
    CleanFailed { rule: String, path: PathBuf },

    #[error("No detection recorded for {0:?}")]
    NoRecord(PathBuf),

    #[error("Detection for {0:?} has no quarantined or exiled copy")]
    NothingToRestore(PathBuf),

    #[error("Scan worker panicked")]
    WorkerPanicked,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}
