//! Error types for the instascrape library and CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Authentication errors
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Challenge expired or already used, start the login over")]
    ChallengeExpired,

    #[error("Session expired or was invalidated by the server")]
    AuthExpired,

    #[error("Login is required in order to perform this action")]
    AuthenticationRequired,

    // Remote service errors
    #[error("Rate limited by the remote service")]
    RateLimited { retry_after: Option<u64> },

    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("The profile is private and not followed by you: {0}")]
    PrivateAccess(String),

    #[error("API error: {0}")]
    Api(String),

    // Session persistence errors
    #[error("No saved session for account '{0}'")]
    SessionNotFound(String),

    #[error("Saved session for '{account}' is corrupted: {message}")]
    Corrupted { account: String, message: String },

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Pipeline errors
    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error("Item #{position} ({key}) failed: {source}")]
    Item {
        position: usize,
        key: String,
        #[source]
        source: Box<Error>,
    },

    // Download errors
    #[error("Download failed: {0}")]
    Download(String),

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category used by the CLI to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Network,
    Usage,
    Storage,
    NotFound,
    Other,
}

impl Error {
    /// Wrap a storage-level I/O failure with the path it happened on.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether the fetch layer may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::TransientNetwork(_))
    }

    /// Whether this error is contained to a single item of a sequence.
    pub fn is_item_error(&self) -> bool {
        matches!(self, Error::Item { .. })
    }

    /// Errors that abort a whole pipeline instead of a single item.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Item { .. } => false,
            Error::AuthExpired
            | Error::AuthenticationRequired
            | Error::PrivateAccess(_)
            | Error::Corrupted { .. }
            | Error::Storage { .. } => true,
            _ => false,
        }
    }

    /// The innermost error, looking through per-item wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Item { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Error::Auth(_)
            | Error::ChallengeExpired
            | Error::AuthExpired
            | Error::AuthenticationRequired
            | Error::SessionNotFound(_) => ErrorKind::Auth,
            Error::RateLimited { .. }
            | Error::TransientNetwork(_)
            | Error::MalformedResponse(_)
            | Error::Api(_)
            | Error::Http(_) => ErrorKind::Network,
            Error::Usage(_)
            | Error::Config(_)
            | Error::ConfigValidation { .. }
            | Error::MissingConfig(_)
            | Error::InvalidFilename(_)
            | Error::TomlParse(_)
            | Error::UrlParse(_) => ErrorKind::Usage,
            Error::Storage { .. } | Error::Corrupted { .. } => ErrorKind::Storage,
            Error::NotFound(_) | Error::PrivateAccess(_) => ErrorKind::NotFound,
            _ => ErrorKind::Other,
        }
    }

    /// A short hint telling the user what to do about this error.
    pub fn remediation(&self) -> Option<&'static str> {
        match self.root() {
            Error::Auth(_) => Some("check your credentials and re-run `instascrape login`"),
            Error::ChallengeExpired => Some("the security code timed out, re-run `instascrape login`"),
            Error::AuthExpired | Error::SessionNotFound(_) => {
                Some("your session is no longer valid, re-run `instascrape login`")
            }
            Error::AuthenticationRequired => Some("log in first with `instascrape login`"),
            Error::RateLimited { .. } => Some("you are being rate limited, wait a few minutes and retry"),
            Error::TransientNetwork(_) | Error::Http(_) => {
                Some("check your network connection and retry")
            }
            Error::MalformedResponse(_) => {
                Some("the remote service changed its responses, please update instascrape")
            }
            Error::Corrupted { .. } => {
                Some("remove the saved session with `instascrape cookies remove` and log in again")
            }
            Error::PrivateAccess(_) => Some("follow the profile from a logged in account"),
            _ => None,
        }
    }
}

/// Exit codes reported by the CLI.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_ERROR: i32 = 1;
    pub const USAGE_ERROR: i32 = 2;
    pub const AUTH_ERROR: i32 = 3;
    pub const NETWORK_ERROR: i32 = 4;
    pub const STORAGE_ERROR: i32 = 5;
    pub const NOT_FOUND: i32 = 6;
    pub const INTERRUPTED: i32 = 130;
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Auth => exit_codes::AUTH_ERROR,
            ErrorKind::Network => exit_codes::NETWORK_ERROR,
            ErrorKind::Usage => exit_codes::USAGE_ERROR,
            ErrorKind::Storage => exit_codes::STORAGE_ERROR,
            ErrorKind::NotFound => exit_codes::NOT_FOUND,
            ErrorKind::Other => exit_codes::UNEXPECTED_ERROR,
        }
    }
}
