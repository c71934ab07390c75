/// Application name
pub const APP_NAME: &str = "Classdesk";

/// Maximum number of attachments per complaint
pub const MAX_ATTACHMENTS: usize = 5;

/// Maximum size of a single attachment in bytes (5 MiB)
pub const MAX_ATTACHMENT_SIZE: usize = 5 * 1024 * 1024;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Session token length in bytes (hex-encoded to twice this)
pub const SESSION_TOKEN_SIZE: usize = 32;

/// Password-reset token lifetime in minutes
pub const RESET_TOKEN_TTL_MINUTES: i64 = 30;
