//! Constants for the Cloud Code API and its OAuth application.

/// Production Cloud Code API endpoint, including the API version prefix.
///
/// Operation paths are appended Google-style with a colon, e.g.
/// `{endpoint}:streamGenerateContent`.
pub const CLOUDCODE_ENDPOINT: &str = "https://cloudcode-pa.googleapis.com/v1internal";

/// Google OAuth token endpoint (form-encoded refresh-token grant).
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client id of the Gemini CLI desktop application.
///
/// These credentials are intentionally public; they identify the desktop
/// application whose stored credentials this client reuses.
pub const OAUTH_CLIENT_ID: &str =
    "681255809395-oo8ft2oprdrnp9e3aqf6av3hmdib135j.apps.googleusercontent.com";

/// OAuth client secret of the Gemini CLI desktop application.
pub const OAUTH_CLIENT_SECRET: &str = "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";

/// Default location of the credentials file written by the Gemini CLI.
pub const DEFAULT_CREDENTIALS_PATH: &str = "~/.gemini/oauth_creds.json";

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Sampling temperature applied when the caller does not set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Output token limit applied when the caller does not set one.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Project id sent before discovery has bound a real one.
pub const PLACEHOLDER_PROJECT_ID: &str = "default";

/// Tier id used for onboarding when the tier list flags no default.
pub const FALLBACK_TIER_ID: &str = "free-tier";

/// Seconds to wait after a 429 when the `retry-after` header is absent
/// or malformed.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Capacity of the chunk channel between the stream driver and the consumer.
///
/// A full channel suspends the driver, so the producer can never outrun the
/// consumer by more than this many chunks.
pub const STREAM_CHANNEL_CAPACITY: usize = 32;
