//! Wire and policy constants shared across crates.

/// Path segment every API endpoint lives under: `{api_url}/b2api/{version}/{endpoint}`.
pub const API_PREFIX: &str = "b2api";

/// Default authorization host.
pub const DEFAULT_AUTH_URL: &str = "https://api.backblazeb2.com";

/// Smallest part the remote service accepts for a large file (except the last part).
pub const MIN_REMOTE_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default part size used when none is configured.
pub const DEFAULT_PART_SIZE: usize = MIN_REMOTE_PART_SIZE;

/// Total attempts per part (first attempt plus two retries).
pub const MAX_PART_ATTEMPTS: u32 = 3;

/// Per-request timeout applied to every HTTP call.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Content type sent when starting a large file; lets the service infer it.
pub const AUTO_CONTENT_TYPE: &str = "b2/x-auto";

/// Page size used when listing without an explicit count.
pub const DEFAULT_LIST_COUNT: u32 = 100;
