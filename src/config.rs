// =============================================================================
// Registry endpoints
// =============================================================================

/// Base URL for the npm registry.
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Base URL for the primary file-listing provider (jsDelivr data API).
pub const JSDELIVR_DATA_URL: &str = "https://data.jsdelivr.com";

/// Base URL for the fallback file-listing provider.
pub const UNPKG_URL: &str = "https://unpkg.com";

// =============================================================================
// Politeness and retry
// =============================================================================

/// Identifies this client to the registries we query.
pub const USER_AGENT: &str = "dt-audit (https://github.com/dt-audit/dt-audit)";

/// Maximum in-flight requests against any single hostname.
pub const PER_HOST_CONCURRENCY: usize = 10;

/// Maximum attempts for a single HTTP call.
pub const MAX_RETRIES: usize = 3;

/// Base delay between retry attempts in milliseconds; doubled per attempt
/// and jittered.
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Timeout for a single HTTP call in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
