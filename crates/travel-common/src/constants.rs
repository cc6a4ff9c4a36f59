//! Shared constants for travel monitor components.

/// Frame header: 1 byte kind + 4 byte big-endian payload length
pub const HEADER_LEN: usize = 5;

/// Largest payload a single frame may carry (64 MiB)
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Citizen ids are at most this many decimal digits
pub const MAX_CITIZEN_ID_DIGITS: usize = 5;

/// Number of bit probes per bloom filter insert/check
pub const BLOOM_HASH_COUNT: u32 = 16;

/// Default bloom filter size in bytes
pub const DEFAULT_BLOOM_SIZE: usize = 100_000;

/// Default channel buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default number of worker processes
pub const DEFAULT_WORKERS: usize = 4;

/// A vaccination clears travel for this many calendar months
pub const VACCINATION_VALIDITY_MONTHS: u32 = 6;

/// Grace period for workers to write their summary on shutdown (milliseconds)
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/travel-monitor.toml";

/// Summary file prefix: {prefix}.{pid}.txt
pub const SUMMARY_FILE_PREFIX: &str = "log_file";

/// Record file vaccination flags
pub mod flags {
    pub const VACCINATED: &str = "YES";
    pub const NOT_VACCINATED: &str = "NO";
}
