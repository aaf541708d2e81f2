//! Limits, defaults and storage key prefixes

// Names
pub const MAX_NAME_LEN: usize = 256;

// Scope keys
pub const SYSTEM_KEY: &str = "_system";
pub const DATABASE_PREFIX: &str = "db:";
pub const COLLECTION_PREFIX: &str = "col:";

// Subject keys
pub const USER_PREFIX: &str = "u:";
pub const ROLE_PREFIX: &str = "r:";

// Access level codes as stored in the grants table
pub const LEVEL_NONE: u64 = 0;
pub const LEVEL_RO: u64 = 1;
pub const LEVEL_RW: u64 = 2;

// LMDB environment
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_MAX_DBS: u32 = 9;

// Completion handshake
pub const DEFAULT_POLL_RETRIES: u32 = 200;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_KEYSPACE_CAPACITY: usize = 128;
pub const STATUS_SUFFIX: &str = "_status";

// Meta keys
pub const META_NEXT_ID: &str = "next_id";
pub const META_ROOT: &str = "root";
