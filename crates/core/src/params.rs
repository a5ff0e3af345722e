//! Protocol parameters shared by the entity builder and the proof-of-work solver.

/// Number of random bytes drawn for every proof-of-work attempt
pub const NONCE_BYTES: usize = 256;

/// Length of a hex-encoded nonce
pub const NONCE_HEX_LEN: usize = NONCE_BYTES * 2;

/// Number of hex digits in a SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Highest complexity a challenge may ask for
///
/// Every leading hex digit multiplies the expected work by 16, so anything
/// past a handful of digits is only reachable with a deadline in place.
pub const MAX_COMPLEXITY: usize = DIGEST_HEX_LEN;

/// Multicodec for SHA2-256 multihashes
pub const SHA2_256_CODE: u64 = 0x12;

/// Multicodec for unstructured bytes
pub const RAW_CODEC: u64 = 0x55;
