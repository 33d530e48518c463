//! Key -> file name mapping
//!
//! Keys can hold path separators, reserved names or be longer than the
//! filesystem allows, so entries are stored under the hex SHA-256 of the key.

use sha2::{Digest, Sha256};

/// Length of a mapped file name (hex SHA-256)
pub const FILE_NAME_LEN: usize = 64;

/// Map a logical key to the file name that holds its entry
pub fn map_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Whether `name` looks like something `map_key` produced
pub fn is_entry_file_name(name: &str) -> bool {
    name.len() == FILE_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
