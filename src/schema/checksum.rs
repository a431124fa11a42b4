//! # Schema Fingerprint
//!
//! CRC32 of the definition file, recorded in every run report so an operator
//! can tell which definition a CMS was provisioned from.

use crc32fast::Hasher;

/// Compute the `crc32:XXXXXXXX` fingerprint of definition content
///
/// Line endings are normalized first, so the same file checked out on
/// Windows and Unix fingerprints the same.
pub fn fingerprint(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut hasher = Hasher::new();
    hasher.update(normalized.as_bytes());
    format!("crc32:{:08X}", hasher.finalize())
}
