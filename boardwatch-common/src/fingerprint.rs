//! Inference cache fingerprinting
//!
//! Cache keys are content-addressed: a SHA-256 over the task name and
//! the full identifying inputs, so two inputs differing anywhere in
//! their content get distinct keys. Whitespace is normalized before
//! hashing so trailing-newline edits do not bust the cache.

use sha2::{Digest, Sha256};

/// Field separator fed into the hash between inputs. An unlikely byte
/// keeps "ab" + "c" distinct from "a" + "bc".
const SEPARATOR: u8 = 0x1f;

/// Derive a deterministic cache key from a task name and its
/// identifying inputs.
pub fn fingerprint(task: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task.as_bytes());
    for part in parts {
        hasher.update([SEPARATOR]);
        hasher.update(normalize(part).as_bytes());
    }
    let digest = hasher.finalize();
    format!("{}:{:x}", task, digest)
}

/// Collapse runs of whitespace to single spaces and trim the ends.
fn normalize(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
