//! Ticket ID generation.
//!
//! IDs are base-32 Crockford encodings of a Unix second count, 7 characters,
//! lexicographically sortable by time. Collisions within the same second are
//! broken with a lowercase-letter suffix enumerated `a, b, …, z, za, zb, …,
//! zz, zza, …` up to length 4.

use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TkError};
use crate::lock::DirLock;
use crate::types::ticket_path;

const CROCKFORD_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const ID_LEN: usize = 7;
const MAX_SUFFIX_LEN: usize = 4;

/// Encode a Unix second count as a 7-character, lexicographically sortable
/// base-32 Crockford string.
pub fn encode_timestamp(unix_seconds: u32) -> String {
    let value = unix_seconds as u64;
    let mut out = String::with_capacity(ID_LEN);
    for i in 0..ID_LEN {
        let shift = 5 * (ID_LEN - 1 - i);
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(CROCKFORD_ALPHABET[idx] as char);
    }
    out
}

/// The deterministic collision-suffix enumeration: `a, b, …, z, za, zb, …,
/// zz, zza, …, zzzz`. 26 suffixes per length, lengths 1..=4.
fn suffix_sequence() -> impl Iterator<Item = String> {
    (1..=MAX_SUFFIX_LEN).flat_map(|len| {
        let prefix = "z".repeat(len - 1);
        (b'a'..=b'z').map(move |c| format!("{prefix}{}", c as char))
    })
}

/// Generate a unique ticket id for `dir` at the given Unix second count.
///
/// Uniqueness is established under the lock keyed on `<base-id>.md`, so two
/// concurrent creators in the same second serialize and are assigned
/// distinct suffixes rather than racing on `exists()`.
pub fn generate_id(dir: &Path, now_unix_seconds: u32, lock_timeout: Duration) -> Result<String> {
    let base = encode_timestamp(now_unix_seconds);
    let locks_dir = dir.join(".locks");
    let lock = DirLock::acquire(&locks_dir, &format!("{base}.md"), lock_timeout)?;

    let result = if !ticket_path(dir, &base).exists() {
        Ok(base.clone())
    } else {
        suffix_sequence()
            .map(|suffix| format!("{base}{suffix}"))
            .find(|candidate| !ticket_path(dir, candidate).exists())
            .ok_or_else(|| {
                TkError::IDGenerationFailed(format!(
                    "exhausted all suffixes for timestamp base '{base}'"
                ))
            })
    };

    lock.release()?;
    result
}
