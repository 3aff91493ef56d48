//! Minimal collation classification: just enough to tell the value decoder whether a
//! BYTES/ENUM column holds text or opaque binary data.

/// MySQL's `binary` collation id, and the id most servers assign to it by default.
const COLLATION_BINARY: u64 = 63;

/// Returns true when `collation_id` is a known binary (non-text) collation. Every id not in
/// this table is treated as text, matching MySQL's own default of `utf8mb4_general_ci`/
/// `utf8mb4_0900_ai_ci` for ordinary string columns.
pub fn is_binary_collation(collation_id: u64) -> bool {
    collation_id == COLLATION_BINARY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_binary_collation() {
        assert!(is_binary_collation(63));
        assert!(!is_binary_collation(255)); // utf8mb4_0900_ai_ci
        assert!(!is_binary_collation(45)); // utf8mb4_general_ci
    }
}
