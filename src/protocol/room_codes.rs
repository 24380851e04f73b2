use super::types::{ROOM_CODE_PREFIX, ROOM_CODE_RANDOM_LEN};
use rand::RngExt;

/// Generate a room code: the fixed `MAZ` prefix plus four uppercase letters.
/// Uniqueness against live rooms is the caller's responsibility; the 26^4
/// space keeps collisions rare.
pub fn generate_room_code() -> String {
    const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::rng();
    let mut code = String::with_capacity(ROOM_CODE_PREFIX.len() + ROOM_CODE_RANDOM_LEN);
    code.push_str(ROOM_CODE_PREFIX);
    for _ in 0..ROOM_CODE_RANDOM_LEN {
        let idx = rng.random_range(0..LETTERS.len());
        // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
        // always within [0, len).
        #[allow(clippy::indexing_slicing)]
        code.push(LETTERS[idx] as char);
    }
    code
}

/// Validate that a client-supplied code has the generated shape.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_PREFIX.len() + ROOM_CODE_RANDOM_LEN
        && code.starts_with(ROOM_CODE_PREFIX)
        && code[ROOM_CODE_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_uppercase())
}
