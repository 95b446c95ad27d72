/// Pulls the sequence number the chain expected out of an
/// `sdk`/code-32 rejection log, e.g. `account sequence mismatch,
/// expected 42, got 41: incorrect account sequence`.
#[must_use]
pub fn expected_sequence(log: &str) -> Option<u64> {
    const MARKER: &str = "expected ";

    let tail = &log[log.find(MARKER)? + MARKER.len()..];

    let digits = &tail[..tail
        .find(|character: char| !character.is_ascii_digit())
        .unwrap_or(tail.len())];

    digits.parse().ok()
}
