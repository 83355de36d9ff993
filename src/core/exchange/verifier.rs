/// Acceptance test for one round: the chip must echo the exact command.
///
/// Any length difference or differing byte is a mismatch.
pub fn verify_echo(expected: &[u8], received: &[u8]) -> bool {
    expected.len() == received.len() && expected == received
}

/// Index of the first byte that differs, or the shorter length when one
/// buffer is a prefix of the other
pub fn first_mismatch(expected: &[u8], received: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(received)
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != received.len()).then(|| expected.len().min(received.len())))
}
