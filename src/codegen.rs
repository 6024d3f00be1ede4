//! Short-code generation.

use rand::RngExt;

/// Number of random bytes per code; hex encoding doubles this.
const CODE_BYTES: usize = 3;

/// Length of a generated code in characters.
pub const CODE_LEN: usize = CODE_BYTES * 2;

/// Generate a random short code: 3 bytes from the thread-local CSPRNG,
/// hex-encoded to 6 lowercase characters.
///
/// Collision handling is the caller's responsibility.
pub fn generate_code() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    rand::rng().fill(&mut bytes);

    let mut code = String::with_capacity(CODE_LEN);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(code, "{b:02x}");
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_codes_vary() {
        // 16.7M possible codes; 50 draws colliding would indicate a broken RNG
        let codes: std::collections::HashSet<String> = (0..50).map(|_| generate_code()).collect();
        assert!(codes.len() > 45);
    }
}
