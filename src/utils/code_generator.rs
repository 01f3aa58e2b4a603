//! Short code generation.

use rand::distr::{Alphanumeric, SampleString};

/// Number of characters in a generated code.
pub const CODE_LENGTH: usize = 8;

/// Generates a random alphanumeric short code of [`CODE_LENGTH`] characters.
///
/// Uniqueness is not checked here. Storage rejects a taken code with
/// [`crate::domain::repositories::StorageError::DuplicateCode`] and the caller
/// draws again.
///
/// # Examples
///
/// ```ignore
/// let code = generate_code();
/// assert_eq!(code.len(), 8);
/// ```
pub fn generate_code() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), CODE_LENGTH)
}

/// Returns true if `code` looks like something [`generate_code`] could produce.
///
/// Used to reject obviously bogus path segments before hitting storage.
pub fn is_plausible_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= 64 && code.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_code_has_correct_length() {
        assert_eq!(generate_code().len(), CODE_LENGTH);
    }

    #[test]
    fn test_generate_code_alphanumeric() {
        let code = generate_code();
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_code_produces_unique_codes() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_code()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_plausible_codes() {
        assert!(is_plausible_code("4rSPg8ap"));
        assert!(is_plausible_code(&generate_code()));
    }

    #[test]
    fn test_implausible_codes() {
        assert!(!is_plausible_code(""));
        assert!(!is_plausible_code("has space"));
        assert!(!is_plausible_code("dash-ed"));
        assert!(!is_plausible_code(&"a".repeat(65)));
    }
}
