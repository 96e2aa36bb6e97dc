// 🪪 Identity Validator - Iranian national identity numbers
//
// A national identity number is 10 ASCII digits. The 10th digit is a
// checksum over the first nine:
//   sum = Σ digit[i] * (10 - i)   for i in 0..9
//   r   = sum mod 11
//   check = r        if r < 2
//         = 11 - r   otherwise
// Numbers made of one repeated digit ("1111111111") pass the checksum but
// are never issued, so they are rejected explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const IDENTITY_LENGTH: usize = 10;

// ============================================================================
// VALIDATOR
// ============================================================================

/// Returns true iff `input` is a well-formed national identity number.
///
/// Never panics; arbitrary text simply yields `false`.
pub fn validate_identity(input: &str) -> bool {
    check_identity(input).is_ok()
}

/// Compute the check digit for the first nine digits of an identity number.
///
/// Each element must be a digit value in `0..=9`.
pub fn check_digit(prefix: &[u8; 9]) -> u8 {
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * (10 - i as u32))
        .sum();

    let remainder = (sum % 11) as u8;
    if remainder < 2 {
        remainder
    } else {
        11 - remainder
    }
}

fn check_identity(input: &str) -> Result<(), IdentityError> {
    // Byte length equals char count only for ASCII, so test digits first.
    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdentityError::NonDigit);
    }

    if input.len() != IDENTITY_LENGTH {
        return Err(IdentityError::WrongLength(input.len()));
    }

    let digits: Vec<u8> = input.bytes().map(|b| b - b'0').collect();

    if digits.iter().all(|d| *d == digits[0]) {
        return Err(IdentityError::RepeatedDigits);
    }

    let mut prefix = [0u8; 9];
    prefix.copy_from_slice(&digits[..9]);

    if check_digit(&prefix) != digits[9] {
        return Err(IdentityError::BadChecksum);
    }

    Ok(())
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity number must be {IDENTITY_LENGTH} digits, got {0}")]
    WrongLength(usize),

    #[error("identity number may only contain digits")]
    NonDigit,

    #[error("identity number cannot repeat a single digit")]
    RepeatedDigits,

    #[error("identity number checksum does not match")]
    BadChecksum,
}

// ============================================================================
// IDENTITY NUMBER (value type)
// ============================================================================

/// A national identity number used as the join key between registered and
/// expected students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityNumber(String);

impl IdentityNumber {
    /// Parse and fully validate user input.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        check_identity(input)?;
        Ok(IdentityNumber(input.to_string()))
    }

    /// Build a join key from already-normalized digits.
    ///
    /// Used for rows read back from the store. The checksum is not
    /// re-checked; non-digit characters are dropped.
    pub fn from_digits(digits: &str) -> Self {
        IdentityNumber(digits.chars().filter(|c| c.is_ascii_digit()).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_identity(&self.0)
    }
}

impl fmt::Display for IdentityNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &[&str] = &[
        "0499370899",
        "0010010017",
        "1234567891",
        "9876543210",
        "4501234563",
        "0581234561",
        "3000000003",
    ];

    #[test]
    fn test_known_valid_numbers() {
        for id in VALID {
            assert!(validate_identity(id), "{} should be valid", id);
        }
    }

    #[test]
    fn test_flipping_last_digit_invalidates() {
        for id in VALID {
            let last = id.as_bytes()[9] - b'0';
            let flipped = format!("{}{}", &id[..9], (last + 1) % 10);
            assert!(!validate_identity(&flipped), "{} should be invalid", flipped);
        }
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!validate_identity(""));
        assert!(!validate_identity("049937089"));
        assert!(!validate_identity("04993708990"));
        assert_eq!(
            IdentityNumber::parse("123").unwrap_err(),
            IdentityError::WrongLength(3)
        );
    }

    #[test]
    fn test_non_digits_rejected() {
        assert!(!validate_identity("049937089a"));
        assert!(!validate_identity("049-370899"));
        assert!(!validate_identity(" 0499370899"));
        // Persian digits are not accepted by the validator itself
        assert!(!validate_identity("۰۴۹۹۳۷۰۸۹۹"));
        assert_eq!(
            IdentityNumber::parse("04993708x9").unwrap_err(),
            IdentityError::NonDigit
        );
    }

    #[test]
    fn test_repeated_digits_rejected() {
        for d in 0..10 {
            let id = d.to_string().repeat(10);
            assert!(!validate_identity(&id), "{} should be invalid", id);
        }
        assert_eq!(
            IdentityNumber::parse("1111111111").unwrap_err(),
            IdentityError::RepeatedDigits
        );
    }

    #[test]
    fn test_check_digit_low_remainders() {
        // remainder 0 -> check 0
        assert_eq!(check_digit(&[0, 0, 0, 0, 0, 0, 0, 0, 0]), 0);
        // remainder 1 -> check 1 (6 * 2 = 12)
        assert_eq!(check_digit(&[0, 0, 0, 0, 0, 0, 0, 0, 6]), 1);
        // sum 210, remainder 1
        assert_eq!(check_digit(&[1, 2, 3, 4, 5, 6, 7, 8, 9]), 1);
        // remainder 2 -> check 9
        assert_eq!(check_digit(&[0, 0, 0, 0, 0, 0, 0, 0, 1]), 9);
    }

    #[test]
    fn test_from_digits_strips_separators() {
        let id = IdentityNumber::from_digits("001-001001 1");
        assert_eq!(id.as_str(), "0010010011");
        assert!(!id.is_valid());
        assert_eq!(id.to_string(), "0010010011");
    }

    #[test]
    fn test_parse_round_trips_display() {
        let id = IdentityNumber::parse("0499370899").unwrap();
        assert_eq!(id.as_str(), "0499370899");
        assert!(id.is_valid());
    }
}
