//! Structural validators applied on top of pattern matches.
//!
//! Validators exist because format alone is not selective enough: the shape
//! `000-00-0000` matches the SSN pattern but is never a valid number.

/// Strip everything except ASCII digits.
fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Validate a US Social Security number.
///
/// Rules:
/// - exactly nine digits
/// - area (first 3) must not be 000, 666, or 900-999
/// - group (middle 2) must not be 00
/// - serial (last 4) must not be 0000
pub fn validate_ssn(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() != 9 {
        return false;
    }

    let area = digits[0] * 100 + digits[1] * 10 + digits[2];
    let group = digits[3] * 10 + digits[4];
    let serial = digits[5] * 1000 + digits[6] * 100 + digits[7] * 10 + digits[8];

    if area == 0 || area == 666 || area >= 900 {
        return false;
    }
    if group == 0 {
        return false;
    }
    if serial == 0 {
        return false;
    }

    true
}

/// Luhn checksum for payment card numbers.
///
/// Normalizes to digits, rejects lengths outside 13-19, doubles every second
/// digit from the rightmost, summing digit-of-product for doubled values
/// above 9. Valid iff the total is divisible by 10.
pub fn luhn_check(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let mut checksum = 0u32;
    for (i, d) in digits.iter().rev().enumerate() {
        if i % 2 == 1 {
            let doubled = d * 2;
            checksum += doubled / 10 + doubled % 10;
        } else {
            checksum += d;
        }
    }

    checksum % 10 == 0
}
