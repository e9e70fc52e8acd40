//! Normalisation helpers for identifiers, insurer names, and amounts.
//!
//! # Business-number checksum
//!
//! An 11-digit ABN is valid when, after subtracting 1 from the leading digit,
//! the weighted digit sum is divisible by 89:
//!
//! 1. Weights: `10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19`
//! 2. Sum `weight[i] * digit[i]` (first digit reduced by 1)
//! 3. Valid iff `sum % 89 == 0`

const ABN_WEIGHTS: [u32; 11] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];

/// Strip all whitespace and uppercase ASCII letters.
///
/// `"51 824 753 556"` → `"51824753556"`
pub fn normalize_identifier(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Outcome of checking an identifier against the ABN checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCheck {
    Valid,
    /// Not 11 digits after normalisation.
    Malformed,
    /// 11 digits, checksum fails.
    BadChecksum,
}

pub fn check_business_number(s: &str) -> IdentifierCheck {
    let normalized = normalize_identifier(s);
    if normalized.len() != 11 || !normalized.bytes().all(|b| b.is_ascii_digit()) {
        return IdentifierCheck::Malformed;
    }

    // No ABN starts with zero.
    if normalized.starts_with('0') {
        return IdentifierCheck::BadChecksum;
    }

    let sum: u32 = normalized
        .bytes()
        .map(|b| (b - b'0') as u32)
        .enumerate()
        .map(|(i, d)| {
            let d = if i == 0 { d - 1 } else { d };
            d * ABN_WEIGHTS[i]
        })
        .sum();

    if sum % 89 == 0 {
        IdentifierCheck::Valid
    } else {
        IdentifierCheck::BadChecksum
    }
}

/// Fold an insurer name for allow-list lookup: trim, lowercase, collapse runs
/// of whitespace, drop trailing full stops.
pub fn normalize_insurer(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.trim_end_matches('.').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a whole-unit amount with thousands separators: `5000000` → `$5,000,000`.
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
