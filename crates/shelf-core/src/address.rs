//! Address validity checks.
//!
//! Generated addresses are applied verbatim; nothing here rewrites them.
//! These checks feed the conflict scan, which decides how loudly to
//! complain about each finding.

/// Characters that downstream address lookups cannot represent.
pub const RESERVED_ADDRESS_CHARS: &[char] = &['[', ']', '{', '}'];

/// A problem found in a generated address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressIssue {
    /// Empty, or nothing but whitespace.
    Blank,
    /// Contains one of [`RESERVED_ADDRESS_CHARS`].
    ReservedChar(char),
    /// Contains a control character.
    ControlChar,
    /// Leading or trailing whitespace.
    BoundaryWhitespace,
}

/// Inspects an address and returns every issue found. A blank address is
/// reported alone; its other properties are meaningless.
pub fn inspect(address: &str) -> Vec<AddressIssue> {
    if address.trim().is_empty() {
        return vec![AddressIssue::Blank];
    }

    let mut issues = Vec::new();
    if let Some(c) = address
        .chars()
        .find(|c| RESERVED_ADDRESS_CHARS.contains(c))
    {
        issues.push(AddressIssue::ReservedChar(c));
    }
    if address.chars().any(char::is_control) {
        issues.push(AddressIssue::ControlChar);
    }
    if address != address.trim() {
        issues.push(AddressIssue::BoundaryWhitespace);
    }
    issues
}

/// True when `inspect` finds nothing.
pub fn is_clean(address: &str) -> bool {
    inspect(address).is_empty()
}
