//! Short username to full identity.

/// Valid prefixes with the highest number each allows.
const PREFIXES: [(char, u32); 3] = [('d', 15), ('j', 14), ('z', 15)];

/// Expand a short identifier such as `j07` into `<unit>.j07`.
///
/// Accepts exactly three characters: a known prefix followed by a two digit
/// number in the prefix's range. Returns `None` for anything else.
pub fn validate_username(short: &str, unit: &str) -> Option<String> {
    let mut chars = short.chars();
    let prefix = chars.next()?;
    let digits = chars.as_str();
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (_, max) = PREFIXES.iter().find(|(p, _)| *p == prefix)?;
    let number: u32 = digits.parse().ok()?;
    if !(1..=*max).contains(&number) {
        return None;
    }

    Some(format!("{}.{}{:02}", unit, prefix, number))
}
