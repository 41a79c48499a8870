use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// For EUR/USD, 1 unit = 100 cents, so €50.00 = 5000 cents.
pub type Cents = i64;

/// Balances whose magnitude is below this many cents count as settled (ε = 0.01).
pub const SETTLED_TOLERANCE: Cents = 1;

/// Returns true when the amount is within the settlement tolerance of zero.
pub fn is_settled(cents: Cents) -> bool {
    cents.unsigned_abs() < SETTLED_TOLERANCE.unsigned_abs()
}

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000, "0.125" -> 13
///
/// Digits past the second decimal are rounded half away from zero.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let parts: Vec<&str> = input.split('.').collect();
    let (units_str, decimal_str) = match parts.len() {
        1 => (parts[0], ""),
        2 => (parts[0], parts[1]),
        _ => return Err(ParseCentsError::InvalidFormat),
    };

    if units_str.is_empty() && decimal_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !decimal_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::OutOfRange)?
    };

    let digits = decimal_str.as_bytes();
    let digit = |idx: usize| digits.get(idx).map(|d| (d - b'0') as i64).unwrap_or(0);
    let mut decimal_cents = digit(0) * 10 + digit(1);
    if digit(2) >= 5 {
        decimal_cents += 1;
    }

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::OutOfRange)?;
    Ok(if negative { -cents } else { cents })
}

/// Split an amount into `parts` shares that add back up to the amount exactly.
///
/// Every share gets `amount / parts`; the first `amount % parts` shares carry
/// one extra cent. Returns `None` when `parts` is zero.
pub fn split_evenly(amount: Cents, parts: usize) -> Option<Vec<Cents>> {
    if parts == 0 {
        return None;
    }
    let divisor = i64::try_from(parts).ok()?;
    let base = amount / divisor;
    let remainder = (amount % divisor).unsigned_abs() as usize;
    let extra = amount.signum();

    Some(
        (0..parts)
            .map(|idx| if idx < remainder { base + extra } else { base })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    OutOfRange,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::OutOfRange => write!(f, "money amount out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
