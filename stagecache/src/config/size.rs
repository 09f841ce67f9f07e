//! Human-readable size parsing (e.g., "4GB", "500MB").

use std::fmt;
use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '4GB', '500MB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Bare numbers are bytes; `K`/`KB`, `M`/`MB`, `G`/`GB` are 1024-based.
/// Case-insensitive and whitespace tolerant.
///
/// ```
/// use stagecache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("4gb").unwrap(), 4 * 1024 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SizeParseError::new(s));
    }

    let upper = trimmed.to_ascii_uppercase();
    let (digits, multiplier) = [("GB", GB), ("G", GB), ("MB", MB), ("M", MB), ("KB", KB), ("K", KB)]
        .iter()
        .find_map(|(suffix, mult)| {
            upper
                .strip_suffix(suffix)
                .map(|rest| (rest.trim().to_string(), *mult))
        })
        .unwrap_or_else(|| (upper.clone(), 1));

    let value: u64 = digits.parse().map_err(|_| SizeParseError::new(s))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a byte count using the largest unit that divides it exactly.
///
/// ```
/// use stagecache::config::format_size;
///
/// assert_eq!(format_size(1024), "1KB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3GB");
/// assert_eq!(format_size(1500), "1500");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{}", bytes)
    }
}

/// Approximate size for display, e.g. "1.5 GB".
pub fn format_size_approx(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", b / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", b / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", b / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// A size that parses from and displays as a human-readable string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size(pub u64);

impl Size {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_size(self.0))
    }
}

impl std::str::FromStr for Size {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_number() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("999999").unwrap(), 999999);
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("500MB").unwrap(), 500 * MB);
        assert_eq!(parse_size("2 g").unwrap(), 2 * GB);
        assert_eq!(parse_size("  16GB ").unwrap(), 16 * GB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("GB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("-1").is_err());
        assert!(parse_size("12TB").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        assert!(parse_size("18446744073709551615GB").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2 * MB), "2MB");
        assert_eq!(format_size(GB + KB), "1048577KB");
    }

    #[test]
    fn test_format_size_approx() {
        assert_eq!(format_size_approx(512), "512 B");
        assert_eq!(format_size_approx(1536), "1.5 KB");
        assert_eq!(format_size_approx(3 * GB / 2), "1.5 GB");
    }

    #[test]
    fn test_size_from_str_and_display() {
        let size: Size = "4GB".parse().unwrap();
        assert_eq!(size.bytes(), 4 * GB);
        assert_eq!(size.to_string(), "4GB");
    }
}
