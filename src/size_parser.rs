//! Object size string parsing
//!
//! Object sizes are always base 2: `1KB` and `1KiB` both mean 1024 bytes.
//! Suffixes are case-insensitive and the trailing `B` is optional.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serializer};

/// Parse a size string into bytes
///
/// Examples:
/// - "1024" → 1024 bytes
/// - "1KB" → 1,024 bytes
/// - "10MiB" → 10,485,760 bytes
/// - "1.5k" → 1,536 bytes
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();

    if let Ok(num) = input.parse::<u64>() {
        return Ok(num);
    }

    let (number_part, suffix) = split_number_suffix(input)?;

    let value: f64 = number_part
        .parse()
        .map_err(|_| anyhow!("Invalid number: {}", number_part))?;

    let multiplier = parse_suffix(suffix)?;
    Ok((value * multiplier as f64).round() as u64)
}

/// Render a byte count with the largest whole binary unit
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("TiB", 1 << 40),
        ("GiB", 1 << 30),
        ("MiB", 1 << 20),
        ("KiB", 1 << 10),
    ];
    for (label, unit) in UNITS {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, label);
        }
    }
    format!("{}B", bytes)
}

fn split_number_suffix(input: &str) -> Result<(&str, &str)> {
    let suffix_start = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| anyhow!("No suffix found in: {}", input))?;

    let number_part = &input[..suffix_start];
    if number_part.is_empty() {
        return Err(anyhow!("No number found in: {}", input));
    }
    Ok((number_part, input[suffix_start..].trim()))
}

fn parse_suffix(suffix: &str) -> Result<u64> {
    match suffix.to_uppercase().as_str() {
        "B" => Ok(1),
        "K" | "KB" | "KI" | "KIB" => Ok(1 << 10),
        "M" | "MB" | "MI" | "MIB" => Ok(1 << 20),
        "G" | "GB" | "GI" | "GIB" => Ok(1 << 30),
        "T" | "TB" | "TI" | "TIB" => Ok(1 << 40),
        _ => Err(anyhow!(
            "Unknown size suffix: {}. Supported: B, KB/KiB, MB/MiB, GB/GiB, TB/TiB",
            suffix
        )),
    }
}

/// Deserialize a size that can be either a number or a string with suffix
pub fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Number(u64),
        String(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

pub fn serialize_size<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_size(*value))
}
