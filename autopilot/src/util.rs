use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

pub fn parse_seed(seed: &str) -> Result<u32> {
    let s = seed.trim();
    if s.is_empty() {
        return Err(anyhow!("empty seed"));
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed: {s}"))
    } else {
        s.parse::<u32>()
            .with_context(|| format!("invalid decimal seed: {s}"))
    }
}

pub fn seed_to_hex(seed: u32) -> String {
    format!("0x{seed:08x}")
}

pub fn parse_seed_csv(input: &str) -> Result<Vec<u32>> {
    let seeds = input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_seed)
        .collect::<Result<Vec<_>>>()?;
    if seeds.is_empty() {
        return Err(anyhow!("no seeds parsed from --seeds"));
    }
    Ok(seeds)
}

pub fn parse_seed_file(path: &Path) -> Result<Vec<u32>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed reading seed file {}", path.display()))?;
    let mut seeds = Vec::new();
    for line in data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        seeds.push(parse_seed(trimmed)?);
    }
    if seeds.is_empty() {
        return Err(anyhow!("seed file {} had no seeds", path.display()));
    }
    Ok(seeds)
}

/// Expands `start` into `count` seeds with the Numerical Recipes LCG.
pub fn seed_sequence(start: u32, count: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(count as usize);
    let mut cur = start;
    for _ in 0..count {
        out.push(cur);
        cur = cur.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    }
    out
}

/// Comma-separated list with blanks dropped; errors when nothing is left.
pub fn parse_id_csv(input: &str, flag: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(anyhow!("{flag} resolved to empty list"));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_seeds() {
        assert_eq!(parse_seed("0xA57E0001").unwrap(), 0xA57E_0001);
        assert_eq!(parse_seed(" 42 ").unwrap(), 42);
        assert!(parse_seed("").is_err());
        assert!(parse_seed("0xZZ").is_err());
    }

    #[test]
    fn csv_skips_blank_tokens() {
        assert_eq!(parse_seed_csv("1, ,0x10,").unwrap(), vec![1, 16]);
        assert!(parse_seed_csv(" , ").is_err());
    }

    #[test]
    fn seed_file_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        fs::write(&path, "# header\n0x01\n\n7\n").unwrap();
        assert_eq!(parse_seed_file(&path).unwrap(), vec![1, 7]);
    }

    #[test]
    fn seed_sequence_starts_at_start() {
        let seeds = seed_sequence(5, 3);
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0], 5);
        assert_eq!(seeds[1], 5u32.wrapping_mul(1_664_525).wrapping_add(1_013_904_223));
    }

    #[test]
    fn hex_formatting_is_zero_padded() {
        assert_eq!(seed_to_hex(0xBEEF), "0x0000beef");
    }
}
