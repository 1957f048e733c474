use anyhow::{Context, Result, bail};

const DEFAULT_SEED: u64 = 1337;
const MAX_RANGE_LEN: u64 = 10_000;

/// Resolve CLI seed tokens into a deduplicated, ordered seed list.
///
/// Accepts decimal integers (negative values use their magnitude), `0x` hex,
/// and inclusive ranges such as `10..14`.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds: Vec<u64> = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = token.split_once("..") {
            let lo = parse_seed(lo)?;
            let hi = parse_seed(hi)?;
            if hi < lo || hi - lo >= MAX_RANGE_LEN {
                bail!("Seed range {token} is empty or too large");
            }
            seeds.extend(lo..=hi);
            continue;
        }
        seeds.push(parse_seed(token)?);
    }

    let mut deduped = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if !deduped.contains(&seed) {
            deduped.push(seed);
        }
    }
    if deduped.is_empty() {
        deduped.push(DEFAULT_SEED);
    }
    Ok(deduped)
}

fn parse_seed(token: &str) -> Result<u64> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .with_context(|| format!("Unrecognized seed token: {token}"));
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }
    token
        .parse::<u64>()
        .with_context(|| format!("Unrecognized seed token: {token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn resolves_numeric_hex_and_ranges() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0x10", "3..5", "4"])).unwrap();
        assert_eq!(seeds, vec![42, 7, 16, 3, 4, 5]);
    }

    #[test]
    fn empty_input_falls_back_to_default() {
        assert_eq!(resolve_seed_inputs(&tokens(&["", " "])).unwrap(), vec![1337]);
    }

    #[test]
    fn rejects_garbage_and_bad_ranges() {
        assert!(resolve_seed_inputs(&tokens(&["banana"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["9..3"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["0..100000"])).is_err());
    }
}
