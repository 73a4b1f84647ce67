//! Parses a SCID file name into `(symbol, symbol_period)`, e.g.
//! `ESU5.CME.scid` -> symbol `ES`, period `U5`, with a split-on-`.`
//! fallback on a regex miss (grounded on `scid_to_qdb.py`'s `re.match` +
//! fallback).

use std::path::Path;

use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Z]{2,3})([A-Z]\d)\.([A-Z]+)$").unwrap())
}

/// Stream identity derived from a SCID file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentity {
    pub symbol: String,
    pub symbol_period: String,
}

impl StreamIdentity {
    /// Concatenation of symbol and period, used as the checkpoint key.
    pub fn stream_id(&self) -> String {
        format!("{}{}", self.symbol, self.symbol_period)
    }
}

pub fn parse(path: &Path) -> StreamIdentity {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    // file_stem() only strips the final extension (".scid"); the exchange
    // suffix (".CME") is still attached, matching the ".scid"-stripped stem
    // the regex expects.
    if let Some(caps) = pattern().captures(stem) {
        return StreamIdentity {
            symbol: caps[1].to_owned(),
            symbol_period: caps[2].to_owned(),
        };
    }

    tracing::warn!(
        message = "filename did not match expected SCID pattern, using fallback parse",
        file_stem = stem,
    );
    let mut parts = stem.split('.');
    let symbol = parts.next().unwrap_or_default().to_owned();
    let symbol_period = parts.next().unwrap_or_default().to_owned();
    StreamIdentity {
        symbol,
        symbol_period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_standard_name() {
        let id = parse(&PathBuf::from("ESU5.CME.scid"));
        assert_eq!(id.symbol, "ES");
        assert_eq!(id.symbol_period, "U5");
        assert_eq!(id.stream_id(), "ESU5");
    }

    #[test]
    fn parses_three_letter_root() {
        let id = parse(&PathBuf::from("NQZ5.CME.scid"));
        assert_eq!(id.symbol, "NQ");
        assert_eq!(id.symbol_period, "Z5");
    }

    #[test]
    fn falls_back_on_regex_miss() {
        let id = parse(&PathBuf::from("weird_name.scid"));
        assert_eq!(id.symbol, "weird_name");
        assert_eq!(id.symbol_period, "");
    }
}
