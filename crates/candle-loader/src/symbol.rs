use market_core::symbols;

/// Alpha timeframe suffixes, only stripped when separated from the symbol (`EURUSD_D1`).
const SEPARATED_ALPHA_SUFFIXES: &[&str] = &["D1", "W1", "MN"];

/// Numeric MT4/MT5 timeframe suffixes, longest first.
const NUMERIC_SUFFIXES: &[&str] = &["1440", "240", "60", "30", "15", "5", "1"];

/// Turn a file stem or user input into an instrument symbol.
///
/// `eurusd_d1` becomes `EURUSD`, `XAUUSD1` becomes `XAUUSD`. An unseparated `D1` is not
/// treated as a timeframe (`USD1` loses only the `1`), and catalog symbols that end in
/// digits (`US30`) are kept as is.
pub fn normalize_symbol(raw: &str) -> String {
    let s = raw.trim().to_uppercase();

    for suffix in SEPARATED_ALPHA_SUFFIXES {
        if let Some(stem) = s.strip_suffix(suffix) {
            if let Some(sep) = stem.chars().last() {
                if sep == '_' || sep == '-' || sep.is_whitespace() {
                    return stem[..stem.len() - sep.len_utf8()].to_string();
                }
            }
        }
    }

    if symbols::contains(&s) {
        return s;
    }

    for suffix in NUMERIC_SUFFIXES {
        if let Some(stem) = s.strip_suffix(suffix) {
            return stem.to_string();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separated_alpha_suffix() {
        assert_eq!(normalize_symbol("eurusd_d1"), "EURUSD");
        assert_eq!(normalize_symbol("GBPJPY-W1"), "GBPJPY");
        assert_eq!(normalize_symbol("XAUUSD MN"), "XAUUSD");
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(normalize_symbol("XAUUSD1"), "XAUUSD");
        assert_eq!(normalize_symbol("EURUSD240"), "EURUSD");
        assert_eq!(normalize_symbol("EURUSD1440"), "EURUSD");
        assert_eq!(normalize_symbol(" nzdusd15 "), "NZDUSD");
    }

    #[test]
    fn test_unseparated_alpha_suffix_kept() {
        assert_eq!(normalize_symbol("USD1"), "USD");
        assert_eq!(normalize_symbol("AUDD1"), "AUDD");
        assert_eq!(normalize_symbol("BTCUSD"), "BTCUSD");
    }

    #[test]
    fn test_catalog_symbols_with_digits_kept() {
        assert_eq!(normalize_symbol("US30"), "US30");
        assert_eq!(normalize_symbol("us30_d1"), "US30");
        assert_eq!(normalize_symbol("US305"), "US30");
    }
}
