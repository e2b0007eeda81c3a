/// Instruments shown on the terminal pages, grouped the way the pages list them.
pub struct SymbolGroup {
    pub section: &'static str,
    pub group: &'static str,
    pub symbols: &'static [&'static str],
}

pub const CATALOG: &[SymbolGroup] = &[
    SymbolGroup {
        section: "standard",
        group: "americas",
        symbols: &["DOW JONES", "S&P 500", "NASDAQ", "S&P/TSX Comp", "S&P/BMV IPC", "IBOVESPA"],
    },
    SymbolGroup {
        section: "standard",
        group: "emea",
        symbols: &[
            "Euro Stoxx 50", "FTSE 100", "CAC 40", "DAX", "IBEX 35", "FTSE MIB", "OMX STKH30",
            "SWISS MKT",
        ],
    },
    SymbolGroup {
        section: "standard",
        group: "asia_pacific",
        symbols: &["NIKKEI", "HANG SENG", "CSI 300", "S&P/ASX 200"],
    },
    SymbolGroup {
        section: "forex",
        group: "major",
        symbols: &["XAUUSD", "USDJPY", "USDCHF", "USDCAD", "US30", "NZDUSD", "NZDJPY", "GBPUSD"],
    },
    SymbolGroup {
        section: "forex",
        group: "emerging",
        symbols: &["GBPCHF", "GBPAUD", "EURUSD", "EURJPY", "EURCHF", "AUDUSD", "AUDJPY"],
    },
    SymbolGroup {
        section: "crypto",
        group: "major",
        symbols: &["BTCUSDT", "ETHUSDT", "BNBUSDT", "COMPUSDT", "SUIUSDT", "SOLUSDT"],
    },
    SymbolGroup {
        section: "crypto",
        group: "altcoins",
        symbols: &["1000BONKUSDT", "1000PEPEUSDT", "DOGEUSDT", "1000SHIBUSDT", "XRPUSDT", "LTCUSDT"],
    },
    SymbolGroup {
        section: "overview",
        group: "overview",
        symbols: &["SPX", "IXIC", "DJI", "UKX", "N225"],
    },
];

pub fn group(section: &str, group: &str) -> Option<&'static [&'static str]> {
    CATALOG
        .iter()
        .find(|g| g.section == section && g.group == group)
        .map(|g| g.symbols)
}

/// Every catalog symbol once, in catalog order.
pub fn all_symbols() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for g in CATALOG {
        for &s in g.symbols {
            if !out.contains(&s) {
                out.push(s);
            }
        }
    }
    out
}

pub fn contains(symbol: &str) -> bool {
    CATALOG.iter().any(|g| g.symbols.contains(&symbol))
}
