use advisor_core::domain::Instrument;

/// Default watch list, in sync order.
const DEFAULT_UNIVERSE: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corp."),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com"),
    ("TSLA", "Tesla Inc."),
    ("NVDA", "NVIDIA Corp."),
    ("META", "Meta Platforms"),
    ("NFLX", "Netflix Inc."),
    ("JPM", "JPMorgan Chase"),
    ("V", "Visa Inc."),
    ("KO", "Coca-Cola"),
    ("PEP", "PepsiCo"),
    ("WMT", "Walmart"),
    ("MCD", "McDonald's"),
    ("NKE", "Nike"),
    ("XOM", "Exxon Mobil"),
    ("CVX", "Chevron"),
    ("JNJ", "Johnson & Johnson"),
    ("PFE", "Pfizer"),
    ("AMD", "AMD"),
    ("INTC", "Intel"),
    ("DIS", "Disney"),
];

// (symbol, P/E, EPS). Refreshed by hand; no upstream source.
const FUNDAMENTALS: &[(&str, Option<f64>, f64)] = &[
    ("AAPL", Some(34.66), 7.91),
    ("MSFT", Some(26.06), 15.99),
    ("GOOGL", Some(29.73), 10.91),
    ("AMZN", Some(28.85), 7.29),
    ("TSLA", Some(386.41), 1.08),
    ("NVDA", Some(46.01), 4.03),
    ("META", Some(28.15), 23.50),
    ("NFLX", Some(32.24), 2.53),
    ("JPM", Some(16.12), 20.01),
    ("V", Some(30.54), 10.65),
    ("MA", Some(34.16), 15.67),
    ("BAC", Some(14.76), 3.83),
    ("KO", Some(26.08), 3.03),
    ("PEP", Some(32.35), 5.27),
    ("WMT", Some(44.95), 2.87),
    ("MCD", Some(27.91), 11.72),
    ("NKE", Some(37.60), 1.70),
    ("XOM", Some(22.28), 6.69),
    ("CVX", Some(27.16), 6.66),
    ("JNJ", Some(21.72), 11.05),
    ("PFE", Some(15.83), 1.72),
    ("AMD", Some(81.51), 2.65),
    ("INTC", None, -0.27),
    ("DIS", Some(15.96), 6.81),
];

fn with_fundamentals(symbol: &str, name: &str) -> Instrument {
    let base = Instrument::new(symbol, name);
    match FUNDAMENTALS.iter().find(|(s, _, _)| *s == symbol) {
        Some((_, pe, eps)) => base.with_fundamentals(*pe, Some(*eps)),
        None => base,
    }
}

pub fn default_universe() -> Vec<Instrument> {
    DEFAULT_UNIVERSE
        .iter()
        .map(|(symbol, name)| with_fundamentals(symbol, name))
        .collect()
}

/// The sync universe: `symbols` when given (known names and fundamentals attached,
/// duplicates dropped), otherwise the default list.
pub fn build_universe(symbols: Option<&[String]>) -> anyhow::Result<Vec<Instrument>> {
    let Some(symbols) = symbols else {
        return Ok(default_universe());
    };

    let mut out: Vec<Instrument> = Vec::with_capacity(symbols.len());
    for raw in symbols {
        let symbol = raw.trim().to_ascii_uppercase();
        anyhow::ensure!(
            !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'),
            "invalid symbol in SYMBOLS: {raw:?}"
        );
        if out.iter().any(|i| i.symbol == symbol) {
            continue;
        }
        let name = DEFAULT_UNIVERSE
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, n)| *n)
            .unwrap_or(symbol.as_str());
        out.push(with_fundamentals(&symbol, name));
    }
    anyhow::ensure!(!out.is_empty(), "SYMBOLS is empty");
    Ok(out)
}
