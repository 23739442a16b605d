//! Ticker normalization and quote formatting.

use sauti_core::records::Quote;

/// Clean a model-supplied ticker and map bare local tickers onto the local exchange.
///
/// `"[scom]"` becomes `"SCOM.NR"` when `SCOM` is listed locally; anything
/// else is only trimmed and uppercased.
pub fn normalize_symbol(raw: &str, local_tickers: &[String], suffix: &str) -> String {
    let symbol = raw.replace(['[', ']'], "").trim().to_uppercase();
    if local_tickers.iter().any(|t| t.eq_ignore_ascii_case(&symbol)) {
        format!("{symbol}{suffix}")
    } else {
        symbol
    }
}

/// Render a quote for the chat.
pub fn format_quote(quote: &Quote) -> String {
    format!(
        "📈 **{} Price:** {:.2} {}",
        quote.symbol, quote.price, quote.currency
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Vec<String> {
        ["SCOM", "KCB", "EQTY"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_local_ticker_gets_suffix() {
        assert_eq!(normalize_symbol("SCOM", &local(), ".NR"), "SCOM.NR");
        assert_eq!(normalize_symbol(" [kcb] ", &local(), ".NR"), "KCB.NR");
    }

    #[test]
    fn test_foreign_symbol_passes_through() {
        assert_eq!(normalize_symbol("BTC-USD", &local(), ".NR"), "BTC-USD");
        assert_eq!(normalize_symbol("aapl", &local(), ".NR"), "AAPL");
    }

    #[test]
    fn test_already_suffixed_is_left_alone() {
        assert_eq!(normalize_symbol("SCOM.NR", &local(), ".NR"), "SCOM.NR");
    }

    #[test]
    fn test_format_quote_two_decimals() {
        let quote = Quote {
            symbol: "SCOM.NR".into(),
            price: 17.456,
            currency: "KES".into(),
        };
        assert_eq!(format_quote(&quote), "📈 **SCOM.NR Price:** 17.46 KES");
    }
}
