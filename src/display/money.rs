//! Amount formatting

/// Currency used when none is configured
pub const DEFAULT_CURRENCY: &str = "USD";

/// Symbol for a currency code; unknown codes are shown as-is
pub fn currency_symbol(code: &str) -> &str {
    match code {
        "" | "USD" | "CAD" | "AUD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "BRL" => "R$",
        other => other,
    }
}

/// Format an amount with two decimals and the currency symbol
pub fn format_amount(amount: f64, currency: &str) -> String {
    let symbol = currency_symbol(currency);
    let separator = if symbol.chars().count() > 2 { " " } else { "" };
    if amount < 0.0 {
        format!("-{}{}{:.2}", symbol, separator, -amount)
    } else {
        format!("{}{}{:.2}", symbol, separator, amount)
    }
}

/// Truncate a string to a maximum number of characters with an ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
