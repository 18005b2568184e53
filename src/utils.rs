use regex::Regex;
use std::sync::LazyLock;

/// A digit run with optional comma separators and an optional single decimal part.
pub(crate) const NUMBER_PATTERN: &str = r"\d[\d,]*(?:\.\d+)?";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(NUMBER_PATTERN).unwrap());

/// Parses a numeric token after stripping thousands separators.
/// Tokens that do not yield a finite number are rejected.
pub fn parse_numeric_token(token: &str) -> Option<f64> {
    let cleaned: String = token.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// All numeric tokens of `text`, in order of appearance. Malformed tokens are skipped.
pub fn numeric_tokens(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| parse_numeric_token(m.as_str()))
        .collect()
}

/// The first numeric token that starts within `window` characters of the
/// beginning of `text`. A token straddling the window edge is taken whole.
pub fn first_numeric_within(text: &str, window: usize) -> Option<f64> {
    let limit = text
        .char_indices()
        .nth(window)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());

    NUMBER
        .find_iter(text)
        .take_while(|m| m.start() < limit)
        .find_map(|m| parse_numeric_token(m.as_str()))
}

/// Trims a captured label for display: surrounding whitespace, trailing
/// colons/dashes, and runs of internal whitespace.
pub fn clean_label(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| c == ':' || c == '-' || c == '=' || c.is_whitespace());
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decimal places kept on a percent change. Float noise below this is dropped
/// so decimal inputs such as 1 to 1.03 give exactly 3.
pub const PERCENT_DECIMALS: i32 = 6;

/// Signed percentage change from `prior` to `current`, rounded to
/// [`PERCENT_DECIMALS`]; 0 when `prior` is 0.
pub fn percent_change(prior: f64, current: f64) -> f64 {
    if prior == 0.0 {
        return 0.0;
    }
    let scale = 10f64.powi(PERCENT_DECIMALS);
    ((current - prior) * 100.0 / prior * scale).round() / scale
}
