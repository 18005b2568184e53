//! Free-text line-item extraction.
//!
//! Three strategies are tried in priority order:
//!
//! 1. **Dual-year**: `"<label> <prior year>: <value>, <current year>: <value>"` per segment.
//! 2. **Keyword**: known line-item synonyms followed by a number within a short window.
//! 3. **Positional**: at least five bare numbers mapped onto a fixed template.
//!    The result is flagged low-confidence since it depends entirely on input order.

use crate::config::ExtractionConfig;
use crate::schema::{names, ExtractionMethod, LineItem, LineItemSet, Period};
use crate::utils::{clean_label, first_numeric_within, numeric_tokens, parse_numeric_token};
use log::debug;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Synonyms recognised by the keyword strategy, mapped to canonical names.
pub const KEYWORD_SYNONYMS: &[(&str, &str)] = &[
    ("cost of goods sold", names::COGS),
    ("cost of sales", names::COGS),
    ("cogs", names::COGS),
    ("gross profit", names::GROSS_PROFIT),
    ("operating income", names::OPERATING_INCOME),
    ("operating profit", names::OPERATING_INCOME),
    ("ebit", names::OPERATING_INCOME),
    ("net income", names::NET_INCOME),
    ("net profit", names::NET_INCOME),
    ("profit after tax", names::NET_INCOME),
    ("total assets", names::TOTAL_ASSETS),
    ("total liabilities", names::TOTAL_LIABILITIES),
    ("total equity", names::TOTAL_EQUITY),
    ("shareholders equity", names::TOTAL_EQUITY),
    ("stockholders equity", names::TOTAL_EQUITY),
    ("current assets", names::CURRENT_ASSETS),
    ("current liabilities", names::CURRENT_LIABILITIES),
    ("inventories", names::INVENTORY),
    ("inventory", names::INVENTORY),
    ("cash and cash equivalents", names::CASH),
    ("cash", names::CASH),
    ("trade receivables", names::RECEIVABLES),
    ("accounts receivable", names::RECEIVABLES),
    ("operating expenses", names::OPERATING_EXPENSES),
    ("opex", names::OPERATING_EXPENSES),
    ("revenues", names::REVENUE),
    ("revenue", names::REVENUE),
    ("turnover", names::REVENUE),
    ("sales", names::REVENUE),
];

/// Order in which bare numbers are assigned by the positional fallback.
pub const POSITIONAL_TEMPLATE: [&str; 5] = [
    names::REVENUE,
    names::COGS,
    names::NET_INCOME,
    names::TOTAL_ASSETS,
    names::TOTAL_LIABILITIES,
];

const SEPARATOR: &str = r"(?:\s|[:=,\-]|\b(?:was|were|is|for|in|of|and)\b)*";

static DUAL_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    let number = crate::utils::NUMBER_PATTERN;
    let pattern = format!(
        r"(?i)(?P<label>[a-z][a-z &/'().\-]*?){sep}(?:\bfy\s*|\b)(?P<first_year>\d{{4}})\b{sep}(?P<first>{number}){sep}(?:\bfy\s*|\b)(?P<second_year>\d{{4}})\b{sep}(?P<second>{number})",
        sep = SEPARATOR,
        number = number,
    );
    Regex::new(&pattern).unwrap()
});

static KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    let mut synonyms: Vec<&str> = KEYWORD_SYNONYMS.iter().map(|(s, _)| *s).collect();
    // Longest first so "cost of sales" wins over "sales" at the same position.
    synonyms.sort_by_key(|s| std::cmp::Reverse(s.len()));
    let alternation = synonyms
        .iter()
        .map(|s| regex::escape(s).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).unwrap()
});

/// Maps a keyword or label to its canonical name, ignoring case and spacing.
pub fn canonical_keyword(text: &str) -> Option<&'static str> {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    KEYWORD_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == normalized)
        .map(|(_, canonical)| *canonical)
}

pub struct LineItemExtractor {
    config: ExtractionConfig,
}

impl Default for LineItemExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

impl LineItemExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Never fails: unrecognisable input yields an empty set.
    pub fn extract(&self, text: &str) -> LineItemSet {
        let dual = self.extract_dual_year(text);
        if !dual.is_empty() {
            debug!("Dual-year extraction found {} values", dual.len());
            return dual;
        }

        let keyword = self.extract_keywords(text);
        if !keyword.is_empty() && keyword.len() >= self.config.min_structured_matches {
            debug!("Keyword extraction found {} values", keyword.len());
            return keyword;
        }

        if let Some(positional) = self.extract_positional(text) {
            debug!("Falling back to positional extraction (low confidence)");
            return positional;
        }

        if keyword.is_empty() {
            debug!("No recognizable financial data in input");
            LineItemSet::default()
        } else {
            keyword
        }
    }

    pub fn extract_dual_year(&self, text: &str) -> LineItemSet {
        let mut set = LineItemSet::new(ExtractionMethod::DualYear);

        for segment in text.split(['\n', '\r', ';']) {
            for caps in DUAL_YEAR.captures_iter(segment) {
                let Some((label, prior, current)) = self.dual_year_values(&caps) else {
                    continue;
                };

                let name = canonical_keyword(&label)
                    .map(str::to_string)
                    .unwrap_or_else(|| label.clone());

                let prior_inserted = set.insert(
                    LineItem::new(name.clone(), prior, Some(Period::Prior)).with_label(&label),
                );
                let current_inserted = set.insert(
                    LineItem::new(name.clone(), current, Some(Period::Current)).with_label(&label),
                );
                if !prior_inserted || !current_inserted {
                    debug!("Ignoring repeated dual-year values for '{}'", name);
                }
            }
        }

        set
    }

    fn dual_year_values(&self, caps: &Captures<'_>) -> Option<(String, f64, f64)> {
        let label = clean_label(caps.name("label")?.as_str());
        if label.is_empty() {
            return None;
        }

        let first_year: u16 = caps.name("first_year")?.as_str().parse().ok()?;
        let second_year: u16 = caps.name("second_year")?.as_str().parse().ok()?;
        let first = parse_numeric_token(caps.name("first")?.as_str())?;
        let second = parse_numeric_token(caps.name("second")?.as_str())?;

        let (prior_year, current_year) = (self.config.prior_year, self.config.current_year);
        if first_year == prior_year && second_year == current_year {
            Some((label, first, second))
        } else if first_year == current_year && second_year == prior_year {
            Some((label, second, first))
        } else {
            debug!(
                "Skipping '{}': years {}/{} do not match {}/{}",
                label, first_year, second_year, prior_year, current_year
            );
            None
        }
    }

    pub fn extract_keywords(&self, text: &str) -> LineItemSet {
        let mut set = LineItemSet::new(ExtractionMethod::Keyword);

        for keyword in KEYWORDS.find_iter(text) {
            let Some(canonical) = canonical_keyword(keyword.as_str()) else {
                continue;
            };
            if set.contains(canonical) {
                continue;
            }

            let after = &text[keyword.end()..];
            if let Some(value) = first_numeric_within(after, self.config.keyword_window) {
                set.insert(LineItem::new(canonical, value, None));
            }
        }

        set
    }

    /// `None` when fewer numbers than template slots are present.
    pub fn extract_positional(&self, text: &str) -> Option<LineItemSet> {
        let values = numeric_tokens(text);
        if values.len() < POSITIONAL_TEMPLATE.len() {
            return None;
        }

        let mut set = LineItemSet::new(ExtractionMethod::Positional);
        for (name, value) in POSITIONAL_TEMPLATE.iter().zip(values) {
            set.insert(LineItem::new(*name, value, None));
        }
        Some(set)
    }
}
