//! Declarative price extraction from fetched HTML
//!
//! Each adapter carries an ordered list of (pattern, capture group) pairs.
//! Patterns are tried in order against the page body; the first capture that
//! parses to a plausible positive price wins. Adding support for a new page
//! layout is a data change to the pattern list, not new code.

use regex::Regex;

/// One extraction rule: a regex and the capture group holding the raw price.
#[derive(Debug, Clone, Copy)]
pub struct PricePattern {
    pub pattern: &'static str,
    pub group: usize,
}

/// A compiled, ordered extraction rule set.
pub struct PatternSet {
    compiled: Vec<(Regex, usize)>,
}

impl PatternSet {
    /// Compile a pattern list. Panics on an invalid pattern, which is a
    /// programming error in a static list, not a runtime condition.
    pub fn new(patterns: &[PricePattern]) -> Self {
        let compiled = patterns
            .iter()
            .map(|p| {
                let re = Regex::new(p.pattern)
                    .unwrap_or_else(|e| panic!("invalid price pattern {:?}: {}", p.pattern, e));
                (re, p.group)
            })
            .collect();

        Self { compiled }
    }

    /// Apply the rules in order; first plausible price wins.
    /// `max_price` rejects implausible captures (the generic adapter caps at
    /// 1,000,000; marketplace-specific adapters pass `None`).
    pub fn extract(&self, html: &str, max_price: Option<f64>) -> Option<f64> {
        for (re, group) in &self.compiled {
            for caps in re.captures_iter(html) {
                let Some(m) = caps.get(*group) else { continue };
                let Some(price) = parse_price(m.as_str()) else { continue };

                if let Some(cap) = max_price {
                    if price >= cap {
                        continue;
                    }
                }
                return Some(price);
            }
        }
        None
    }
}

/// Parse a raw matched price string: strip everything except digits and the
/// decimal point, then require a finite, strictly positive value.
pub fn parse_price(raw: &str) -> Option<f64> {
    if raw.trim_start().starts_with('-') {
        return None;
    }
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    let price: f64 = cleaned.parse().ok()?;
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    Some(price)
}

/// Layout-agnostic patterns that work across most storefronts. Ordered from
/// most structured (machine-readable metadata) to loosest (any dollar amount).
pub const COMMON_PRICE_PATTERNS: &[PricePattern] = &[
    // Schema.org / Open Graph metadata
    PricePattern {
        pattern: r#"itemprop="price"[^>]*content="([^"]+)""#,
        group: 1,
    },
    PricePattern {
        pattern: r#"property="og:price:amount"[^>]*content="([^"]+)""#,
        group: 1,
    },
    // Embedded JSON state ("price": "12.34" or "price": 12.34)
    PricePattern {
        pattern: r#""price"\s*:\s*"?\$?([0-9][0-9,]*\.?[0-9]{0,2})"#,
        group: 1,
    },
    // Visible price markup
    PricePattern {
        pattern: r#"class="[^"]*price[^"]*"[^>]*>\s*\$([0-9][0-9,]*\.?[0-9]{0,2})"#,
        group: 1,
    },
    // Any dollar amount, last resort
    PricePattern {
        pattern: r#"\$([0-9][0-9,]*\.[0-9]{2})"#,
        group: 1,
    },
];
