use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// Candidates at or below this value are discarded as noise (page counters,
/// ratings, fractions of a cent).
pub const MIN_PRICE: f64 = 0.1;
/// Candidates at or above this value are discarded as implausible for a
/// single catalog item.
pub const MAX_PRICE: f64 = 1_000_000.0;

static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:R\$|US\$|\$|€|£)\s*([0-9][0-9.,]*)").unwrap());
static UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([0-9][0-9.,]*)\s*(?:reais|dollars|euros)\b").unwrap());
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:price|pre[çc]o|valor|value)\s*:?\s*(?:R\$|US\$|\$|€|£)?\s*([0-9][0-9.,]*)")
        .unwrap()
});
static NUMERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9][0-9.,]*").unwrap());

// Elements that commonly carry a price, by class convention or schema.org
// markup. The content attribute covers <meta itemprop="price" content="…">.
static PRICE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#".price, .product-price, .valor, .preco, [itemprop="price"]"#).unwrap()
});

/// Pull every plausible price candidate out of one fetched document.
///
/// Runs the textual pattern rules over the page's visible text, then scans
/// known price-bearing elements. Never fails: malformed markup, malformed
/// numerals and out-of-bounds values are silently dropped, and a page with
/// no prices yields an empty vec.
pub fn extract_prices(document: &str) -> Vec<f64> {
    let doc = Html::parse_document(document);
    let text: String = doc.root_element().text().collect::<Vec<_>>().join(" ");

    let mut prices = Vec::new();
    for re in [&*SYMBOL_RE, &*UNIT_RE, &*LABEL_RE] {
        for caps in re.captures_iter(&text) {
            push_candidate(&caps[1], &mut prices);
        }
    }

    for element in doc.select(&PRICE_SEL) {
        let element_text: String = element.text().collect();
        let numeral = NUMERAL_RE
            .find(element_text.trim())
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                element
                    .value()
                    .attr("content")
                    .and_then(|c| NUMERAL_RE.find(c))
                    .map(|m| m.as_str().to_string())
            });
        if let Some(numeral) = numeral {
            push_candidate(&numeral, &mut prices);
        }
    }

    prices
}

fn push_candidate(numeral: &str, prices: &mut Vec<f64>) {
    if let Some(price) = normalize_money(numeral) {
        if price > MIN_PRICE && price < MAX_PRICE {
            prices.push(price);
        }
    }
}

/// Turn a matched numeral into a canonical decimal, resolving grouping vs
/// decimal separators: when both appear the later one is the decimal mark;
/// a lone separator followed by exactly three digits is read as grouping.
fn normalize_money(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches(['.', ',']);
    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let canonical = if dots > 0 && commas > 0 {
        let last_dot = cleaned.rfind('.').unwrap_or(0);
        let last_comma = cleaned.rfind(',').unwrap_or(0);
        if last_dot > last_comma {
            cleaned.replace(',', "")
        } else {
            cleaned.replace('.', "").replace(',', ".")
        }
    } else if commas > 1 {
        cleaned.replace(',', "")
    } else if dots > 1 {
        cleaned.replace('.', "")
    } else if commas == 1 {
        let fraction = &cleaned[cleaned.rfind(',').unwrap_or(0) + 1..];
        if fraction.len() == 3 {
            cleaned.replace(',', "")
        } else {
            cleaned.replace(',', ".")
        }
    } else if dots == 1 {
        let fraction = &cleaned[cleaned.rfind('.').unwrap_or(0) + 1..];
        if fraction.len() == 3 {
            cleaned.replace('.', "")
        } else {
            cleaned.to_string()
        }
    } else {
        cleaned.to_string()
    };

    canonical.parse::<f64>().ok()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_prefixed() {
        assert_eq!(extract_prices("à vista por R$ 1.234,56 no boleto"), vec![1234.56]);
        assert_eq!(extract_prices("now only $12.50 while stocks last"), vec![12.5]);
        assert_eq!(extract_prices("ab € 49,90 versandkostenfrei"), vec![49.9]);
    }

    #[test]
    fn unit_suffixed() {
        assert_eq!(extract_prices("por apenas 99,90 reais hoje"), vec![99.9]);
    }

    #[test]
    fn labelled() {
        assert_eq!(extract_prices("Price: 42.00 each"), vec![42.0]);
        assert_eq!(extract_prices("valor 15,90 somente"), vec![15.9]);
    }

    #[test]
    fn independent_rules_may_duplicate() {
        // Symbol rule and label rule both fire; the aggregator sees a multiset.
        assert_eq!(extract_prices("price: $10.00"), vec![10.0, 10.0]);
    }

    #[test]
    fn sanity_bounds_are_strict() {
        let prices = extract_prices("R$ 0,05 or R$ 0,10 or $2000000 or R$ 999999,99");
        assert_eq!(prices, vec![999999.99]);
        for p in extract_prices("$0.1 $1000000 $0.11") {
            assert!(p > 0.1 && p < 1_000_000.0);
        }
    }

    #[test]
    fn malformed_numerals_are_dropped() {
        assert!(extract_prices("R$ 1.2,3.4").is_empty());
    }

    #[test]
    fn trailing_separator_is_trimmed() {
        assert_eq!(extract_prices("custa R$ 10."), vec![10.0]);
    }

    #[test]
    fn selector_class_scan() {
        let html = r#"<html><body><span class="preco">15,90</span></body></html>"#;
        assert_eq!(extract_prices(html), vec![15.9]);
    }

    #[test]
    fn selector_itemprop_content_attribute() {
        let html = r#"<div><meta itemprop="price" content="29.99"></div>"#;
        assert_eq!(extract_prices(html), vec![29.99]);
    }

    #[test]
    fn selector_nested_markup() {
        let html = r#"<div class="product-price"><b>7</b>,<i>50</i></div>"#;
        assert_eq!(extract_prices(html), vec![7.5]);
    }

    #[test]
    fn plain_text_document() {
        assert_eq!(extract_prices("price: 19.90"), vec![19.9]);
    }

    #[test]
    fn empty_or_garbage_never_panics() {
        assert!(extract_prices("").is_empty());
        assert!(extract_prices("<<><div class=>\u{0}\u{1}garbage").is_empty());
    }

    #[test]
    fn separator_normalization() {
        assert_eq!(normalize_money("1.234,56"), Some(1234.56));
        assert_eq!(normalize_money("1,234.56"), Some(1234.56));
        assert_eq!(normalize_money("12,50"), Some(12.5));
        assert_eq!(normalize_money("12.50"), Some(12.5));
        assert_eq!(normalize_money("1.234"), Some(1234.0));
        assert_eq!(normalize_money("1,234"), Some(1234.0));
        assert_eq!(normalize_money("1.234.567"), Some(1234567.0));
        assert_eq!(normalize_money("10."), Some(10.0));
        assert_eq!(normalize_money("0,09"), Some(0.09));
        assert_eq!(normalize_money("1.2,3.4"), None);
    }
}
