//! Domain term extraction and tokenization.

/// Finance terms the index tracks for boosting and trend aggregation.
pub const FINANCIAL_TERMS: &[&str] = &[
    "investment",
    "portfolio",
    "dividend",
    "compound",
    "interest",
    "retirement",
    "savings",
    "budget",
    "debt",
    "credit",
    "mortgage",
    "insurance",
    "tax",
    "income",
    "expense",
    "profit",
    "loss",
    "equity",
    "bond",
    "stock",
    "fund",
    "etf",
    "cryptocurrency",
    "bitcoin",
    "inflation",
    "deflation",
    "recession",
    "bull market",
    "bear market",
];

/// Domain terms mentioned anywhere in `text`, in table order.
pub fn extract_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    FINANCIAL_TERMS
        .iter()
        .filter(|term| lower.contains(*term))
        .map(|term| term.to_string())
        .collect()
}

pub fn is_domain_term(term: &str) -> bool {
    FINANCIAL_TERMS.contains(&term)
}

/// Lower-cased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
