//! Token estimation utilities.
//!
//! Uses a script-aware character heuristic: every CJK ideograph (and any
//! other non-ASCII code point) costs ~2 tokens, ASCII text costs ~1 token
//! per 4 characters. The counts are deterministic but do not match any
//! particular tokenizer exactly.

/// Estimate the token count for a string.
///
/// Returns 0 only for empty input; any non-empty string costs at least 1.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut wide = 0usize;
    let mut ascii = 0usize;
    for ch in text.chars() {
        if is_cjk_ideograph(ch) || !ch.is_ascii() {
            wide += 1;
        } else {
            ascii += 1;
        }
    }

    let tokens = wide * 2 + ascii / 4;
    tokens.max(1)
}

/// Truncate `text` so it approximately fits in `max_tokens`.
///
/// Budgets 1.5 tokens per character (a mixed-script average). Text that
/// already fits is returned unchanged; otherwise the cut text ends with `...`.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if max_tokens == 0 {
        return String::new();
    }

    let char_budget = (max_tokens as f64 / 1.5) as usize;
    if char_budget >= text.chars().count() {
        return text.to_string();
    }

    if char_budget > 3 {
        let mut out: String = text.chars().take(char_budget - 3).collect();
        out.push_str("...");
        out
    } else {
        text.chars().take(char_budget).collect()
    }
}

fn is_cjk_ideograph(ch: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&ch)
}
