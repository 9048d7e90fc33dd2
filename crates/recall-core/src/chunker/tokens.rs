//! Token-count estimation.

/// Returns whether `c` is a CJK ideograph, kana or hangul syllable.
pub fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2A6DF}'
    )
}

/// Estimates the number of model tokens in `text`.
///
/// Western words are counted by whitespace split. CJK characters are counted
/// individually and divided by 1.5, rounding up.
pub fn estimate_tokens(text: &str) -> usize {
    let mut words = 0usize;
    let mut cjk = 0usize;
    let mut in_word = false;

    for c in text.chars() {
        if is_cjk(c) {
            cjk += 1;
            in_word = false;
        } else if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            words += 1;
            in_word = true;
        }
    }

    words + (cjk as f64 / 1.5).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_western_words() {
        assert_eq!(estimate_tokens("The quick brown fox."), 4);
        assert_eq!(estimate_tokens("   "), 0);
    }

    #[test]
    fn test_cjk_characters() {
        // six ideographs -> 6 / 1.5 = 4
        assert_eq!(estimate_tokens("机器学习模型"), 4);
        // mixed: one western word plus three ideographs -> 1 + 2
        assert_eq!(estimate_tokens("RAG 检索器"), 3);
    }

    #[test]
    fn test_is_cjk() {
        assert!(is_cjk('中'));
        assert!(is_cjk('カ'));
        assert!(is_cjk('한'));
        assert!(!is_cjk('a'));
        assert!(!is_cjk('。'));
    }
}
