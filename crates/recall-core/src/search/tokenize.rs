use crate::chunker::is_cjk;

/// Splits text into lower-cased search tokens.
///
/// Tokens are maximal runs of letters and digits; every CJK character is a
/// token of its own. Everything else separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            flush(&mut current, &mut tokens);
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else {
            flush(&mut current, &mut tokens);
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_ascii() {
        assert_eq!(
            tokenize("Hello, World! v2 rocks."),
            vec!["hello", "world", "v2", "rocks"]
        );
    }

    #[test]
    fn test_tokenize_cjk_characters_individually() {
        assert_eq!(tokenize("向量search检索"), vec!["向", "量", "search", "检", "索"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ,.;  ").is_empty());
    }
}
