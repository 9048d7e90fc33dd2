//! Sentence boundary detection.

use std::ops::Range;

/// Sentence-terminating punctuation.
const TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Closing marks that stay attached to the sentence they end.
const CLOSERS: [char; 8] = ['"', '\'', ')', ']', '”', '’', '」', '』'];

#[inline]
fn is_terminator(c: char) -> bool {
    TERMINATORS.contains(&c)
}

#[inline]
fn is_closer(c: char) -> bool {
    CLOSERS.contains(&c)
}

/// Splits normalized text into sentence ranges over `chars`.
///
/// A `.` directly followed by a digit is a decimal point, not a boundary.
/// Returned ranges exclude surrounding whitespace and are never empty.
pub(crate) fn split_sentences(chars: &[char]) -> Vec<Range<usize>> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let decimal_point = c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());

        if is_terminator(c) && !decimal_point {
            let mut end = i + 1;
            while end < chars.len() && (is_terminator(chars[end]) || is_closer(chars[end])) {
                end += 1;
            }

            push_trimmed(&mut sentences, chars, start, end);
            start = end;
            i = end;
            continue;
        }

        i += 1;
    }

    push_trimmed(&mut sentences, chars, start, chars.len());
    sentences
}

fn push_trimmed(out: &mut Vec<Range<usize>>, chars: &[char], mut start: usize, mut end: usize) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start < end {
        out.push(start..end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        split_sentences(&chars)
            .into_iter()
            .map(|r| chars[r].iter().collect())
            .collect()
    }

    #[test]
    fn test_split_terminal_punctuation() {
        assert_eq!(
            sentences("First one. Second one! Third one? Tail"),
            vec!["First one.", "Second one!", "Third one?", "Tail"]
        );
    }

    #[test]
    fn test_decimal_point_is_not_a_boundary() {
        assert_eq!(
            sentences("Pi is about 3.14 today. Next."),
            vec!["Pi is about 3.14 today.", "Next."]
        );
    }

    #[test]
    fn test_cjk_full_stop() {
        assert_eq!(sentences("第一句。第二句。"), vec!["第一句。", "第二句。"]);
    }

    #[test]
    fn test_closing_quote_and_ellipsis_stay_attached() {
        assert_eq!(
            sentences("He said \"stop.\" Then... silence."),
            vec!["He said \"stop.\"", "Then...", "silence."]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(sentences("").is_empty());
        assert!(sentences("   ").is_empty());
    }
}
