use std::io::Read;

use super::{DocumentParser, read_utf8};
use crate::Result;

/// Strips Markdown syntax, keeping the readable text.
///
/// Heading markers, blockquote and list markers, emphasis, inline code ticks
/// and code fences are removed; links and images keep their label. Lines
/// inside fenced code blocks are kept verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn parse(&self, file_name: &str, reader: &mut dyn Read) -> Result<String> {
        let source = read_utf8(file_name, reader)?;
        Ok(strip_markdown(&source))
    }

    fn extensions(&self) -> &[&'static str] {
        &["md", "markdown"]
    }
}

fn strip_markdown(source: &str) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(line.to_owned());
            continue;
        }
        lines.push(strip_inline(strip_block_marker(trimmed)));
    }

    lines.join("\n").trim().to_owned()
}

fn strip_block_marker(line: &str) -> &str {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        return line[hashes..].trim_start();
    }

    for marker in ["> ", "- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest;
        }
    }
    line
}

fn strip_inline(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' | '`' => i += 1,
            '_' if chars.get(i + 1) == Some(&'_') => i += 2,
            '!' if chars.get(i + 1) == Some(&'[') => i += 1,
            '[' => match link_end(&chars, i) {
                Some((label_end, end)) => {
                    out.extend(&chars[i + 1..label_end]);
                    i = end;
                }
                None => {
                    out.push('[');
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// For `[label](target)` starting at `start`, returns the index of `]` and
/// the index just past `)`.
fn link_end(chars: &[char], start: usize) -> Option<(usize, usize)> {
    let label_end = start + chars[start..].iter().position(|&c| c == ']')?;
    if chars.get(label_end + 1) != Some(&'(') {
        return None;
    }
    let close = label_end + 1 + chars[label_end + 1..].iter().position(|&c| c == ')')?;
    Some((label_end, close + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_headings_and_emphasis() {
        let md = "## Setup\n\nRun **cargo** with `--release` and __care__.";
        assert_eq!(strip_markdown(md), "Setup\n\nRun cargo with --release and care.");
    }

    #[test]
    fn test_links_keep_label() {
        assert_eq!(
            strip_markdown("See [the docs](https://docs.rs) and ![logo](a.png)."),
            "See the docs and logo."
        );
        assert_eq!(strip_markdown("array[0] stays"), "array[0] stays");
    }

    #[test]
    fn test_code_fences_removed_content_kept() {
        let md = "Intro\n```rust\nlet x_y = *ptr;\n```\n- item";
        assert_eq!(strip_markdown(md), "Intro\nlet x_y = *ptr;\nitem");
    }

    #[test]
    fn test_hash_without_space_is_text() {
        assert_eq!(strip_markdown("#hashtag"), "#hashtag");
    }
}
