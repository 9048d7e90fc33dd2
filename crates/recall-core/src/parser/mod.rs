//! Document text extraction, selected by file extension.

mod markdown;
mod text;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

pub use markdown::MarkdownParser;
pub use text::PlainTextParser;

use crate::{Error, Result};

/// Extracts plain text from one family of file formats.
pub trait DocumentParser: Send + Sync {
    /// Reads `reader` to the end and returns its text content.
    fn parse(&self, file_name: &str, reader: &mut dyn Read) -> Result<String>;

    /// Lower-cased extensions, without the dot, this parser handles.
    fn extensions(&self) -> &[&'static str];
}

/// Parsers keyed by lower-cased file extension.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in plain-text and Markdown parsers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextParser));
        registry.register(Arc::new(MarkdownParser));
        registry
    }

    /// Registers a parser for all of its extensions, replacing earlier ones.
    pub fn register(&mut self, parser: Arc<dyn DocumentParser>) {
        for ext in parser.extensions() {
            self.parsers.insert(ext.to_ascii_lowercase(), parser.clone());
        }
    }

    /// Returns the parser for a file name, if its extension is registered.
    pub fn parser_for(&self, file_name: &str) -> Option<&Arc<dyn DocumentParser>> {
        self.parsers.get(&extension_of(file_name))
    }

    /// Parses `reader` with the parser registered for `file_name`.
    pub fn parse(&self, file_name: &str, reader: &mut dyn Read) -> Result<String> {
        let parser = self.parser_for(file_name).ok_or_else(|| {
            Error::parser(format!(
                "no parser found for extension: {}",
                extension_of(file_name)
            ))
        })?;
        parser.parse(file_name, reader)
    }

    /// Opens and parses a file from disk.
    pub fn parse_path(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::parser(format!("invalid file name: {}", path.display())))?;
        let file = File::open(path)
            .map_err(|e| Error::parser(format!("failed to open {}: {e}", path.display())))?;
        self.parse(file_name, &mut BufReader::new(file))
    }

    /// Returns the registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Reads the whole stream as UTF-8.
pub(crate) fn read_utf8(file_name: &str, reader: &mut dyn Read) -> Result<String> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::parser(format!("failed to read {file_name}: {e}")))?;
    String::from_utf8(bytes).map_err(|_| Error::parser(format!("{file_name} is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_selects_parser_by_extension() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(registry.extensions(), vec!["markdown", "md", "text", "txt"]);

        let text = registry
            .parse("NOTES.TXT", &mut "plain words".as_bytes())
            .unwrap();
        assert_eq!(text, "plain words");
    }

    #[test]
    fn test_unknown_extension() {
        let registry = ParserRegistry::with_defaults();
        let err = registry.parse("scan.pdf", &mut "".as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parser error: no parser found for extension: pdf"
        );
    }

    #[test]
    fn test_parse_path() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        writeln!(file, "# Title\n\nBody text.").unwrap();

        let registry = ParserRegistry::with_defaults();
        let text = registry.parse_path(file.path()).unwrap();
        assert_eq!(text, "Title\n\nBody text.");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let registry = ParserRegistry::with_defaults();
        let bytes: &[u8] = &[0xff, 0xfe, 0xfd];
        assert!(registry.parse("a.txt", &mut &bytes[..]).is_err());
    }
}
