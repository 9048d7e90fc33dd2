use std::io::Read;

use super::{DocumentParser, read_utf8};
use crate::Result;

/// Passes UTF-8 text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, file_name: &str, reader: &mut dyn Read) -> Result<String> {
        read_utf8(file_name, reader)
    }

    fn extensions(&self) -> &[&'static str] {
        &["txt", "text"]
    }
}
