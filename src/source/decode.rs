use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::errors::PipelineError;

/// Decodes raw field bytes from the input character encoding into UTF-8 text.
#[derive(Clone, Copy, Debug)]
pub struct TextDecoder {
    encoding: &'static Encoding,
}

impl TextDecoder {
    /// Resolve a WHATWG encoding label (`latin1`, `utf-8`, `windows-1252`, ...).
    pub fn for_label(label: &str) -> Result<Self, PipelineError> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| PipelineError::Configuration(format!("unknown input encoding '{label}'")))
    }

    /// Name of the resolved encoding.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode one field. Borrowed when the bytes are already valid output.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        text
    }
}
