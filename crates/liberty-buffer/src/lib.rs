//! # Liberty Buffer
//!
//! Rope-backed document text for the LSP annotation bridge.
//!
//! Language servers describe locations as `(line, UTF-16 column)` pairs; the
//! editor side works in character offsets. This crate holds the text and does
//! the translation, including the "token at offset" lookup used when a
//! diagnostic arrives with an empty range.

mod buffer;
mod position;

pub use buffer::TextBuffer;
pub use position::Position;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Position {line}:{column} is out of bounds")]
    PositionOutOfBounds { line: usize, column: usize },

    #[error("Invalid character index: {0}")]
    InvalidCharIndex(usize),

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_buffer_from_string() {
        let buffer = TextBuffer::from("Hello, World!");
        assert_eq!(buffer.len_chars(), 13);
        assert_eq!(buffer.text(), "Hello, World!");
    }

    #[test]
    fn test_line_operations() {
        let buffer = TextBuffer::from("Line 1\nLine 2\nLine 3");
        assert_eq!(buffer.len_lines(), 3);
        assert_eq!(buffer.line(0).unwrap(), "Line 1\n");
        assert_eq!(buffer.line(2).unwrap(), "Line 3");
        assert_eq!(buffer.line_content_len(0).unwrap(), 6);
        assert!(buffer.line(3).is_err());
    }

    proptest! {
        #[test]
        fn prop_token_contains_offset(text in "[a-z ]{1,40}\n?[a-z ]{0,20}", seed in 0usize..64) {
            let buffer = TextBuffer::from(text.as_str());
            let idx = seed % buffer.len_chars();
            let token = buffer.token_at(idx).unwrap();
            // Offsets on a line break bind to the token ending there
            prop_assert!(token.start < token.end);
            prop_assert!(token.start <= idx && idx <= token.end);
        }

        #[test]
        fn prop_utf16_roundtrip_on_ascii(text in "[ -~]{0,30}(\n[ -~]{0,30}){0,3}", seed in 0usize..128) {
            let buffer = TextBuffer::from(text.as_str());
            let idx = seed % (buffer.len_chars() + 1);
            let (line, column) = buffer.char_idx_to_utf16_position(idx).unwrap();
            let back = buffer.utf16_position_to_char_idx(line, column);
            // A line-break offset clamps back to the end of the line content
            prop_assert!(back <= idx && idx - back <= 1);
        }
    }
}
