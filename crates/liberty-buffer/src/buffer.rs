//! Document text backed by a rope.
//!
//! Language servers address text as `(line, UTF-16 column)` while the editor
//! side works with character offsets. `TextBuffer` owns the conversion in both
//! directions and answers "which token is at this offset" for markers whose
//! diagnostic range is empty.
//!
//! Cloning a `TextBuffer` is cheap: the rope shares its chunks, so background
//! tasks can take a snapshot without holding any lock on the live document.

use ropey::Rope;
use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

use crate::{BufferError, BufferResult, Position};

/// Text content of one document.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    /// The rope holding our text content
    rope: Rope,

    /// Bumped on every mutation
    version: u64,
}

impl TextBuffer {
    /// Creates a new empty buffer.
    ///
    /// # Example
    /// ```
    /// use liberty_buffer::TextBuffer;
    ///
    /// let buffer = TextBuffer::new();
    /// assert!(buffer.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a buffer from a file.
    pub fn from_file(path: impl AsRef<Path>) -> BufferResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from(content.as_str()))
    }

    // ==================== Text Access ====================

    /// Returns the entire text content.
    #[inline]
    pub fn text(&self) -> Cow<'_, str> {
        self.rope.slice(..).into()
    }

    /// Returns a specific line (0-indexed), including its line break.
    pub fn line(&self, line_idx: usize) -> BufferResult<Cow<'_, str>> {
        if line_idx >= self.len_lines() {
            return Err(BufferError::PositionOutOfBounds {
                line: line_idx,
                column: 0,
            });
        }
        Ok(self.rope.line(line_idx).into())
    }

    /// Returns a slice of text by character range.
    pub fn slice(&self, range: Range<usize>) -> BufferResult<Cow<'_, str>> {
        if range.start > range.end {
            return Err(BufferError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.end > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(range.end));
        }
        Ok(self.rope.slice(range).into())
    }

    // ==================== Measurements ====================

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Returns the number of characters in the buffer.
    #[inline]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Returns the number of lines in the buffer.
    ///
    /// An empty buffer has 1 line. A buffer ending with `\n` counts
    /// the empty line after it.
    #[inline]
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Length of a line in characters, line break excluded.
    pub fn line_content_len(&self, line_idx: usize) -> BufferResult<usize> {
        let line = self.line(line_idx)?;
        let trimmed = line.trim_end_matches(['\n', '\r']);
        Ok(trimmed.chars().count())
    }

    /// Monotonic edit counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    // ==================== Mutations ====================

    /// Inserts text at a character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) -> BufferResult<()> {
        if char_idx > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(char_idx));
        }
        self.rope.insert(char_idx, text);
        self.version += 1;
        Ok(())
    }

    /// Deletes text in a character range and returns it.
    pub fn delete(&mut self, range: Range<usize>) -> BufferResult<String> {
        let deleted = self.slice(range.clone())?.into_owned();
        self.rope.remove(range);
        self.version += 1;
        Ok(deleted)
    }

    /// Replaces text in a range with new text.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> BufferResult<String> {
        let deleted = self.delete(range.clone())?;
        self.insert(range.start, text)?;
        Ok(deleted)
    }

    // ==================== Position Conversion ====================

    /// Converts a character index to a Position (line, column).
    pub fn char_idx_to_position(&self, char_idx: usize) -> BufferResult<Position> {
        if char_idx > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(char_idx));
        }

        let line = self.rope.char_to_line(char_idx);
        let column = char_idx - self.rope.line_to_char(line);
        Ok(Position { line, column })
    }

    /// Maps an LSP `(line, UTF-16 column)` pair to a character index.
    ///
    /// Servers routinely report positions past the end of a line or of the
    /// document (stale diagnostics, trailing newlines), so the result is
    /// clamped instead of rejected: a line past the end maps to the end of
    /// the text and a column past the line content maps to the line end.
    pub fn utf16_position_to_char_idx(&self, line: usize, utf16_column: usize) -> usize {
        if line >= self.len_lines() {
            return self.len_chars();
        }

        let line_start = self.rope.line_to_char(line);
        let slice = self.rope.line(line);
        let content_len = self.line_content_len(line).unwrap_or(0);
        let content_utf16 = slice.char_to_utf16_cu(content_len);

        let column = slice.utf16_cu_to_char(utf16_column.min(content_utf16));
        line_start + column.min(content_len)
    }

    /// Maps a character index to an LSP `(line, UTF-16 column)` pair.
    pub fn char_idx_to_utf16_position(&self, char_idx: usize) -> BufferResult<(usize, usize)> {
        let pos = self.char_idx_to_position(char_idx)?;
        let slice = self.rope.line(pos.line);
        Ok((pos.line, slice.char_to_utf16_cu(pos.column)))
    }

    // ==================== Tokens ====================

    /// Returns the character range of the token containing `char_idx`.
    ///
    /// Tokens follow Unicode word boundaries within the line, so identifiers,
    /// punctuation and whitespace runs are each one token. An offset sitting
    /// exactly at the end of a line binds to the token that ends there. Only
    /// an empty line yields an empty range.
    pub fn token_at(&self, char_idx: usize) -> BufferResult<Range<usize>> {
        if char_idx > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(char_idx));
        }

        let line_idx = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line_idx);
        let column = char_idx - line_start;
        let line: String = self.rope.line(line_idx).into();
        let content = line.trim_end_matches(['\n', '\r']);

        let mut start = 0;
        let mut ending_here = None;
        for segment in content.split_word_bounds() {
            let end = start + segment.chars().count();
            if (start..end).contains(&column) {
                return Ok(line_start + start..line_start + end);
            }
            if end == column {
                ending_here = Some(start..end);
            }
            start = end;
        }

        Ok(ending_here
            .map(|r| line_start + r.start..line_start + r.end)
            .unwrap_or(char_idx..char_idx))
    }
}

impl From<&str> for TextBuffer {
    fn from(s: &str) -> Self {
        Self {
            rope: Rope::from_str(s),
            version: 0,
        }
    }
}

impl From<String> for TextBuffer {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_conversion_handles_surrogate_pairs() {
        // '𝄞' is one char but two UTF-16 code units
        let buffer = TextBuffer::from("a𝄞b\nxyz");
        assert_eq!(buffer.utf16_position_to_char_idx(0, 0), 0);
        assert_eq!(buffer.utf16_position_to_char_idx(0, 1), 1);
        assert_eq!(buffer.utf16_position_to_char_idx(0, 3), 2);
        assert_eq!(buffer.utf16_position_to_char_idx(1, 2), 6);
        assert_eq!(buffer.char_idx_to_utf16_position(2).unwrap(), (0, 3));
    }

    #[test]
    fn test_utf16_conversion_clamps() {
        let buffer = TextBuffer::from("short\nline");
        // Column past the line content stops before the line break
        assert_eq!(buffer.utf16_position_to_char_idx(0, 99), 5);
        // Line past the end maps to the end of the document
        assert_eq!(buffer.utf16_position_to_char_idx(7, 0), buffer.len_chars());
    }

    #[test]
    fn test_token_at_identifier() {
        let buffer = TextBuffer::from("public class Greeting {}");
        assert_eq!(buffer.token_at(7).unwrap(), 7..12);
        assert_eq!(buffer.token_at(9).unwrap(), 7..12);
        assert_eq!(buffer.slice(13..21).unwrap(), "Greeting");
        assert_eq!(buffer.token_at(20).unwrap(), 13..21);
    }

    #[test]
    fn test_token_at_end_of_line() {
        let buffer = TextBuffer::from("int count\nnext");
        // Offset 9 is the line break
        assert_eq!(buffer.token_at(9).unwrap(), 4..9);
        let buffer = TextBuffer::from("int count");
        assert_eq!(buffer.token_at(9).unwrap(), 4..9);
        let buffer = TextBuffer::from("a\n\nb");
        assert_eq!(buffer.token_at(2).unwrap(), 2..2);
    }

    #[test]
    fn test_token_at_empty_buffer() {
        let buffer = TextBuffer::new();
        assert_eq!(buffer.token_at(0).unwrap(), 0..0);
        assert!(buffer.token_at(1).is_err());
    }

    #[test]
    fn test_mutations_bump_version() {
        let mut buffer = TextBuffer::from("Hello");
        assert_eq!(buffer.version(), 0);
        buffer.insert(5, " World").unwrap();
        buffer.replace(0..5, "Howdy").unwrap();
        assert_eq!(buffer.text(), "Howdy World");
        assert_eq!(buffer.version(), 3);
    }

    #[test]
    fn test_only_lsp_line_breaks_split_lines() {
        // Form feed is Java whitespace, not a line break
        let buffer = TextBuffer::from("a\u{000C}b\nclass X");
        assert_eq!(buffer.len_lines(), 2);
        assert_eq!(buffer.utf16_position_to_char_idx(1, 0), 4);
        assert_eq!(buffer.char_idx_to_position(4).unwrap(), Position::new(1, 0));

        let buffer = TextBuffer::from("x\u{2028}y\u{0085}z\r\nw\rv");
        assert_eq!(buffer.len_lines(), 3);
        assert_eq!(buffer.line_content_len(0).unwrap(), 5);
        assert_eq!(buffer.utf16_position_to_char_idx(2, 0), 9);
    }

    #[test]
    fn test_slice_rejects_inverted_range() {
        let buffer = TextBuffer::from("abc");
        #[allow(clippy::reversed_empty_ranges)]
        let result = buffer.slice(2..1);
        assert!(matches!(result, Err(BufferError::InvalidRange { .. })));
    }
}
