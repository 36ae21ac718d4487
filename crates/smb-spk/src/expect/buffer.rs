//! Text buffer for accumulated remote output.
//!
//! Bytes arrive in arbitrary chunks; a multi-byte UTF-8 sequence may be
//! split across two reads. The buffer keeps the incomplete tail aside
//! until the rest arrives, so patterns always see whole characters.

/// Default buffer capacity (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Accumulates decoded text and discards the oldest text when full.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    text: String,
    /// Undecoded bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    max_size: usize,
    total_received: usize,
    bytes_discarded: usize,
}

impl TextBuffer {
    /// Create a new buffer with the specified maximum size in bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            max_size: max_size.max(1),
            total_received: 0,
            bytes_discarded: 0,
        }
    }

    /// Append raw bytes, decoding them as UTF-8.
    ///
    /// Invalid sequences become U+FFFD.
    pub fn append(&mut self, data: &[u8]) {
        self.total_received += data.len();
        self.pending.extend_from_slice(data);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.text.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    if let Some(bad) = e.error_len() {
                        self.text.push(char::REPLACEMENT_CHARACTER);
                        self.pending.drain(..valid + bad);
                    } else {
                        self.pending.drain(..valid);
                        break;
                    }
                }
            }
        }

        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        if self.text.len() <= self.max_size {
            return;
        }
        let mut cut = self.text.len() - self.max_size;
        while !self.text.is_char_boundary(cut) {
            cut += 1;
        }
        self.text.drain(..cut);
        self.bytes_discarded += cut;
    }

    /// Get the decoded text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Get the current length of the decoded text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Total bytes appended since creation.
    #[must_use]
    pub const fn total_received(&self) -> usize {
        self.total_received
    }

    /// Bytes of text dropped because the buffer was full.
    #[must_use]
    pub const fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    /// Remove and return the text up to byte offset `end`.
    pub fn consume(&mut self, end: usize) -> String {
        let end = end.min(self.text.len());
        self.text.drain(..end).collect()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
