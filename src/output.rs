use crate::utils::floor_char_boundary;
use crate::TRUNCATION_MARKER;

/// Bounds text returned to the caller to `max_bytes` plus the truncation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCapper {
    max_bytes: usize,
}

impl OutputCapper {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Bytes worth reading from a child to decide whether to truncate.
    ///
    /// One extra UTF-8 sequence keeps a multi-byte character at the cut intact.
    pub fn capture_limit(&self) -> usize {
        self.max_bytes.saturating_add(4)
    }

    pub fn cap(&self, mut text: String) -> String {
        if text.len() <= self.max_bytes {
            return text;
        }
        text.truncate(floor_char_boundary(&text, self.max_bytes));
        text.push_str(TRUNCATION_MARKER);
        text
    }
}

/// Decodes captured child output, replacing invalid UTF-8.
pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
