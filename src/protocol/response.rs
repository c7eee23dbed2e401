//! Line protocol response builder
//!
//! Every reply ends with `\r\n`. Integers are prefixed with `:`, a missing
//! value is `(nil)` and failures are `ERROR: <message>`.

use bytes::BytesMut;
use itoa::Buffer;

/// Reply for a missing value
pub const NIL: &str = "(nil)";

/// Response writer for the line protocol
pub struct ResponseWriter {
    buf: BytesMut,
}

impl ResponseWriter {
    /// Create a new response writer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the internal buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Take the buffer, leaving an empty buffer in its place
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn line(&mut self, text: &[u8]) {
        self.buf.extend_from_slice(text);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Write OK
    pub fn ok(&mut self) {
        self.line(b"OK");
    }

    /// Write a stored value
    pub fn value(&mut self, value: &str) {
        self.line(value.as_bytes());
    }

    /// Write the missing-value sentinel
    pub fn nil(&mut self) {
        self.line(NIL.as_bytes());
    }

    /// Write an integer reply
    /// Format: :<n>\r\n
    pub fn integer(&mut self, n: i64) {
        let mut itoa_buf = Buffer::new();
        self.buf.extend_from_slice(b":");
        self.line(itoa_buf.format(n).as_bytes());
    }

    /// Write one `key:value` line of an INFO reply
    pub fn pair(&mut self, key: &str, value: impl itoa::Integer) {
        let mut itoa_buf = Buffer::new();
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.extend_from_slice(b":");
        self.line(itoa_buf.format(value).as_bytes());
    }

    /// Write the header of a multi-line reply
    /// Format: *<n>\r\n, followed by n value lines
    pub fn array_len(&mut self, n: usize) {
        let mut itoa_buf = Buffer::new();
        self.buf.extend_from_slice(b"*");
        self.line(itoa_buf.format(n).as_bytes());
    }

    /// Write an error reply
    pub fn error(&mut self, message: &str) {
        self.buf.extend_from_slice(b"ERROR: ");
        self.line(message.as_bytes());
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_responses() {
        let mut writer = ResponseWriter::new(256);

        writer.ok();
        assert_eq!(writer.take().as_ref(), b"OK\r\n");

        writer.value("hello");
        assert_eq!(writer.take().as_ref(), b"hello\r\n");

        writer.nil();
        assert_eq!(writer.take().as_ref(), b"(nil)\r\n");
    }

    #[test]
    fn test_integers() {
        let mut writer = ResponseWriter::new(256);

        writer.integer(1);
        assert_eq!(writer.take().as_ref(), b":1\r\n");

        writer.integer(-2);
        assert_eq!(writer.take().as_ref(), b":-2\r\n");
    }

    #[test]
    fn test_info_pairs() {
        let mut writer = ResponseWriter::new(256);
        writer.pair("keys", 2usize);
        writer.pair("uptime", 30u64);
        assert_eq!(writer.buffer(), b"keys:2\r\nuptime:30\r\n");
    }

    #[test]
    fn test_array() {
        let mut writer = ResponseWriter::new(256);
        writer.array_len(2);
        writer.value("one");
        writer.nil();
        assert_eq!(writer.take().as_ref(), b"*2\r\none\r\n(nil)\r\n");

        writer.array_len(0);
        assert_eq!(writer.take().as_ref(), b"*0\r\n");
    }

    #[test]
    fn test_errors() {
        let mut writer = ResponseWriter::new(256);
        writer.error("Unknown command 'FOO'");
        assert_eq!(
            writer.take().as_ref(),
            b"ERROR: Unknown command 'FOO'\r\n"
        );
    }
}
