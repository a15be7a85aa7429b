//! Newline framing for text protocols.
//!
//! [`LineFramer`] accumulates arbitrarily fragmented input and yields complete
//! lines. The unterminated tail is carried over to the next [`LineFramer::feed`]
//! call, so splitting a stream at any byte boundary produces the same lines as
//! feeding it whole.

/// Splits a byte stream into `\n`-terminated lines, stripping one trailing `\r`.
///
/// Works on bytes so that a multi-byte UTF-8 sequence cut in half by the
/// transport is reassembled before decoding. Complete lines are decoded
/// lossily; the framer never fails.
///
/// The remainder is unbounded. A peer that never sends a terminator grows it
/// without limit.
#[derive(Debug, Default, Clone)]
pub struct LineFramer {
    remainder: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.remainder.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.remainder[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.remainder[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.remainder.drain(..start);
        lines
    }

    /// Append `chunk` without splitting it. Pair with [`LineFramer::next_line`]
    /// when the caller stops reading lines partway through the buffer.
    pub fn push(&mut self, chunk: &[u8]) {
        self.remainder.extend_from_slice(chunk);
    }

    /// Pop the first complete line. Bytes after it stay buffered exactly as
    /// received.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.remainder.iter().position(|&b| b == b'\n')?;
        let mut line = &self.remainder[..end];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        let text = String::from_utf8_lossy(line).into_owned();
        self.remainder.drain(..=end);
        Some(text)
    }

    /// Convenience wrapper for text input.
    pub fn feed_str(&mut self, chunk: &str) -> Vec<String> {
        self.feed(chunk.as_bytes())
    }

    /// Bytes received after the last terminator.
    pub fn remainder(&self) -> &[u8] {
        &self.remainder
    }

    /// Take the unterminated tail, leaving the framer empty.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.remainder)
    }

    pub fn clear(&mut self) {
        self.remainder.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "HELLO ij v0.9.4 (abc)\r\n:srv 001 me :Welcome to IRC\nPING :x\r\n\r\nlast\n";

    fn expected() -> Vec<String> {
        vec![
            "HELLO ij v0.9.4 (abc)".to_string(),
            ":srv 001 me :Welcome to IRC".to_string(),
            "PING :x".to_string(),
            String::new(),
            "last".to_string(),
        ]
    }

    #[test]
    fn test_whole_stream() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed_str(STREAM), expected());
        assert!(framer.remainder().is_empty());
    }

    #[test]
    fn test_every_two_way_split() {
        let bytes = STREAM.as_bytes();
        for split in 0..=bytes.len() {
            let mut framer = LineFramer::new();
            let mut lines = framer.feed(&bytes[..split]);
            lines.extend(framer.feed(&bytes[split..]));
            assert_eq!(lines, expected(), "split at {}", split);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        for b in STREAM.as_bytes() {
            lines.extend(framer.feed(std::slice::from_ref(b)));
        }
        assert_eq!(lines, expected());
    }

    #[test]
    fn test_multibyte_split_is_reassembled() {
        let text = "PRIVMSG #a :héllo\n".as_bytes();
        let cut = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let mut framer = LineFramer::new();
        assert!(framer.feed(&text[..cut]).is_empty());
        assert_eq!(framer.feed(&text[cut..]), vec!["PRIVMSG #a :héllo".to_string()]);
    }

    #[test]
    fn test_remainder_kept_until_terminated() {
        let mut framer = LineFramer::new();
        assert!(framer.feed_str("partial").is_empty());
        assert_eq!(framer.remainder(), b"partial");
        assert_eq!(framer.feed_str(" line\r"), Vec::<String>::new());
        assert_eq!(framer.feed_str("\n"), vec!["partial line".to_string()]);
        assert_eq!(framer.take_remainder(), Vec::<u8>::new());
    }

    #[test]
    fn test_next_line_leaves_rest_raw() {
        let mut framer = LineFramer::new();
        framer.push(b"CONNECTED to h:1\r\n:srv NOTICE * :a\r\n\xff\r\ntail");
        assert_eq!(framer.next_line(), Some("CONNECTED to h:1".to_string()));
        assert_eq!(framer.take_remainder(), b":srv NOTICE * :a\r\n\xff\r\ntail".to_vec());
        assert_eq!(framer.next_line(), None);
    }

    #[test]
    fn test_next_line_waits_for_terminator() {
        let mut framer = LineFramer::new();
        framer.push(b"HEL");
        assert_eq!(framer.next_line(), None);
        framer.push(b"LO\r\n");
        assert_eq!(framer.next_line(), Some("HELLO".to_string()));
        assert!(framer.remainder().is_empty());
    }

    #[test]
    fn test_only_one_cr_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed_str("a\r\r\n"), vec!["a\r".to_string()]);
    }
}
