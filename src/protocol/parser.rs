//! Request Frame Decoder
//!
//! Clients send every command as an array of bulk strings:
//!
//! ```text
//! *<N>\r\n
//! $<L1>\r\n<L1 bytes>\r\n
//! ...
//! $<LN>\r\n<LN bytes>\r\n
//! ```
//!
//! The first element is the verb, the rest are its arguments.
//!
//! ## How the Parser Works
//!
//! [`CommandParser::parse`] looks at the front of a buffer and returns either:
//! - `Ok(Some((command, consumed)))` - one complete frame, `consumed` bytes long
//! - `Ok(None)` - the frame is not complete yet
//! - `Err(ParseError)` - the bytes can never form a valid frame
//!
//! The connection loop appends socket reads to a buffer, parses, and advances
//! by `consumed`, so several frames arriving in one packet are answered in
//! order, one at a time.
//!
//! After a decode error, [`resync_len`] says how much of the buffer belongs
//! to the rejected frame, so frames pipelined behind it still get answered.
//!
//! `*0` and `*-1` are both rejected with [`ParseError::EmptyCommand`]: an
//! empty request and a null request are indistinguishable to the decoder.

use crate::protocol::command::Command;
use crate::protocol::types::{prefix, CRLF};
use thiserror::Error;

/// Errors that can occur while decoding a request frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The frame did not start with `*`
    #[error("expected array (*), got: {0:?}")]
    NotAnArray(String),

    /// The element count is not a number
    #[error("invalid array length: {0}")]
    InvalidArrayLength(String),

    /// The element count is zero or negative (including the null array)
    #[error("command must contain at least one element")]
    EmptyCommand,

    /// An element did not start with `$`
    #[error("expected bulk string ($), got: {0:?}")]
    NotABulkString(String),

    /// A bulk length is not a number, or is negative
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(String),

    /// The bytes after a bulk payload were not CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// Command names and arguments must be UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// A bulk string longer than the configured limit
    #[error("bulk string too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The input ended in the middle of a frame
    #[error("unexpected EOF")]
    Truncated,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Decodes request frames from a byte buffer.
#[derive(Debug, Clone)]
pub struct CommandParser {
    max_bulk_size: usize,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Creates a parser with the default bulk size limit.
    pub fn new() -> Self {
        Self::with_max_bulk_size(MAX_BULK_SIZE)
    }

    pub fn with_max_bulk_size(max_bulk_size: usize) -> Self {
        Self { max_bulk_size }
    }

    /// Attempts to decode one frame from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
        let Some((header, mut consumed)) = read_line(buf) else {
            return Ok(None);
        };

        let count = match header.split_first() {
            Some((&prefix::ARRAY, digits)) => parse_number(digits)
                .map_err(ParseError::InvalidArrayLength)?,
            _ => return Err(ParseError::NotAnArray(lossy(header))),
        };

        if count < 1 {
            return Err(ParseError::EmptyCommand);
        }

        // The count comes off the wire; don't let it size the allocation.
        let mut parts = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            match self.parse_bulk_string(&buf[consumed..])? {
                Some((part, used)) => {
                    parts.push(part);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }

        let mut parts = parts.into_iter();
        let name = parts.next().unwrap_or_default();
        Ok(Some((Command::new(name, parts.collect()), consumed)))
    }

    /// Parses `$<len>\r\n<data>\r\n`.
    fn parse_bulk_string(&self, buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
        let Some((header, data_start)) = read_line(buf) else {
            return Ok(None);
        };

        let length = match header.split_first() {
            Some((&prefix::BULK_STRING, digits)) => {
                parse_number(digits).map_err(ParseError::InvalidBulkLength)?
            }
            _ => return Err(ParseError::NotABulkString(lossy(header))),
        };

        if length < 0 {
            return Err(ParseError::InvalidBulkLength(format!(
                "negative length {}",
                length
            )));
        }
        let length = length as usize;

        if length > self.max_bulk_size {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: self.max_bulk_size,
            });
        }

        let data_end = data_start + length;
        let total = data_end + CRLF.len();
        if buf.len() < total {
            return Ok(None);
        }

        if &buf[data_end..total] != CRLF {
            return Err(ParseError::MissingCrlf);
        }

        let data = std::str::from_utf8(&buf[data_start..data_end])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

        Ok(Some((data.to_string(), total)))
    }
}

/// Decodes exactly one frame from a buffer that is expected to hold it
/// completely. Running out of input is an error here, not a reason to wait.
///
/// Returns the command and the number of bytes it occupied; the next frame,
/// if any, starts at that offset.
pub fn decode_command(buf: &[u8]) -> ParseResult<(Command, usize)> {
    CommandParser::new().parse(buf)?.ok_or(ParseError::Truncated)
}

/// Number of bytes to discard after [`CommandParser::parse`] rejected the
/// front of `buf`, so decoding can resume at the next frame.
///
/// The line the decoder stopped on is dropped, along with every following
/// complete line that cannot start a frame. Decoding resumes at the next
/// `*` line, or at an unterminated tail that may still grow into one.
/// Always returns at least one byte for a non-empty buffer.
pub fn resync_len(buf: &[u8]) -> usize {
    let Some((_, mut skip)) = read_line(buf) else {
        return buf.len();
    };

    while let Some((line, used)) = read_line(&buf[skip..]) {
        if line.first() == Some(&prefix::ARRAY) {
            break;
        }
        skip += used;
    }
    skip
}

/// Splits off one CRLF-terminated line, returning its content (without
/// CRLF) and the number of bytes including the terminator.
fn read_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let pos = buf.windows(CRLF.len()).position(|w| w == CRLF)?;
    Some((&buf[..pos], pos + CRLF.len()))
}

fn parse_number(digits: &[u8]) -> Result<i64, String> {
    let text = std::str::from_utf8(digits).map_err(|e| e.to_string())?;
    text.parse::<i64>()
        .map_err(|e| format!("{:?}: {}", text, e))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> ParseResult<Command> {
        decode_command(input).map(|(command, _)| command)
    }

    fn args(command: &Command) -> Vec<&str> {
        command.args.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_decode_set() {
        let command = decode(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n").unwrap();
        assert_eq!(command.name, "SET");
        assert_eq!(args(&command), ["key", "value"]);
    }

    #[test]
    fn test_decode_verb_without_arguments() {
        let command = decode(b"*1\r\n$4\r\nPING\r\n").unwrap();
        assert_eq!(command.name, "PING");
        assert!(command.args.is_empty());
    }

    #[test]
    fn test_decode_preserves_verb_case() {
        let command = decode(b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n").unwrap();
        assert_eq!(command.name, "get");
    }

    #[test]
    fn test_decode_empty_and_spaced_arguments() {
        let command = decode(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$0\r\n\r\n").unwrap();
        assert_eq!(args(&command), ["key", ""]);

        let command = decode(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$11\r\nhello world\r\n").unwrap();
        assert_eq!(args(&command), ["key", "hello world"]);
    }

    #[test]
    fn test_decode_payload_may_contain_crlf() {
        let command = decode(b"*2\r\n$3\r\nGET\r\n$4\r\na\r\nb\r\n").unwrap();
        assert_eq!(args(&command), ["a\r\nb"]);
    }

    #[test]
    fn test_decode_many_arguments() {
        let input = b"*7\r\n$4\r\nMSET\r\n$4\r\nkey1\r\n$4\r\nval1\r\n$4\r\nkey2\r\n$4\r\nval2\r\n$4\r\nkey3\r\n$4\r\nval3\r\n";
        let command = decode(input).unwrap();
        assert_eq!(command.name, "MSET");
        assert_eq!(
            args(&command),
            ["key1", "val1", "key2", "val2", "key3", "val3"]
        );
    }

    #[test]
    fn test_not_an_array() {
        let err = decode(b"SET key value\r\n").unwrap_err();
        assert_eq!(err, ParseError::NotAnArray("SET key value".to_string()));
        assert!(err.to_string().starts_with("expected array (*), got:"));
    }

    #[test]
    fn test_invalid_array_length() {
        let err = decode(b"*abc\r\n$3\r\nSET\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidArrayLength(_)));
        assert!(err.to_string().starts_with("invalid array length:"));
    }

    #[test]
    fn test_zero_and_null_array_are_the_same_error() {
        assert_eq!(decode(b"*0\r\n").unwrap_err(), ParseError::EmptyCommand);
        assert_eq!(decode(b"*-1\r\n").unwrap_err(), ParseError::EmptyCommand);
        assert_eq!(
            ParseError::EmptyCommand.to_string(),
            "command must contain at least one element"
        );
    }

    #[test]
    fn test_element_not_a_bulk_string() {
        let err = decode(b"*2\r\n#3\r\nSET\r\n$3\r\nkey\r\n").unwrap_err();
        assert_eq!(err, ParseError::NotABulkString("#3".to_string()));
    }

    #[test]
    fn test_invalid_bulk_length() {
        let err = decode(b"*2\r\n$abc\r\nSET\r\n$3\r\nkey\r\n").unwrap_err();
        assert!(err.to_string().starts_with("invalid bulk string length:"));

        let err = decode(b"*1\r\n$-1\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidBulkLength(_)));
    }

    #[test]
    fn test_bulk_length_mismatch() {
        let err = decode(b"*2\r\n$5\r\nSET\r\n$3\r\nkey\r\n").unwrap_err();
        assert_eq!(err, ParseError::MissingCrlf);
    }

    #[test]
    fn test_truncated_frame() {
        assert_eq!(
            decode(b"*2\r\n$3\r\nSET\r\n$3\r\n").unwrap_err(),
            ParseError::Truncated
        );
        assert_eq!(decode(b"").unwrap_err(), ParseError::Truncated);
    }

    #[test]
    fn test_incomplete_frame_waits_for_more() {
        let parser = CommandParser::new();
        let full = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
        for cut in 0..full.len() {
            assert_eq!(parser.parse(&full[..cut]).unwrap(), None, "cut at {}", cut);
        }
        assert!(parser.parse(full).unwrap().is_some());
    }

    #[test]
    fn test_bulk_size_limit() {
        let parser = CommandParser::with_max_bulk_size(4);
        let err = parser.parse(b"*1\r\n$5\r\nhello\r\n").unwrap_err();
        assert_eq!(err, ParseError::MessageTooLarge { size: 5, max: 4 });
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode(b"*1\r\n$2\r\n\xff\xfe\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidUtf8(_)));
    }

    #[test]
    fn test_consumes_exactly_one_frame() {
        let input = b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
        let (first, used) = decode_command(input).unwrap();
        assert_eq!(first.name, "PING");
        assert_eq!(used, 14);

        let (second, rest) = decode_command(&input[used..]).unwrap();
        assert_eq!(second.name, "GET");
        assert_eq!(used + rest, input.len());
    }

    #[test]
    fn test_resync_after_empty_command() {
        let input = b"*0\r\n*1\r\n$4\r\nPING\r\n";
        assert_eq!(decode(input).unwrap_err(), ParseError::EmptyCommand);

        let skip = resync_len(input);
        assert_eq!(skip, 4);
        assert_eq!(decode(&input[skip..]).unwrap().name, "PING");
    }

    #[test]
    fn test_resync_skips_rest_of_rejected_frame() {
        let input = b"*2\r\n$3\r\nGET\r\n:5\r\n*1\r\n$4\r\nPING\r\n";
        assert_eq!(
            decode(input).unwrap_err(),
            ParseError::NotABulkString(":5".to_string())
        );

        let skip = resync_len(input);
        assert_eq!(decode(&input[skip..]).unwrap().name, "PING");

        let input = b"GARBAGE\r\nMORE\r\n*1\r\n$4\r\nPING\r\n";
        let skip = resync_len(input);
        assert_eq!(decode(&input[skip..]).unwrap().name, "PING");
    }

    #[test]
    fn test_resync_keeps_unterminated_tail() {
        let input = b"*-1\r\nbad\r\n*1\r\n$4\r\nPI";
        let skip = resync_len(input);
        assert_eq!(&input[skip..], b"*1\r\n$4\r\nPI");

        assert_eq!(resync_len(b"*0\r\n$4"), 4);
        assert_eq!(resync_len(b"no line ending"), 14);
    }

    #[test]
    fn test_frame_roundtrip() {
        let cases: [&[&str]; 4] = [
            &["SET", "user:101", "Ariz"],
            &["PING"],
            &["KEYS", "*"],
            &["SET", "key:123", "value@#$%^", ""],
        ];
        for parts in cases {
            let original = Command::from_parts(parts).unwrap();
            let (decoded, used) = decode_command(&original.to_frame()).unwrap();
            assert_eq!(decoded, original);
            assert_eq!(used, original.to_frame().len());
        }
    }
}
