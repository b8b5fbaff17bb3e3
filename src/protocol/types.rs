//! RESP2 Reply Values and Encoders
//!
//! Every reply the server sends is one of a closed set of shapes:
//!
//! - `+` Simple String (status)
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String, or the null bulk string `$-1\r\n`
//! - `*` Array of replies, or the null array `*-1\r\n`
//!
//! All lines are terminated with CRLF (`\r\n`).
//!
//! There is one free encoder function per shape, and [`RespValue::serialize`]
//! walks a (possibly nested, possibly mixed) reply tree and dispatches each
//! element to the matching encoder.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

const NULL_BULK_STRING: &[u8] = b"$-1\r\n";
const NULL_ARRAY: &[u8] = b"*-1\r\n";

/// A reply produced by the command dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Status reply. Must not contain CRLF.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// Error reply.
    /// Format: `-<error message>\r\n`
    Error(String),

    /// 64-bit signed integer.
    /// Format: `:<integer>\r\n`
    Integer(i64),

    /// Binary-safe string; `None` is the null bulk string `$-1\r\n`.
    BulkString(Option<Bytes>),

    /// Array of replies, elements may be of any shape (including arrays);
    /// `None` is the null array `*-1\r\n`.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Creates a new simple string response.
    ///
    /// # Example
    /// ```
    /// use radish::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new error response.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates a new integer response.
    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a new bulk string response.
    ///
    /// # Example
    /// ```
    /// use radish::protocol::types::RespValue;
    /// let bulk = RespValue::bulk_string("hello");
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    /// The null bulk string.
    pub fn null() -> Self {
        RespValue::BulkString(None)
    }

    /// Creates an array response.
    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(Some(values))
    }

    /// The null array.
    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    /// An array whose elements are all bulk strings.
    pub fn bulk_array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        RespValue::Array(Some(
            items.into_iter().map(RespValue::bulk_string).collect(),
        ))
    }

    /// Renders a value that has no reply shape of its own (a float, say)
    /// as a bulk string of its `Display` output.
    pub fn display(value: impl fmt::Display) -> Self {
        RespValue::bulk_string(value.to_string())
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        RespValue::simple_string("OK")
    }

    /// Common response for PING
    pub fn pong() -> Self {
        RespValue::simple_string("PONG")
    }

    /// Serializes the reply to its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => encode_simple_string(buf, s),
            RespValue::Error(s) => encode_error(buf, s),
            RespValue::Integer(n) => encode_integer(buf, *n),
            RespValue::BulkString(data) => encode_bulk_string(buf, data.as_deref()),
            RespValue::Array(None) => encode_null_array(buf),
            RespValue::Array(Some(values)) => {
                encode_array_header(buf, values.len());
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Returns true for the null bulk string and the null array.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Attempts to extract the inner integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract the inner array.
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(values)) => Some(values),
            _ => None,
        }
    }
}

impl From<i64> for RespValue {
    fn from(n: i64) -> Self {
        RespValue::Integer(n)
    }
}

impl From<&str> for RespValue {
    fn from(s: &str) -> Self {
        RespValue::bulk_string(s.to_string())
    }
}

impl From<String> for RespValue {
    fn from(s: String) -> Self {
        RespValue::bulk_string(s)
    }
}

impl From<Option<String>> for RespValue {
    fn from(s: Option<String>) -> Self {
        RespValue::BulkString(s.map(Bytes::from))
    }
}

impl From<f64> for RespValue {
    fn from(f: f64) -> Self {
        RespValue::display(f)
    }
}

impl<T: Into<RespValue>> From<Vec<T>> for RespValue {
    fn from(values: Vec<T>) -> Self {
        RespValue::array(values.into_iter().map(Into::into).collect())
    }
}

/// `+<text>\r\n`
pub fn encode_simple_string(buf: &mut Vec<u8>, text: &str) {
    buf.push(prefix::SIMPLE_STRING);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// `-<text>\r\n`
pub fn encode_error(buf: &mut Vec<u8>, text: &str) {
    buf.push(prefix::ERROR);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// `:<n>\r\n`
pub fn encode_integer(buf: &mut Vec<u8>, n: i64) {
    buf.push(prefix::INTEGER);
    buf.extend_from_slice(n.to_string().as_bytes());
    buf.extend_from_slice(CRLF);
}

/// `$<len>\r\n<data>\r\n`, or `$-1\r\n` for `None`.
pub fn encode_bulk_string(buf: &mut Vec<u8>, data: Option<&[u8]>) {
    let Some(data) = data else {
        encode_null_bulk_string(buf);
        return;
    };
    buf.push(prefix::BULK_STRING);
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

/// `$-1\r\n`
pub fn encode_null_bulk_string(buf: &mut Vec<u8>) {
    buf.extend_from_slice(NULL_BULK_STRING);
}

/// `*<len>\r\n` followed by each element as a bulk string, or `*-1\r\n`
/// for `None`.
pub fn encode_array<T: AsRef<[u8]>>(buf: &mut Vec<u8>, elements: Option<&[T]>) {
    let Some(elements) = elements else {
        encode_null_array(buf);
        return;
    };
    encode_array_header(buf, elements.len());
    for element in elements {
        encode_bulk_string(buf, Some(element.as_ref()));
    }
}

/// `*-1\r\n`
pub fn encode_null_array(buf: &mut Vec<u8>) {
    buf.extend_from_slice(NULL_ARRAY);
}

fn encode_array_header(buf: &mut Vec<u8>, len: usize) {
    buf.push(prefix::ARRAY);
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(CRLF);
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(Some(data)) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::BulkString(None) | RespValue::Array(None) => write!(f, "(nil)"),
            RespValue::Array(Some(values)) => {
                if values.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, v) in values.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
