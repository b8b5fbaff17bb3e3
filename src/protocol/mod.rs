//! RESP2 Wire Codec
//!
//! The subset of the Redis Serialization Protocol this server speaks:
//! requests are arrays of bulk strings, replies are status, error, integer,
//! bulk string or (nested) array values.
//!
//! ## Modules
//!
//! - `command`: the decoded request type
//! - `parser`: request frame decoder
//! - `types`: the `RespValue` reply type and the encoders
//!
//! ## Example
//!
//! ```
//! use radish::protocol::{decode_command, RespValue};
//!
//! let (command, consumed) = decode_command(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").unwrap();
//! assert_eq!(command.name, "GET");
//! assert_eq!(command.args, vec!["name".to_string()]);
//! assert_eq!(consumed, 23);
//!
//! let reply = RespValue::bulk_string("Ariz");
//! assert_eq!(reply.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod command;
pub mod parser;
pub mod types;

pub use command::Command;
pub use parser::{decode_command, resync_len, CommandParser, ParseError, ParseResult};
pub use types::RespValue;
