//! Command Handler Module
//!
//! Turns a decoded [`Command`] into a reply by running it against the
//! [`Store`] and the [`TtlScheduler`].
//!
//! ## Supported Commands
//!
//! | Command              | Reply                                              |
//! |----------------------|----------------------------------------------------|
//! | `SET key value`      | `+OK`                                              |
//! | `GET key`            | bulk string, or null if absent                     |
//! | `DEL key`            | `+OK` if the key existed, else null                |
//! | `KEYS pattern`       | array of matching keys, or null if none match      |
//! | `EXPIRE key seconds` | `:1` if a TTL was set, `:0` if the key is absent   |
//! | `TTL key`            | seconds left, `-1` without TTL, `-2` if absent     |
//! | `FLUSHALL`           | `+OK`                                              |
//! | `PING`               | `+PONG`                                            |
//! | `COMMAND`            | nested array describing every command above        |
//!
//! Names are matched case-insensitively and every command has a fixed
//! number of arguments; anything else gets an error reply and the
//! connection carries on.
//!
//! ## Keys and TTLs
//!
//! The store and the scheduler don't know about each other. This layer is
//! what keeps them in step: `EXPIRE` only schedules keys that exist right
//! now, `TTL` checks the store before the scheduler, and `FLUSHALL` clears
//! both. A key deleted with `DEL` keeps its pending expiration; when it
//! fires, the deletion callback finds nothing to delete.

use crate::protocol::{Command, RespValue};
use crate::storage::{Store, TtlScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Static description of one command, as listed by `COMMAND`.
struct CommandInfo {
    name: &'static str,
    /// Number of elements in the request, including the command name
    arity: i64,
    flags: &'static [&'static str],
    first_key: i64,
    last_key: i64,
    step: i64,
}

#[rustfmt::skip]
const COMMAND_TABLE: &[CommandInfo] = &[
    CommandInfo { name: "SET", arity: 3, flags: &["write"], first_key: 1, last_key: 1, step: 1 },
    CommandInfo { name: "GET", arity: 2, flags: &["readonly"], first_key: 1, last_key: 1, step: 1 },
    CommandInfo { name: "DEL", arity: 2, flags: &["write"], first_key: 1, last_key: 1, step: 1 },
    CommandInfo { name: "KEYS", arity: 2, flags: &["readonly"], first_key: 1, last_key: 1, step: 1 },
    CommandInfo { name: "EXPIRE", arity: 3, flags: &["write"], first_key: 1, last_key: 1, step: 1 },
    CommandInfo { name: "TTL", arity: 2, flags: &["readonly"], first_key: 1, last_key: 1, step: 1 },
    CommandInfo { name: "FLUSHALL", arity: 1, flags: &["write"], first_key: 0, last_key: 0, step: 0 },
    CommandInfo { name: "PING", arity: 1, flags: &["stale", "fast"], first_key: 0, last_key: 0, step: 0 },
    CommandInfo { name: "COMMAND", arity: 1, flags: &["readonly"], first_key: 0, last_key: 0, step: 0 },
];

/// Handles commands by dispatching them to the appropriate handlers.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
    ttl: Arc<TtlScheduler>,
}

impl CommandHandler {
    /// Creates a command handler over a shared store and TTL scheduler.
    pub fn new(store: Arc<Store>, ttl: Arc<TtlScheduler>) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn ttl(&self) -> &Arc<TtlScheduler> {
        &self.ttl
    }

    /// Executes a command and returns the reply.
    ///
    /// Never fails: every problem with the command itself becomes an error
    /// reply.
    pub fn execute(&self, command: Command) -> RespValue {
        let name = command.name.to_uppercase();
        trace!(command = %name, args = command.args.len(), "Executing command");
        self.dispatch(&name, &command)
    }

    fn dispatch(&self, name: &str, command: &Command) -> RespValue {
        let args = command.args.as_slice();
        match name {
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" => self.cmd_del(args),
            "KEYS" => self.cmd_keys(args),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),
            "FLUSHALL" => self.cmd_flushall(args),
            "PING" => self.cmd_ping(args),
            "COMMAND" => self.cmd_command(args),
            _ => RespValue::error(format!("ERR unknown command: {}", command.name)),
        }
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// SET key value
    fn cmd_set(&self, args: &[String]) -> RespValue {
        let [key, value] = args else {
            return usage("SET key value");
        };
        self.store.set(key.as_str(), value.as_str());
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return usage("GET key");
        };
        match self.store.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        }
    }

    /// DEL key
    fn cmd_del(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return usage("DEL key");
        };
        if self.store.delete(key) {
            RespValue::ok()
        } else {
            RespValue::null()
        }
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[String]) -> RespValue {
        let [pattern] = args else {
            return usage("KEYS pattern");
        };
        let keys = self.store.matches(pattern);
        if keys.is_empty() {
            return RespValue::null();
        }
        RespValue::bulk_array(keys)
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[String]) -> RespValue {
        let [key, seconds] = args else {
            return usage("EXPIRE key seconds");
        };

        // Signed parse, so "-0" counts as zero; anything below zero is invalid.
        let invalid = || RespValue::error(format!("ERR invalid seconds value: {}", seconds));
        let Some(secs) = seconds
            .parse::<i64>()
            .ok()
            .and_then(|n| u64::try_from(n).ok())
        else {
            return invalid();
        };

        if !self.store.contains(key) {
            return RespValue::integer(0);
        }

        let Some(expires_at) = Instant::now().checked_add(Duration::from_secs(secs)) else {
            return invalid();
        };

        match self.ttl.set_ttl(key.as_str(), expires_at) {
            Ok(()) => RespValue::integer(1),
            Err(e) => RespValue::error(format!("ERR {}", e)),
        }
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return usage("TTL key");
        };

        if !self.store.contains(key) {
            return RespValue::integer(-2);
        }

        match self.ttl.get_ttl(key) {
            None => RespValue::integer(-1),
            Some(expires_at) => {
                // Past deadlines give zero: expired, not yet reaped.
                let remaining = expires_at.saturating_duration_since(Instant::now());
                RespValue::integer(i64::try_from(remaining.as_secs()).unwrap_or(i64::MAX))
            }
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// FLUSHALL
    fn cmd_flushall(&self, args: &[String]) -> RespValue {
        if !args.is_empty() {
            return usage("FLUSHALL");
        }
        self.store.flush_all();
        self.ttl.flush_all();
        RespValue::ok()
    }

    /// PING
    fn cmd_ping(&self, args: &[String]) -> RespValue {
        if !args.is_empty() {
            return usage("PING");
        }
        RespValue::pong()
    }

    /// COMMAND
    fn cmd_command(&self, args: &[String]) -> RespValue {
        if !args.is_empty() {
            return usage("COMMAND");
        }

        let entries = COMMAND_TABLE
            .iter()
            .map(|info| {
                RespValue::array(vec![
                    RespValue::bulk_string(info.name),
                    RespValue::integer(info.arity),
                    RespValue::bulk_array(info.flags.iter().copied()),
                    RespValue::integer(info.first_key),
                    RespValue::integer(info.last_key),
                    RespValue::integer(info.step),
                ])
            })
            .collect();

        RespValue::array(entries)
    }
}

fn usage(form: &str) -> RespValue {
    RespValue::error(format!("ERR usage: {}", form))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ExpiryConfig;
    use tokio_util::sync::CancellationToken;

    /// A handler whose scheduler deletes expired keys from its store, as
    /// the server wires it.
    fn create_handler() -> CommandHandler {
        let store = Arc::new(Store::new());
        let ttl = TtlScheduler::start(&CancellationToken::new(), ExpiryConfig::default(), {
            let store = Arc::clone(&store);
            move |key: String| {
                store.delete(&key);
            }
        });
        CommandHandler::new(store, Arc::new(ttl))
    }

    fn make_command(args: &[&str]) -> Command {
        Command::from_parts(args).expect("command needs a name")
    }

    fn run(handler: &CommandHandler, args: &[&str]) -> RespValue {
        handler.execute(make_command(args))
    }

    #[tokio::test]
    async fn test_set_get() {
        let handler = create_handler();

        let response = run(&handler, &["SET", "k1", "v1"]);
        assert_eq!(response.serialize(), b"+OK\r\n");

        let response = run(&handler, &["GET", "k1"]);
        assert_eq!(response.serialize(), b"$2\r\nv1\r\n");
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let handler = create_handler();
        assert_eq!(run(&handler, &["GET", "missing"]), RespValue::null());
    }

    #[tokio::test]
    async fn test_case_insensitive_names() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["set", "key", "value"]), RespValue::ok());
        assert_eq!(run(&handler, &["GeT", "key"]), RespValue::bulk_string("value"));
        assert_eq!(run(&handler, &["ping"]), RespValue::pong());
    }

    #[tokio::test]
    async fn test_del() {
        let handler = create_handler();
        run(&handler, &["SET", "key", "value"]);

        assert_eq!(run(&handler, &["DEL", "key"]), RespValue::ok());
        assert_eq!(run(&handler, &["DEL", "key"]), RespValue::null());
        assert_eq!(run(&handler, &["GET", "key"]), RespValue::null());
    }

    #[tokio::test]
    async fn test_keys() {
        let handler = create_handler();
        run(&handler, &["SET", "user:2", "b"]);
        run(&handler, &["SET", "user:1", "a"]);
        run(&handler, &["SET", "order:1", "c"]);

        assert_eq!(
            run(&handler, &["KEYS", "user:*"]),
            RespValue::bulk_array(["user:1", "user:2"])
        );
        assert_eq!(run(&handler, &["KEYS", "nothing*"]), RespValue::null());
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let handler = create_handler();

        let response = run(&handler, &["EXPIRE", "missing", "10"]);
        assert_eq!(response.serialize(), b":0\r\n");
        assert_eq!(handler.ttl().get_ttl("missing"), None);
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let handler = create_handler();
        run(&handler, &["SET", "session", "abc"]);

        assert_eq!(run(&handler, &["EXPIRE", "session", "100"]), RespValue::integer(1));

        let ttl = run(&handler, &["TTL", "session"]).as_integer().unwrap();
        assert!((99..=100).contains(&ttl), "unexpected ttl {}", ttl);
    }

    #[tokio::test]
    async fn test_expire_rejects_bad_seconds() {
        let handler = create_handler();
        run(&handler, &["SET", "key", "value"]);

        assert_eq!(
            run(&handler, &["EXPIRE", "key", "-5"]),
            RespValue::error("ERR invalid seconds value: -5")
        );
        assert_eq!(
            run(&handler, &["EXPIRE", "key", "soon"]),
            RespValue::error("ERR invalid seconds value: soon")
        );
        assert_eq!(
            run(&handler, &["EXPIRE", "key", "18446744073709551615"]),
            RespValue::error("ERR invalid seconds value: 18446744073709551615")
        );
        assert_eq!(run(&handler, &["TTL", "key"]), RespValue::integer(-1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_negative_zero_is_zero() {
        let handler = create_handler();
        run(&handler, &["SET", "key", "value"]);

        assert_eq!(run(&handler, &["EXPIRE", "key", "-0"]), RespValue::integer(1));
        assert_eq!(run(&handler, &["TTL", "key"]), RespValue::integer(0));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(run(&handler, &["GET", "key"]), RespValue::null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_zero_then_reaped() {
        let handler = create_handler();
        run(&handler, &["SET", "k1", "v1"]);

        assert_eq!(run(&handler, &["EXPIRE", "k1", "0"]), RespValue::integer(1));
        // The worker has not run yet: known expired, not yet reaped.
        assert_eq!(run(&handler, &["TTL", "k1"]).serialize(), b":0\r\n");

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(run(&handler, &["TTL", "k1"]), RespValue::integer(-2));
        assert_eq!(run(&handler, &["GET", "k1"]), RespValue::null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_expires_after_seconds() {
        let handler = create_handler();
        run(&handler, &["SET", "key", "value"]);
        run(&handler, &["EXPIRE", "key", "5"]);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(run(&handler, &["GET", "key"]), RespValue::bulk_string("value"));
        let ttl = run(&handler, &["TTL", "key"]).as_integer().unwrap();
        assert!((0..=1).contains(&ttl), "unexpected ttl {}", ttl);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(run(&handler, &["GET", "key"]), RespValue::null());
    }

    #[tokio::test]
    async fn test_ttl_without_expire() {
        let handler = create_handler();
        run(&handler, &["SET", "neverset", "v"]);

        assert_eq!(run(&handler, &["TTL", "neverset"]).serialize(), b":-1\r\n");
        assert_eq!(run(&handler, &["TTL", "missing"]).serialize(), b":-2\r\n");
    }

    #[tokio::test]
    async fn test_flushall_clears_store_and_ttls() {
        let handler = create_handler();
        run(&handler, &["SET", "a", "1"]);
        run(&handler, &["SET", "b", "2"]);
        run(&handler, &["EXPIRE", "a", "100"]);

        assert_eq!(run(&handler, &["FLUSHALL"]), RespValue::ok());

        assert!(handler.store().is_empty());
        assert!(handler.ttl().is_empty());
        assert_eq!(run(&handler, &["TTL", "a"]).serialize(), b":-2\r\n");
        assert_eq!(run(&handler, &["TTL", "b"]).serialize(), b":-2\r\n");
    }

    #[tokio::test]
    async fn test_ping() {
        let handler = create_handler();
        assert_eq!(run(&handler, &["PING"]).serialize(), b"+PONG\r\n");
        assert_eq!(
            run(&handler, &["PING", "hello"]),
            RespValue::error("ERR usage: PING")
        );
    }

    #[tokio::test]
    async fn test_wrong_arity() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["SET", "key"]), RespValue::error("ERR usage: SET key value"));
        assert_eq!(run(&handler, &["GET"]), RespValue::error("ERR usage: GET key"));
        assert_eq!(run(&handler, &["DEL", "a", "b"]), RespValue::error("ERR usage: DEL key"));
        assert_eq!(run(&handler, &["KEYS"]), RespValue::error("ERR usage: KEYS pattern"));
        assert_eq!(
            run(&handler, &["EXPIRE", "key"]),
            RespValue::error("ERR usage: EXPIRE key seconds")
        );
        assert_eq!(run(&handler, &["TTL"]), RespValue::error("ERR usage: TTL key"));
        assert_eq!(run(&handler, &["FLUSHALL", "ASYNC"]), RespValue::error("ERR usage: FLUSHALL"));
        assert_eq!(run(&handler, &["COMMAND", "DOCS"]), RespValue::error("ERR usage: COMMAND"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let handler = create_handler();
        let response = run(&handler, &["frobnicate", "x"]);
        assert_eq!(response, RespValue::error("ERR unknown command: frobnicate"));
    }

    #[tokio::test]
    async fn test_command_listing() {
        let handler = create_handler();
        let response = run(&handler, &["COMMAND"]);

        let entries = response.as_array().unwrap();
        assert_eq!(entries.len(), 9);

        let ping = entries
            .iter()
            .find(|e| e.as_array().map(|f| &f[0]) == Some(&RespValue::bulk_string("PING")))
            .unwrap();
        assert_eq!(
            ping.serialize(),
            b"*6\r\n$4\r\nPING\r\n:1\r\n*2\r\n$5\r\nstale\r\n$4\r\nfast\r\n:0\r\n:0\r\n:0\r\n"
        );

        let set = &entries[0];
        assert_eq!(
            set.serialize(),
            b"*6\r\n$3\r\nSET\r\n:3\r\n*1\r\n$5\r\nwrite\r\n:1\r\n:1\r\n:1\r\n"
        );
    }

    #[tokio::test]
    async fn test_expire_after_scheduler_stopped() {
        let handler = create_handler();
        run(&handler, &["SET", "key", "value"]);
        handler.ttl().stop();

        assert_eq!(
            run(&handler, &["EXPIRE", "key", "10"]),
            RespValue::error("ERR scheduler stopped")
        );
    }
}
