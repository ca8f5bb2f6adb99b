//! Dispatch table (spec §4.7/§6): one entry per command, naming its arity,
//! flags, and key-index triple. Grounded on the teacher's `kv-cli`
//! dispatch-by-name `match` in `command/mod.rs`, generalized into a
//! lookup table the way a real command-family server needs (arity/flags
//! data driving pre-execution checks rather than being buried in each
//! handler).

use crate::executor::flags::CommandFlags;

/// `(first_key, last_key, step)` key-index triple (spec §6). `(0, 0, 0)`
/// marks a command with no keys (e.g. `PING`, `MULTI`).
pub type KeySpec = (i32, i32, i32);

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Exact arity if positive (including the command name itself);
    /// `-N` means "at least N" (spec §6).
    pub arity: i32,
    pub flags: CommandFlags,
    pub key_spec: KeySpec,
}

impl CommandSpec {
    pub const fn new(name: &'static str, arity: i32, flags: CommandFlags, key_spec: KeySpec) -> Self {
        CommandSpec { name, arity, flags, key_spec }
    }

    /// Whether `argc` (including the command name) satisfies this
    /// command's declared arity.
    pub fn arity_ok(&self, argc: usize) -> bool {
        let argc = argc as i32;
        if self.arity >= 0 {
            argc == self.arity
        } else {
            argc >= -self.arity
        }
    }
}

use CommandFlags as F;

macro_rules! spec {
    ($name:expr, $arity:expr, $flags:expr, $keys:expr) => {
        CommandSpec::new($name, $arity, $flags, $keys)
    };
}

/// The dispatch table (spec §4.7 "Dispatch table entries"). Commands
/// outside §4.7's concrete surface (streams, bitmaps, hyperloglog, geo,
/// cluster, scripting, pub/sub, replication, admin beyond what's listed)
/// have no entry here at all: `lookup` returns `None` for them, and
/// `executor::Executor::execute` rejects them as an unknown command via
/// `table::lookup` + `CommandSpec::arity_ok`, the same path any genuinely
/// unknown command takes — full RESP-surface parity is explicitly not this
/// component's job (spec.md §1).
pub static COMMAND_TABLE: &[CommandSpec] = &[
    spec!("PING", -1, F::READONLY | F::FAST | F::OK_LOADING | F::OK_STALE, (0, 0, 0)),
    spec!("GET", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("SET", -3, F::WRITE | F::DENYOOM, (1, 1, 1)),
    spec!("GETEX", -2, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("DEL", -2, F::WRITE, (1, -1, 1)),
    spec!("EXISTS", -2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, -1, 1)),
    spec!("EXPIRE", -3, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("PEXPIRE", -3, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("TTL", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("PTTL", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("PERSIST", 2, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("INCR", 2, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("INCRBY", 3, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("DECR", 2, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("TYPE", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("DBSIZE", 1, F::READONLY | F::FAST | F::ASYNC_SAFE, (0, 0, 0)),
    spec!("FLUSHDB", -1, F::WRITE, (0, 0, 0)),
    spec!("LPUSH", -3, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("RPUSH", -3, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("LRANGE", 4, F::READONLY | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("LLEN", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("LPOP", -2, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("RPOP", -2, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("HSET", -4, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("HGET", 3, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("HDEL", -3, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("HGETALL", 2, F::READONLY | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("HLEN", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("SADD", -3, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("SREM", -3, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("SCARD", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("SISMEMBER", 3, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("SMEMBERS", 2, F::READONLY | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("ZADD", -4, F::WRITE | F::DENYOOM | F::FAST, (1, 1, 1)),
    spec!("ZSCORE", 3, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("ZRANGEBYSCORE", -4, F::READONLY | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("ZCARD", 2, F::READONLY | F::FAST | F::ASYNC_SAFE, (1, 1, 1)),
    spec!("ZREM", -3, F::WRITE | F::FAST, (1, 1, 1)),
    spec!("MULTI", 1, F::NOSCRIPT | F::FAST | F::TRANSACTION_CONTROL, (0, 0, 0)),
    spec!("EXEC", 1, F::NOSCRIPT | F::TRANSACTION_CONTROL, (0, 0, 0)),
    spec!("DISCARD", 1, F::NOSCRIPT | F::FAST | F::TRANSACTION_CONTROL, (0, 0, 0)),
    spec!("WATCH", -2, F::NOSCRIPT | F::FAST | F::TRANSACTION_CONTROL, (1, -1, 1)),
    spec!("UNWATCH", 1, F::NOSCRIPT | F::FAST | F::TRANSACTION_CONTROL, (0, 0, 0)),
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    let upper = name.to_ascii_uppercase();
    COMMAND_TABLE.iter().find(|c| c.name == upper)
}
