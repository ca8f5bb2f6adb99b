//! Command executor (spec §4.7, component C7): dispatch-table lookup,
//! pre-execution checks, and `MULTI`/`EXEC`/`WATCH` orchestration.
//!
//! Full RESP parsing/framing, ACL, cluster redirection, and replication are
//! an embedder's job (spec.md §1 "Out of scope"); what lives here is the
//! ordered pre-execution check list spec §4.7 actually assigns to the core
//! engine itself — unknown-command/arity rejection, `DENYOOM` under
//! `maxmemory`, and the transactional buffering state machine — plus the
//! propagation record the embedder's AOF/replication layer forwards
//! verbatim.

pub mod flags;
pub mod handlers;
pub mod reply;
pub mod table;
pub mod transaction;

use bytes::Bytes;

use crate::error::{CResult, Error};
use crate::executor::flags::CommandFlags;
use crate::executor::reply::Reply;
use crate::executor::transaction::ClientState;
use crate::keyspace::db::Database;

/// Handlers operate against this rather than the bare `Database`, so every
/// handler sees the same wall-clock/meta-policy snapshot for the duration
/// of one command (spec §4.3: a command's view of "now" must not drift
/// mid-execution).
pub struct ExecCtx<'a> {
    pub db: &'a mut Database,
    pub now_ms: i64,
    pub now_secs: u32,
    /// Whether the active eviction policy is LFU-based (spec §4.6); decides
    /// which [`crate::keyspace::entry::AccessMeta`] variant new entries get.
    pub use_lfu: bool,
}

/// One write the executor produced, handed to the embedder's AOF/
/// replication layer to forward verbatim (spec §4.7 "Propagation" — e.g.
/// `GETEX key EX 10` propagates as `GETEX`, and `SPOP` would propagate as
/// the equivalent deterministic `SREM`, though that rewrite itself is out
/// of scope for the commands implemented here).
#[derive(Debug, Clone)]
pub struct Propagated {
    pub db_index: usize,
    pub name: String,
    pub args: Vec<Bytes>,
}

/// Ties the dispatch table, the per-command handlers, and per-connection
/// transaction state together. Holds no keyspace state of its own — every
/// call is handed the `Database` (and `Keyspace`-derived `db_index`) for
/// the command it's running, matching the single-writer model (spec §5).
pub struct Executor {
    maxmemory: Option<u64>,
}

impl Executor {
    pub fn new(maxmemory: Option<u64>) -> Self {
        Executor { maxmemory }
    }

    pub fn set_maxmemory(&mut self, maxmemory: Option<u64>) {
        self.maxmemory = maxmemory;
    }

    /// Executes one already-tokenized command (`name` plus its arguments,
    /// command name excluded from `args`) for `client` against `db`.
    ///
    /// Transaction-control commands (`MULTI`/`EXEC`/`DISCARD`/`WATCH`/
    /// `UNWATCH`) are handled directly and never queued, even mid-`MULTI`
    /// (spec §4.7). Every other command is queued while `client.in_multi()`
    /// and only actually runs when `EXEC` drains the queue.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        client: &mut ClientState,
        db: &mut Database,
        now_ms: i64,
        used_memory: u64,
        use_lfu: bool,
        name: &str,
        args: Vec<Bytes>,
        propagate: &mut Vec<Propagated>,
    ) -> CResult<Reply> {
        let upper = name.to_ascii_uppercase();

        match upper.as_str() {
            "MULTI" => return self.cmd_multi(client),
            "DISCARD" => return self.cmd_discard(client),
            "WATCH" => return self.cmd_watch(client, db, &args),
            "UNWATCH" => {
                client.unwatch();
                return Ok(Reply::ok());
            }
            "EXEC" => return self.exec(client, db, now_ms, used_memory, use_lfu, propagate),
            _ => {}
        }

        let spec = table::lookup(&upper);
        let arity_bad = !matches!(spec, Some(s) if s.arity_ok(args.len() + 1));

        if client.in_multi() {
            client.enqueue(upper, args, arity_bad);
            return Ok(Reply::SimpleString("QUEUED"));
        }

        if arity_bad {
            return Err(unknown_or_arity_error(spec, name));
        }
        let spec = spec.expect("arity_bad is false only when spec is Some");
        self.check_oom(spec.flags, used_memory)?;

        let reply = self.run_one(db, now_ms, use_lfu, client.db_index, spec, &upper, &args, propagate)?;
        Ok(reply)
    }

    fn cmd_multi(&self, client: &mut ClientState) -> CResult<Reply> {
        if client.in_multi() {
            return Err(Error::Transaction("MULTI calls can not be nested".into()));
        }
        client.begin_multi();
        Ok(Reply::ok())
    }

    fn cmd_discard(&self, client: &mut ClientState) -> CResult<Reply> {
        if !client.in_multi() {
            return Err(Error::Transaction("DISCARD without MULTI".into()));
        }
        client.end_multi();
        Ok(Reply::ok())
    }

    fn cmd_watch(&self, client: &mut ClientState, db: &Database, args: &[Bytes]) -> CResult<Reply> {
        if client.in_multi() {
            return Err(Error::Transaction("WATCH inside MULTI is not allowed".into()));
        }
        if args.is_empty() {
            return Err(Error::Protocol("wrong number of arguments for 'watch' command".into()));
        }
        for key in args {
            let version = db.version_of(key);
            client.watch(client.db_index, key.clone(), version);
        }
        Ok(Reply::ok())
    }

    /// Runs `EXEC`: aborts outright if a queued command was malformed
    /// (spec §7 `EXECABORT`) or if any watched key's write version moved
    /// since `WATCH` (optimistic-concurrency failure, spec §4.7 scenario
    /// 4), otherwise runs every queued command in order and collects their
    /// replies (including per-command errors, spec §4.7 "Propagation") into
    /// one array.
    fn exec(
        &self,
        client: &mut ClientState,
        db: &mut Database,
        now_ms: i64,
        used_memory: u64,
        use_lfu: bool,
        propagate: &mut Vec<Propagated>,
    ) -> CResult<Reply> {
        if !client.in_multi() {
            return Err(Error::Transaction("EXEC without MULTI".into()));
        }
        if client.is_dirty() {
            client.end_multi();
            return Err(Error::ExecAbort);
        }
        let db_index = client.db_index;
        let aborted = client
            .watches()
            .iter()
            .any(|w| w.db_index == db_index && db.version_of(&w.key) != w.version_at_watch);

        let queued = client.end_multi();
        if aborted {
            return Ok(Reply::Nil);
        }

        let mut results = Vec::with_capacity(queued.len());
        for cmd in queued {
            let reply = match table::lookup(&cmd.name) {
                None => Reply::error(format!("ERR unknown command '{}'", cmd.name)),
                Some(spec) => match self.check_oom(spec.flags, used_memory) {
                    Err(e) => Reply::error(e.to_string()),
                    Ok(()) => match self.run_one(db, now_ms, use_lfu, db_index, spec, &cmd.name, &cmd.args, propagate) {
                        Ok(r) => r,
                        Err(e) => Reply::error(e.to_string()),
                    },
                },
            };
            results.push(reply);
        }
        Ok(Reply::Array(results))
    }

    fn check_oom(&self, flags: CommandFlags, used_memory: u64) -> CResult<()> {
        if let Some(max) = self.maxmemory {
            if flags.contains(CommandFlags::DENYOOM) && used_memory > max {
                return Err(Error::Resource(
                    "command not allowed when used memory > 'maxmemory'".into(),
                ));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_one(
        &self,
        db: &mut Database,
        now_ms: i64,
        use_lfu: bool,
        db_index: usize,
        spec: &table::CommandSpec,
        name: &str,
        args: &[Bytes],
        propagate: &mut Vec<Propagated>,
    ) -> CResult<Reply> {
        let now_secs = (now_ms / 1000).max(0) as u32;
        let mut ctx = ExecCtx { db, now_ms, now_secs, use_lfu };

        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(Bytes::from(name.to_string()));
        full_args.extend_from_slice(args);

        let outcome = handlers::dispatch(&mut ctx, name, &full_args)?;
        if outcome.dirty && spec.flags.contains(CommandFlags::WRITE) {
            propagate.push(Propagated { db_index, name: name.to_string(), args: args.to_vec() });
        }
        Ok(outcome.reply)
    }
}

fn unknown_or_arity_error(spec: Option<&table::CommandSpec>, name: &str) -> Error {
    match spec {
        None => Error::Protocol(format!("unknown command '{name}'")),
        Some(_) => Error::Protocol(format!(
            "wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::db::Database;

    fn exec_one(ex: &Executor, client: &mut ClientState, db: &mut Database, name: &str, args: &[&str]) -> CResult<Reply> {
        let args = args.iter().map(|s| Bytes::from(s.to_string())).collect();
        let mut propagate = Vec::new();
        ex.execute(client, db, 0, 0, false, name, args, &mut propagate)
    }

    #[test]
    fn set_then_get_round_trips() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        exec_one(&ex, &mut client, &mut db, "SET", &["k", "v"]).unwrap();
        let reply = exec_one(&ex, &mut client, &mut db, "GET", &["k"]).unwrap();
        assert_eq!(reply, Reply::Bulk(Bytes::from("v")));
    }

    #[test]
    fn unknown_command_is_protocol_error() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        let err = exec_one(&ex, &mut client, &mut db, "NOTACOMMAND", &[]).unwrap_err();
        assert_eq!(err.token(), "ERR");
    }

    #[test]
    fn wrong_arity_is_rejected_before_dispatch() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        let err = exec_one(&ex, &mut client, &mut db, "GET", &["a", "b"]).unwrap_err();
        assert_eq!(err.token(), "ERR");
    }

    #[test]
    fn multi_queues_commands_and_exec_runs_them_in_order() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        exec_one(&ex, &mut client, &mut db, "MULTI", &[]).unwrap();
        let queued = exec_one(&ex, &mut client, &mut db, "SET", &["k", "1"]).unwrap();
        assert_eq!(queued, Reply::SimpleString("QUEUED"));
        let reply = exec_one(&ex, &mut client, &mut db, "EXEC", &[]).unwrap();
        match reply {
            Reply::Array(items) => assert_eq!(items, vec![Reply::ok()]),
            _ => panic!("expected array"),
        }
        let get = exec_one(&ex, &mut client, &mut db, "GET", &["k"]).unwrap();
        assert_eq!(get, Reply::Bulk(Bytes::from("1")));
    }

    #[test]
    fn exec_without_multi_errors() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        let err = exec_one(&ex, &mut client, &mut db, "EXEC", &[]).unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));
    }

    #[test]
    fn queuing_an_unknown_command_marks_dirty_and_execabort() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        exec_one(&ex, &mut client, &mut db, "MULTI", &[]).unwrap();
        exec_one(&ex, &mut client, &mut db, "NOTACOMMAND", &[]).unwrap_err();
        let err = exec_one(&ex, &mut client, &mut db, "EXEC", &[]).unwrap_err();
        assert!(matches!(err, Error::ExecAbort));
    }

    #[test]
    fn watch_then_concurrent_write_aborts_exec() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        exec_one(&ex, &mut client, &mut db, "SET", &["a", "1"]).unwrap();
        exec_one(&ex, &mut client, &mut db, "WATCH", &["a"]).unwrap();

        // A different connection writes the watched key behind our back.
        let mut other = ClientState::new(0);
        exec_one(&ex, &mut other, &mut db, "SET", &["a", "2"]).unwrap();

        exec_one(&ex, &mut client, &mut db, "MULTI", &[]).unwrap();
        exec_one(&ex, &mut client, &mut db, "INCR", &["a"]).unwrap();
        let reply = exec_one(&ex, &mut client, &mut db, "EXEC", &[]).unwrap();
        assert_eq!(reply, Reply::Nil, "a concurrent write must abort the transaction");
    }

    #[test]
    fn denyoom_write_rejected_over_maxmemory() {
        let ex = Executor::new(Some(10));
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        let args = vec![Bytes::from("k"), Bytes::from("v")];
        let mut propagate = Vec::new();
        let err = ex
            .execute(&mut client, &mut db, 0, 100, false, "SET", args, &mut propagate)
            .unwrap_err();
        assert_eq!(err.token(), "OOM");
    }

    #[test]
    fn failed_command_inside_exec_embeds_as_error_reply_not_abort() {
        let ex = Executor::new(None);
        let mut client = ClientState::new(0);
        let mut db = Database::new();
        exec_one(&ex, &mut client, &mut db, "SET", &["k", "not-a-number"]).unwrap();
        exec_one(&ex, &mut client, &mut db, "MULTI", &[]).unwrap();
        exec_one(&ex, &mut client, &mut db, "INCR", &["k"]).unwrap();
        exec_one(&ex, &mut client, &mut db, "GET", &["k"]).unwrap();
        let reply = exec_one(&ex, &mut client, &mut db, "EXEC", &[]).unwrap();
        match reply {
            Reply::Array(items) => {
                assert!(matches!(items[0], Reply::Error(_)));
                assert_eq!(items[1], Reply::Bulk(Bytes::from("not-a-number")));
            }
            _ => panic!("expected array"),
        }
    }
}
