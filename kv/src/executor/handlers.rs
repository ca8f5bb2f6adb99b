//! Command handlers (spec §4.7 "concrete command surface", `SPEC_FULL.md`
//! §4.7). Each handler receives the already-key-resolved [`ExecCtx`] and the
//! full argument vector (including the command name at index 0) and
//! returns the reply plus whether the command actually mutated the
//! keyspace (used by the caller to decide whether to propagate and to
//! bump `dirty`, spec §4.7 "Propagation").

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use indexmap::IndexMap;

use crate::error::{CResult, Error};
use crate::executor::reply::Reply;
use crate::keyspace::db::Lookup;
use crate::keyspace::entry::{AccessMeta, Entry};
use crate::value::{EncodingThresholds, SortedSet, Value, ValueData};

use super::ExecCtx;

pub struct Outcome {
    pub reply: Reply,
    pub dirty: bool,
}

fn ok(reply: Reply) -> CResult<Outcome> {
    Ok(Outcome { reply, dirty: false })
}

fn wrote(reply: Reply) -> CResult<Outcome> {
    Ok(Outcome { reply, dirty: true })
}

fn parse_int(b: &Bytes) -> CResult<i64> {
    std::str::from_utf8(b).ok().and_then(|s| s.parse::<i64>().ok()).ok_or(Error::NotAnInteger)
}

fn parse_score(b: &Bytes) -> CResult<f64> {
    let s = std::str::from_utf8(b).map_err(|_| Error::NotAnInteger)?;
    match s {
        "-inf" | "-Inf" | "-INF" => Ok(f64::NEG_INFINITY),
        "+inf" | "+Inf" | "+INF" | "inf" | "Inf" | "INF" => Ok(f64::INFINITY),
        _ => s.parse::<f64>().map_err(|_| Error::NotAnInteger),
    }
}

/// Looks up `key`, firing an expired entry through the normal delete path
/// first (spec §4.2 `lookupKey` contract: `Expired` obliges the caller to
/// fire it). Returns `None` if the key doesn't exist (or just expired).
fn lookup_live(ctx: &mut ExecCtx, key: &Bytes) -> Option<Entry> {
    match ctx.db.lookup(key, ctx.now_ms) {
        Lookup::Found(e) => {
            ctx.db.touch(key, ctx.now_secs);
            Some(e)
        }
        Lookup::Expired => {
            ctx.db.delete(key, ctx.now_ms);
            None
        }
        Lookup::NotFound => None,
    }
}

fn new_meta(ctx: &ExecCtx) -> AccessMeta {
    if ctx.use_lfu {
        AccessMeta::new_lfu((ctx.now_ms / 60_000) as u16)
    } else {
        AccessMeta::new_lru(ctx.now_secs)
    }
}

fn wrong_type() -> Error {
    Error::WrongType
}

pub fn dispatch(ctx: &mut ExecCtx, name: &str, args: &[Bytes]) -> CResult<Outcome> {
    match name {
        "PING" => ping(args),
        "GET" => get(ctx, args),
        "SET" => set(ctx, args),
        "GETEX" => getex(ctx, args),
        "DEL" => del(ctx, args),
        "EXISTS" => exists(ctx, args),
        "EXPIRE" => expire(ctx, args, 1_000),
        "PEXPIRE" => expire(ctx, args, 1),
        "TTL" => ttl(ctx, args, 1_000),
        "PTTL" => ttl(ctx, args, 1),
        "PERSIST" => persist(ctx, args),
        "INCR" => incr_by(ctx, args, 1),
        "DECR" => incr_by(ctx, args, -1),
        "INCRBY" => incrby(ctx, args),
        "TYPE" => type_cmd(ctx, args),
        "DBSIZE" => ok(Reply::Integer(ctx.db.db_size() as i64)),
        "FLUSHDB" => {
            ctx.db.flush();
            wrote(Reply::ok())
        }
        "LPUSH" => list_push(ctx, args, true),
        "RPUSH" => list_push(ctx, args, false),
        "LRANGE" => lrange(ctx, args),
        "LLEN" => llen(ctx, args),
        "LPOP" => list_pop(ctx, args, true),
        "RPOP" => list_pop(ctx, args, false),
        "HSET" => hset(ctx, args),
        "HGET" => hget(ctx, args),
        "HDEL" => hdel(ctx, args),
        "HGETALL" => hgetall(ctx, args),
        "HLEN" => hlen(ctx, args),
        "SADD" => sadd(ctx, args),
        "SREM" => srem(ctx, args),
        "SCARD" => scard(ctx, args),
        "SISMEMBER" => sismember(ctx, args),
        "SMEMBERS" => smembers(ctx, args),
        "ZADD" => zadd(ctx, args),
        "ZSCORE" => zscore(ctx, args),
        "ZRANGEBYSCORE" => zrangebyscore(ctx, args),
        "ZCARD" => zcard(ctx, args),
        "ZREM" => zrem(ctx, args),
        _ => Err(Error::Protocol(format!("unknown command '{name}'"))),
    }
}

fn ping(args: &[Bytes]) -> CResult<Outcome> {
    match args.len() {
        1 => ok(Reply::SimpleString("PONG")),
        2 => ok(Reply::Bulk(args[1].clone())),
        _ => Err(Error::Protocol("wrong number of arguments for 'ping' command".into())),
    }
}

fn get(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let key = &args[1];
    match lookup_live(ctx, key) {
        None => ok(Reply::Nil),
        Some(e) => match &e.value.data {
            ValueData::Str(s) => ok(Reply::Bulk(s.clone())),
            _ => Err(wrong_type()),
        },
    }
}

struct SetOptions {
    nx: bool,
    xx: bool,
    get: bool,
    expire_at_ms: Option<i64>,
    keep_ttl: bool,
}

fn parse_set_options(args: &[Bytes], now_ms: i64) -> CResult<SetOptions> {
    let mut opts = SetOptions { nx: false, xx: false, get: false, expire_at_ms: None, keep_ttl: false };
    let mut i = 3;
    while i < args.len() {
        let tok = String::from_utf8_lossy(&args[i]).to_ascii_uppercase();
        match tok.as_str() {
            "NX" => opts.nx = true,
            "XX" => opts.xx = true,
            "GET" => opts.get = true,
            "KEEPTTL" => opts.keep_ttl = true,
            "EX" | "PX" => {
                i += 1;
                let raw = args.get(i).ok_or_else(|| Error::Protocol("syntax error".into()))?;
                let n = parse_int(raw)?;
                let ms = if tok == "EX" { n.saturating_mul(1000) } else { n };
                opts.expire_at_ms = Some(now_ms.saturating_add(ms));
            }
            "EXAT" | "PXAT" => {
                i += 1;
                let raw = args.get(i).ok_or_else(|| Error::Protocol("syntax error".into()))?;
                let n = parse_int(raw)?;
                opts.expire_at_ms = Some(if tok == "EXAT" { n.saturating_mul(1000) } else { n });
            }
            _ => return Err(Error::Protocol("syntax error".into())),
        }
        i += 1;
    }
    Ok(opts)
}

fn set(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments for 'set' command".into()));
    }
    let key = args[1].clone();
    let value_bytes = args[2].clone();
    let opts = parse_set_options(args, ctx.now_ms)?;

    let existing = lookup_live(ctx, &key);
    if opts.nx && existing.is_some() {
        return ok(if opts.get { reply_of_existing(&existing) } else { Reply::Nil });
    }
    if opts.xx && existing.is_none() {
        return ok(if opts.get { Reply::Nil } else { Reply::Nil });
    }
    if opts.get {
        if let Some(e) = &existing {
            if !matches!(e.value.data, ValueData::Str(_)) {
                return Err(wrong_type());
            }
        }
    }

    let old_reply = if opts.get { reply_of_existing(&existing) } else { Reply::ok() };

    let meta = existing.as_ref().map(|e| e.meta).unwrap_or_else(|| new_meta(ctx));
    let value = Value::from_str(value_bytes);
    ctx.db.set(key.clone(), Entry::new(value, meta));

    if opts.keep_ttl {
        // leave whatever expiry, if any, already existed
    } else {
        ctx.db.expiry.remove_expire(&key, None);
    }
    if let Some(at) = opts.expire_at_ms {
        ctx.db.expiry.set_expire(key, None, at);
    }

    Ok(Outcome { reply: old_reply, dirty: true })
}

fn reply_of_existing(existing: &Option<Entry>) -> Reply {
    match existing {
        Some(e) => match &e.value.data {
            ValueData::Str(s) => Reply::Bulk(s.clone()),
            _ => Reply::Nil,
        },
        None => Reply::Nil,
    }
}

fn getex(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 2 {
        return Err(Error::Protocol("wrong number of arguments for 'getex' command".into()));
    }
    let key = args[1].clone();
    let Some(entry) = lookup_live(ctx, &key) else { return ok(Reply::Nil) };
    let ValueData::Str(s) = &entry.value.data else { return Err(wrong_type()) };
    let reply = Reply::Bulk(s.clone());

    let mut dirty = false;
    let mut i = 2;
    while i < args.len() {
        let tok = String::from_utf8_lossy(&args[i]).to_ascii_uppercase();
        match tok.as_str() {
            "PERSIST" => {
                ctx.db.expiry.remove_expire(&key, None);
                dirty = true;
            }
            "EX" | "PX" => {
                i += 1;
                let raw = args.get(i).ok_or_else(|| Error::Protocol("syntax error".into()))?;
                let n = parse_int(raw)?;
                let ms = if tok == "EX" { n.saturating_mul(1000) } else { n };
                ctx.db.expiry.set_expire(key.clone(), None, ctx.now_ms.saturating_add(ms));
                dirty = true;
            }
            _ => return Err(Error::Protocol("syntax error".into())),
        }
        i += 1;
    }
    Ok(Outcome { reply, dirty })
}

fn del(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let mut removed = 0i64;
    for key in &args[1..] {
        if lookup_live(ctx, key).is_some() && ctx.db.delete(key, ctx.now_ms) {
            removed += 1;
        }
    }
    Ok(Outcome { reply: Reply::Integer(removed), dirty: removed > 0 })
}

fn exists(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let mut count = 0i64;
    for key in &args[1..] {
        if lookup_live(ctx, key).is_some() {
            count += 1;
        }
    }
    ok(Reply::Integer(count))
}

fn expire(ctx: &mut ExecCtx, args: &[Bytes], unit_ms: i64) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments".into()));
    }
    let key = args[1].clone();
    let amount = parse_int(&args[2])?;
    if lookup_live(ctx, &key).is_none() {
        return ok(Reply::Integer(0));
    }
    let at = ctx.now_ms.saturating_add(amount.saturating_mul(unit_ms));
    ctx.db.expiry.set_expire(key, None, at);
    wrote(Reply::Integer(1))
}

fn ttl(ctx: &mut ExecCtx, args: &[Bytes], unit_ms: i64) -> CResult<Outcome> {
    let key = &args[1];
    if lookup_live(ctx, key).is_none() {
        return ok(Reply::Integer(-2));
    }
    match ctx.db.expiry.ttl_ms(key, ctx.now_ms) {
        None => ok(Reply::Integer(-1)),
        Some(ms) => ok(Reply::Integer(ms / unit_ms)),
    }
}

fn persist(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let key = &args[1];
    if lookup_live(ctx, key).is_none() {
        return ok(Reply::Integer(0));
    }
    let had_ttl = ctx.db.expiry.peek_next_expiry(key).is_some();
    ctx.db.expiry.remove_expire(key, None);
    Ok(Outcome { reply: Reply::Integer(if had_ttl { 1 } else { 0 }), dirty: had_ttl })
}

fn incrby(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() != 3 {
        return Err(Error::Protocol("wrong number of arguments for 'incrby' command".into()));
    }
    let delta = parse_int(&args[2])?;
    incr_key(ctx, &args[1], delta)
}

fn incr_by(ctx: &mut ExecCtx, args: &[Bytes], delta: i64) -> CResult<Outcome> {
    if args.len() != 2 {
        return Err(Error::Protocol("wrong number of arguments".into()));
    }
    incr_key(ctx, &args[1], delta)
}

fn incr_key(ctx: &mut ExecCtx, key: &Bytes, delta: i64) -> CResult<Outcome> {
    let existing = lookup_live(ctx, key);
    let (current, meta) = match &existing {
        Some(e) => {
            let ValueData::Str(s) = &e.value.data else { return Err(wrong_type()) };
            (parse_int(s)?, e.meta)
        }
        None => (0, new_meta(ctx)),
    };
    let updated = current.checked_add(delta).ok_or_else(|| {
        Error::Protocol("increment or decrement would overflow".into())
    })?;
    ctx.db.set(key.clone(), Entry::new(Value::from_str(updated.to_string()), meta));
    wrote(Reply::Integer(updated))
}

fn type_cmd(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    match lookup_live(ctx, &args[1]) {
        None => ok(Reply::SimpleString("none")),
        Some(e) => ok(Reply::SimpleString(type_name_static(e.value.data.type_name()))),
    }
}

fn type_name_static(name: &'static str) -> &'static str {
    name
}

fn require_list<'a>(entry: &'a Entry) -> CResult<&'a VecDeque<Bytes>> {
    match &entry.value.data {
        ValueData::List(l) => Ok(l),
        _ => Err(wrong_type()),
    }
}

fn list_push(ctx: &mut ExecCtx, args: &[Bytes], front: bool) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments".into()));
    }
    let key = args[1].clone();
    let existing = lookup_live(ctx, &key);
    let mut list = match &existing {
        Some(e) => require_list(e)?.clone(),
        None => VecDeque::new(),
    };
    for item in &args[2..] {
        if front {
            list.push_front(item.clone());
        } else {
            list.push_back(item.clone());
        }
    }
    let meta = existing.as_ref().map(|e| e.meta).unwrap_or_else(|| new_meta(ctx));
    let len = list.len();
    let value = Value::from_list(list, &EncodingThresholds::default());
    ctx.db.set(key, Entry::new(value, meta));
    wrote(Reply::Integer(len as i64))
}

fn list_index(len: i64, idx: i64) -> i64 {
    if idx < 0 {
        (len + idx).max(0)
    } else {
        idx
    }
}

fn lrange(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() != 4 {
        return Err(Error::Protocol("wrong number of arguments for 'lrange' command".into()));
    }
    let start = parse_int(&args[2])?;
    let stop = parse_int(&args[3])?;
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Array(vec![])) };
    let list = require_list(&entry)?;
    let len = list.len() as i64;
    let start = list_index(len, start).min(len);
    let stop = (list_index(len, stop) + 1).min(len);
    let items = if start >= stop {
        vec![]
    } else {
        list.iter().skip(start as usize).take((stop - start) as usize).map(|b| Reply::Bulk(b.clone())).collect()
    };
    ok(Reply::Array(items))
}

fn llen(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    match lookup_live(ctx, &args[1]) {
        None => ok(Reply::Integer(0)),
        Some(e) => ok(Reply::Integer(require_list(&e)?.len() as i64)),
    }
}

fn list_pop(ctx: &mut ExecCtx, args: &[Bytes], front: bool) -> CResult<Outcome> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::Protocol("wrong number of arguments".into()));
    }
    let key = args[1].clone();
    let count = match args.get(2) {
        Some(b) => parse_int(b)?.max(0) as usize,
        None => 1,
    };
    let wants_array = args.len() == 3;
    let Some(entry) = lookup_live(ctx, &key) else {
        return ok(if wants_array { Reply::Nil } else { Reply::Nil });
    };
    let mut list = require_list(&entry)?.clone();
    let mut popped = Vec::new();
    for _ in 0..count.max(1) {
        let item = if front { list.pop_front() } else { list.pop_back() };
        match item {
            Some(b) => popped.push(b),
            None => break,
        }
    }
    if popped.is_empty() {
        return ok(Reply::Nil);
    }
    if list.is_empty() {
        ctx.db.delete(&key, ctx.now_ms);
    } else {
        let value = Value::from_list(list, &EncodingThresholds::default());
        ctx.db.set(key, Entry::new(value, entry.meta));
    }
    let reply = if wants_array {
        Reply::Array(popped.into_iter().map(Reply::Bulk).collect())
    } else {
        Reply::Bulk(popped.into_iter().next().unwrap())
    };
    wrote(reply)
}

fn require_hash<'a>(entry: &'a Entry) -> CResult<&'a IndexMap<Bytes, Bytes>> {
    match &entry.value.data {
        ValueData::Hash(h) => Ok(h),
        _ => Err(wrong_type()),
    }
}

fn hset(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(Error::Protocol("wrong number of arguments for 'hset' command".into()));
    }
    let key = args[1].clone();
    let existing = lookup_live(ctx, &key);
    let mut map = match &existing {
        Some(e) => require_hash(e)?.clone(),
        None => IndexMap::new(),
    };
    let mut added = 0i64;
    let mut i = 2;
    while i + 1 < args.len() {
        if map.insert(args[i].clone(), args[i + 1].clone()).is_none() {
            added += 1;
        }
        i += 2;
    }
    let meta = existing.as_ref().map(|e| e.meta).unwrap_or_else(|| new_meta(ctx));
    let value = Value::from_hash(map, &EncodingThresholds::default());
    ctx.db.set(key, Entry::new(value, meta));
    wrote(Reply::Integer(added))
}

fn hget(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Nil) };
    let map = require_hash(&entry)?;
    ok(match map.get(&args[2]) {
        Some(v) => Reply::Bulk(v.clone()),
        None => Reply::Nil,
    })
}

fn hdel(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments for 'hdel' command".into()));
    }
    let key = args[1].clone();
    let Some(entry) = lookup_live(ctx, &key) else { return ok(Reply::Integer(0)) };
    let mut map = require_hash(&entry)?.clone();
    let mut removed = 0i64;
    for field in &args[2..] {
        if map.shift_remove(field).is_some() {
            removed += 1;
        }
    }
    if removed == 0 {
        return ok(Reply::Integer(0));
    }
    if map.is_empty() {
        ctx.db.delete(&key, ctx.now_ms);
    } else {
        let value = Value::from_hash(map, &EncodingThresholds::default());
        ctx.db.set(key, Entry::new(value, entry.meta));
    }
    wrote(Reply::Integer(removed))
}

fn hgetall(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Array(vec![])) };
    let map = require_hash(&entry)?;
    let mut out = Vec::with_capacity(map.len() * 2);
    for (k, v) in map {
        out.push(Reply::Bulk(k.clone()));
        out.push(Reply::Bulk(v.clone()));
    }
    ok(Reply::Array(out))
}

fn hlen(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    match lookup_live(ctx, &args[1]) {
        None => ok(Reply::Integer(0)),
        Some(e) => ok(Reply::Integer(require_hash(&e)?.len() as i64)),
    }
}

fn require_set<'a>(entry: &'a Entry) -> CResult<&'a HashSet<Bytes>> {
    match &entry.value.data {
        ValueData::Set(s) => Ok(s),
        _ => Err(wrong_type()),
    }
}

fn sadd(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments for 'sadd' command".into()));
    }
    let key = args[1].clone();
    let existing = lookup_live(ctx, &key);
    let mut set = match &existing {
        Some(e) => require_set(e)?.clone(),
        None => HashSet::new(),
    };
    let mut added = 0i64;
    for m in &args[2..] {
        if set.insert(m.clone()) {
            added += 1;
        }
    }
    if added == 0 && existing.is_some() {
        return ok(Reply::Integer(0));
    }
    let meta = existing.as_ref().map(|e| e.meta).unwrap_or_else(|| new_meta(ctx));
    ctx.db.set(key, Entry::new(Value::from_set(set), meta));
    wrote(Reply::Integer(added))
}

fn srem(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments for 'srem' command".into()));
    }
    let key = args[1].clone();
    let Some(entry) = lookup_live(ctx, &key) else { return ok(Reply::Integer(0)) };
    let mut set = require_set(&entry)?.clone();
    let mut removed = 0i64;
    for m in &args[2..] {
        if set.remove(m) {
            removed += 1;
        }
    }
    if removed == 0 {
        return ok(Reply::Integer(0));
    }
    if set.is_empty() {
        ctx.db.delete(&key, ctx.now_ms);
    } else {
        ctx.db.set(key, Entry::new(Value::from_set(set), entry.meta));
    }
    wrote(Reply::Integer(removed))
}

fn scard(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    match lookup_live(ctx, &args[1]) {
        None => ok(Reply::Integer(0)),
        Some(e) => ok(Reply::Integer(require_set(&e)?.len() as i64)),
    }
}

fn sismember(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Integer(0)) };
    let set = require_set(&entry)?;
    ok(Reply::from_bool(set.contains(&args[2])))
}

fn smembers(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Array(vec![])) };
    let set = require_set(&entry)?;
    ok(Reply::Array(set.iter().cloned().map(Reply::Bulk).collect()))
}

fn require_zset<'a>(entry: &'a Entry) -> CResult<&'a SortedSet> {
    match &entry.value.data {
        ValueData::ZSet(z) => Ok(z),
        _ => Err(wrong_type()),
    }
}

fn zadd(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(Error::Protocol("wrong number of arguments for 'zadd' command".into()));
    }
    let key = args[1].clone();
    let existing = lookup_live(ctx, &key);
    let mut zset = match &existing {
        Some(e) => require_zset(e)?.clone(),
        None => SortedSet::new(),
    };
    let mut added = 0i64;
    let mut i = 2;
    while i + 1 < args.len() {
        let score = parse_score(&args[i])?;
        if zset.insert(args[i + 1].clone(), score) {
            added += 1;
        }
        i += 2;
    }
    let meta = existing.as_ref().map(|e| e.meta).unwrap_or_else(|| new_meta(ctx));
    ctx.db.set(key, Entry::new(Value::from_zset(zset, &EncodingThresholds::default()), meta));
    wrote(Reply::Integer(added))
}

fn zscore(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Nil) };
    let zset = require_zset(&entry)?;
    ok(match zset.score(&args[2]) {
        Some(s) => Reply::Double(s),
        None => Reply::Nil,
    })
}

fn zrangebyscore(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() != 4 {
        return Err(Error::Protocol("wrong number of arguments for 'zrangebyscore' command".into()));
    }
    let min = parse_score(&args[2])?;
    let max = parse_score(&args[3])?;
    let Some(entry) = lookup_live(ctx, &args[1]) else { return ok(Reply::Array(vec![])) };
    let zset = require_zset(&entry)?;
    ok(Reply::Array(zset.range_by_score(min, max).into_iter().map(|(m, _)| Reply::Bulk(m)).collect()))
}

fn zcard(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    match lookup_live(ctx, &args[1]) {
        None => ok(Reply::Integer(0)),
        Some(e) => ok(Reply::Integer(require_zset(&e)?.len() as i64)),
    }
}

fn zrem(ctx: &mut ExecCtx, args: &[Bytes]) -> CResult<Outcome> {
    if args.len() < 3 {
        return Err(Error::Protocol("wrong number of arguments for 'zrem' command".into()));
    }
    let key = args[1].clone();
    let Some(entry) = lookup_live(ctx, &key) else { return ok(Reply::Integer(0)) };
    let mut zset = require_zset(&entry)?.clone();
    let mut removed = 0i64;
    for m in &args[2..] {
        if zset.remove(m) {
            removed += 1;
        }
    }
    if removed == 0 {
        return ok(Reply::Integer(0));
    }
    if zset.is_empty() {
        ctx.db.delete(&key, ctx.now_ms);
    } else {
        ctx.db.set(key, Entry::new(Value::from_zset(zset, &EncodingThresholds::default()), entry.meta));
    }
    wrote(Reply::Integer(removed))
}
