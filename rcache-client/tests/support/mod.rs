//! In-process fake store speaking RESP2 over TCP.
//!
//! Implements the command subset the client issues, with store-like
//! semantics (empty containers vanish, WRONGTYPE on shape mismatch, lazy
//! expiry). Several servers can share one keyspace to model a primary with
//! read replicas.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rcache_client::{CacheClient, CacheConfig, Endpoint};

enum Data {
    Str(Vec<u8>),
    List(Vec<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    /// Kept sorted by (score, member).
    ZSet(Vec<(f64, Vec<u8>)>),
}

struct Entry {
    data: Data,
    expires_at_ms: Option<i64>,
}

#[derive(Default)]
pub struct Keyspace {
    entries: HashMap<Vec<u8>, Entry>,
}

type Shared = Arc<Mutex<Keyspace>>;

pub struct FakeStore {
    port: u16,
    keyspace: Shared,
    accepted: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeStore {
    pub fn start() -> Self {
        Self::spawn(Arc::new(Mutex::new(Keyspace::default())), None, None)
    }

    /// Hangs up each connection after `replies` replies, like a store
    /// enforcing an idle timeout.
    pub fn closing_after(replies: usize) -> Self {
        Self::spawn(Arc::new(Mutex::new(Keyspace::default())), None, Some(replies))
    }

    /// Requires `AUTH password` before any other command.
    pub fn with_password(password: &str) -> Self {
        Self::spawn(
            Arc::new(Mutex::new(Keyspace::default())),
            Some(password.to_string()),
            None,
        )
    }

    /// A second server answering from the same keyspace.
    pub fn replica(&self) -> Self {
        Self::spawn(self.keyspace.clone(), None, None)
    }

    fn spawn(keyspace: Shared, password: Option<String>, close_after: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));

        let server = FakeStore {
            port,
            keyspace: keyspace.clone(),
            accepted: accepted.clone(),
            log: log.clone(),
        };

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accepted.fetch_add(1, Ordering::SeqCst);
                let keyspace = keyspace.clone();
                let log = log.clone();
                let password = password.clone();
                thread::spawn(move || serve(stream, keyspace, log, password, close_after));
            }
        });

        server
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port)
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Every command received, as lossy UTF-8 strings.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.log.lock().clone()
    }

    /// Names of the commands received, in order.
    pub fn command_names(&self) -> Vec<String> {
        self.log.lock().iter().map(|cmd| cmd[0].clone()).collect()
    }

    /// Raw bytes of a string key, bypassing the client.
    pub fn raw_string(&self, key: &str) -> Option<Vec<u8>> {
        let mut keyspace = self.keyspace.lock();
        match keyspace.live(key.as_bytes()).map(|entry| &entry.data) {
            Some(Data::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Config pointing both pools at `rw` (and `ro` when given).
pub fn config_for(rw: &FakeStore, ro: Option<&FakeStore>) -> CacheConfig {
    CacheConfig {
        read_write_hosts: vec![rw.endpoint()],
        read_only_hosts: ro.map(|ro| vec![ro.endpoint()]).unwrap_or_default(),
        connect_timeout: Some(std::time::Duration::from_secs(1)),
        read_timeout: Some(std::time::Duration::from_secs(2)),
        write_timeout: Some(std::time::Duration::from_secs(2)),
        ..CacheConfig::default()
    }
}

pub fn client_for(store: &FakeStore) -> CacheClient {
    init_tracing();
    CacheClient::new(&config_for(store, None)).expect("client")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

impl Keyspace {
    fn live(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let expired = matches!(
            self.entries.get(key),
            Some(Entry { expires_at_ms: Some(at), .. }) if *at <= now_ms()
        );
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn drop_if_empty(&mut self, key: &[u8]) {
        let empty = match self.entries.get(key).map(|entry| &entry.data) {
            Some(Data::List(items)) => items.is_empty(),
            Some(Data::Set(items)) => items.is_empty(),
            Some(Data::Hash(items)) => items.is_empty(),
            Some(Data::ZSet(items)) => items.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }
}

enum Reply {
    Simple(&'static str),
    Error(String),
    Int(i64),
    Bulk(Option<Vec<u8>>),
    Array(Vec<Vec<u8>>),
}

fn wrongtype() -> Reply {
    Reply::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
}

fn serve(
    stream: TcpStream,
    keyspace: Shared,
    log: Arc<Mutex<Vec<Vec<String>>>>,
    password: Option<String>,
    close_after: Option<usize>,
) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);
    let mut authed = password.is_none();
    let mut replies = 0;

    while let Ok(Some(args)) = read_command(&mut reader) {
        log.lock()
            .push(args.iter().map(|a| String::from_utf8_lossy(a).into_owned()).collect());

        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        let reply = if name == "AUTH" {
            if password.as_deref().map(str::as_bytes) == args.get(1).map(Vec::as_slice) {
                authed = true;
                Reply::Simple("OK")
            } else {
                Reply::Error("WRONGPASS invalid password".into())
            }
        } else if !authed {
            Reply::Error("NOAUTH Authentication required.".into())
        } else {
            dispatch(&name, &args[1..], &mut keyspace.lock())
        };

        if writer.write_all(&encode(&reply)).is_err() {
            break;
        }
        replies += 1;
        if close_after == Some(replies) {
            break;
        }
    }
}

fn dispatch(name: &str, args: &[Vec<u8>], ks: &mut Keyspace) -> Reply {
    let key = match args.first() {
        Some(key) => key.clone(),
        None if name == "PING" => return Reply::Simple("PONG"),
        None => return Reply::Error(format!("ERR wrong number of arguments for '{name}'")),
    };

    match name {
        "GET" => match ks.live(&key).map(|e| &e.data) {
            None => Reply::Bulk(None),
            Some(Data::Str(value)) => Reply::Bulk(Some(value.clone())),
            Some(_) => wrongtype(),
        },
        "SET" => {
            let mut expires_at_ms = None;
            let mut idx = 2;
            while idx + 1 < args.len() {
                let amount = int(&args[idx + 1]);
                match String::from_utf8_lossy(&args[idx]).to_ascii_uppercase().as_str() {
                    "PX" if amount > 0 => expires_at_ms = Some(now_ms() + amount),
                    "EX" if amount > 0 => expires_at_ms = Some(now_ms() + amount * 1000),
                    _ => return Reply::Error("ERR invalid expire time in 'set' command".into()),
                }
                idx += 2;
            }
            ks.entries.insert(
                key,
                Entry {
                    data: Data::Str(args[1].clone()),
                    expires_at_ms,
                },
            );
            Reply::Simple("OK")
        }
        "DEL" => {
            let existed = ks.live(&key).is_some();
            ks.entries.remove(&key);
            Reply::Int(existed as i64)
        }
        "EXISTS" => Reply::Int(ks.live(&key).is_some() as i64),
        "PEXPIREAT" => {
            let at = int(&args[1]);
            let existed = match ks.live(&key) {
                Some(entry) => {
                    entry.expires_at_ms = Some(at);
                    true
                }
                None => false,
            };
            // A timestamp in the past removes the key right away.
            ks.live(&key);
            Reply::Int(existed as i64)
        }
        "PTTL" => match ks.live(&key) {
            None => Reply::Int(-2),
            Some(Entry { expires_at_ms: None, .. }) => Reply::Int(-1),
            Some(Entry { expires_at_ms: Some(at), .. }) => Reply::Int((*at - now_ms()).max(0)),
        },
        "RPUSH" | "LREM" | "LLEN" | "LRANGE" => list_command(name, key, args, ks),
        "SADD" | "SISMEMBER" | "SREM" | "SMEMBERS" | "SCARD" => set_command(name, key, args, ks),
        "HEXISTS" | "HSET" | "HDEL" | "HGET" | "HVALS" | "HLEN" => hash_command(name, key, args, ks),
        "ZADD" | "ZREM" | "ZREMRANGEBYRANK" | "ZCARD" | "ZRANGE" => zset_command(name, key, args, ks),
        _ => Reply::Error(format!("ERR unknown command '{name}'")),
    }
}

fn list_command(name: &str, key: Vec<u8>, args: &[Vec<u8>], ks: &mut Keyspace) -> Reply {
    if name == "RPUSH" && ks.live(&key).is_none() {
        ks.entries.insert(
            key.clone(),
            Entry {
                data: Data::List(Vec::new()),
                expires_at_ms: None,
            },
        );
    }
    let items = match ks.live(&key).map(|e| &mut e.data) {
        None => Vec::new(),
        Some(Data::List(items)) => std::mem::take(items),
        Some(_) => return wrongtype(),
    };
    let mut items = items;

    let reply = match name {
        "RPUSH" => {
            items.extend(args[1..].iter().cloned());
            Reply::Int(items.len() as i64)
        }
        "LREM" => {
            let before = items.len();
            items.retain(|item| item != &args[2]);
            Reply::Int((before - items.len()) as i64)
        }
        "LLEN" => Reply::Int(items.len() as i64),
        _ => Reply::Array(slice_range(&items, int(&args[1]), int(&args[2]))),
    };

    if let Some(Entry { data: Data::List(slot), .. }) = ks.live(&key) {
        *slot = items;
    }
    ks.drop_if_empty(&key);
    reply
}

fn set_command(name: &str, key: Vec<u8>, args: &[Vec<u8>], ks: &mut Keyspace) -> Reply {
    if name == "SADD" && ks.live(&key).is_none() {
        ks.entries.insert(
            key.clone(),
            Entry {
                data: Data::Set(BTreeSet::new()),
                expires_at_ms: None,
            },
        );
    }
    let mut empty = BTreeSet::new();
    let items = match ks.live(&key).map(|e| &mut e.data) {
        None => &mut empty,
        Some(Data::Set(items)) => items,
        Some(_) => return wrongtype(),
    };

    let reply = match name {
        "SADD" => Reply::Int(items.insert(args[1].clone()) as i64),
        "SISMEMBER" => Reply::Int(items.contains(&args[1]) as i64),
        "SREM" => Reply::Int(items.remove(&args[1]) as i64),
        "SMEMBERS" => Reply::Array(items.iter().cloned().collect()),
        _ => Reply::Int(items.len() as i64),
    };
    ks.drop_if_empty(&key);
    reply
}

fn hash_command(name: &str, key: Vec<u8>, args: &[Vec<u8>], ks: &mut Keyspace) -> Reply {
    if name == "HSET" && ks.live(&key).is_none() {
        ks.entries.insert(
            key.clone(),
            Entry {
                data: Data::Hash(BTreeMap::new()),
                expires_at_ms: None,
            },
        );
    }
    let mut empty = BTreeMap::new();
    let fields = match ks.live(&key).map(|e| &mut e.data) {
        None => &mut empty,
        Some(Data::Hash(fields)) => fields,
        Some(_) => return wrongtype(),
    };

    let reply = match name {
        "HEXISTS" => Reply::Int(fields.contains_key(&args[1]) as i64),
        "HSET" => Reply::Int(fields.insert(args[1].clone(), args[2].clone()).is_none() as i64),
        "HDEL" => Reply::Int(fields.remove(&args[1]).is_some() as i64),
        "HGET" => Reply::Bulk(fields.get(&args[1]).cloned()),
        "HVALS" => Reply::Array(fields.values().cloned().collect()),
        _ => Reply::Int(fields.len() as i64),
    };
    ks.drop_if_empty(&key);
    reply
}

fn zset_command(name: &str, key: Vec<u8>, args: &[Vec<u8>], ks: &mut Keyspace) -> Reply {
    if name == "ZADD" && ks.live(&key).is_none() {
        ks.entries.insert(
            key.clone(),
            Entry {
                data: Data::ZSet(Vec::new()),
                expires_at_ms: None,
            },
        );
    }
    let mut empty = Vec::new();
    let members = match ks.live(&key).map(|e| &mut e.data) {
        None => &mut empty,
        Some(Data::ZSet(members)) => members,
        Some(_) => return wrongtype(),
    };

    let reply = match name {
        "ZADD" => {
            let score: f64 = String::from_utf8_lossy(&args[1]).parse().unwrap_or(0.0);
            let member = args[2].clone();
            let existed = members.iter().position(|(_, m)| *m == member);
            if let Some(idx) = existed {
                members.remove(idx);
            }
            members.push((score, member));
            members.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            Reply::Int(existed.is_none() as i64)
        }
        "ZREM" => {
            let before = members.len();
            members.retain(|(_, m)| *m != args[1]);
            Reply::Int((before - members.len()) as i64)
        }
        "ZREMRANGEBYRANK" => {
            let ranked: Vec<Vec<u8>> = members.iter().map(|(_, m)| m.clone()).collect();
            let doomed = slice_range(&ranked, int(&args[1]), int(&args[2]));
            members.retain(|(_, m)| !doomed.contains(m));
            Reply::Int(doomed.len() as i64)
        }
        "ZCARD" => Reply::Int(members.len() as i64),
        _ => {
            let ranked: Vec<Vec<u8>> = members.iter().map(|(_, m)| m.clone()).collect();
            Reply::Array(slice_range(&ranked, int(&args[1]), int(&args[2])))
        }
    };
    ks.drop_if_empty(&key);
    reply
}

/// Inclusive index range with negative-from-the-end semantics.
fn slice_range(items: &[Vec<u8>], start: i64, stop: i64) -> Vec<Vec<u8>> {
    let len = items.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return Vec::new();
    }
    items[start as usize..=stop as usize].to_vec()
}

fn int(arg: &[u8]) -> i64 {
    String::from_utf8_lossy(arg).parse().unwrap_or(0)
}

fn encode(reply: &Reply) -> Vec<u8> {
    fn bulk(out: &mut Vec<u8>, data: &[u8]) {
        out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
    }

    let mut out = Vec::new();
    match reply {
        Reply::Simple(text) => out.extend_from_slice(format!("+{text}\r\n").as_bytes()),
        Reply::Error(text) => out.extend_from_slice(format!("-{text}\r\n").as_bytes()),
        Reply::Int(value) => out.extend_from_slice(format!(":{value}\r\n").as_bytes()),
        Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Reply::Bulk(Some(data)) => bulk(&mut out, data),
        Reply::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                bulk(&mut out, item);
            }
        }
    }
    out
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<Vec<u8>>>> {
    let mut line = Vec::new();
    if !read_line(reader, &mut line)? {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        if !read_line(reader, &mut line)? || line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid("missing crlf"));
        }
        data.truncate(len);
        args.push(data);
    }
    if args.is_empty() {
        return Err(invalid("empty command"));
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }
    if !buf.ends_with(b"\r\n") {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(true)
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    String::from_utf8_lossy(data)
        .parse()
        .map_err(|_| invalid("bad length"))
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}
