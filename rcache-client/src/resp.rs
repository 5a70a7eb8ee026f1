//! # RESP2 Encoding and Parsing
//!
//! Purpose: Build outgoing commands and parse store replies with explicit
//! framing rules.
//!
//! ## Design Principles
//! 1. **Builder Pattern**: `Command` collects arguments, then encodes once.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.

use std::io::BufRead;

use rcache_common::{CacheError, CacheResult};

/// Largest bulk string accepted from the store (its `proto-max-bulk-len` default).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Upper bound on array slots reserved before the elements arrive.
const MAX_ARRAY_PREALLOC: i64 = 1024;

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays, with None for the null array.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Turns an error reply into `CacheError::Server`, passing others through.
    pub fn into_result(self) -> CacheResult<RespValue> {
        match self {
            RespValue::Error(message) => Err(CacheError::Server(
                String::from_utf8_lossy(&message).into_owned(),
            )),
            other => Ok(other),
        }
    }

    pub fn into_integer(self) -> CacheResult<i64> {
        match self.into_result()? {
            RespValue::Integer(value) => Ok(value),
            _ => Err(CacheError::UnexpectedResponse),
        }
    }

    /// Integer replies used as flags (`1` = true).
    pub fn into_flag(self) -> CacheResult<bool> {
        Ok(self.into_integer()? > 0)
    }

    /// Non-negative integer replies such as `LLEN` or `ZCARD`.
    pub fn into_count(self) -> CacheResult<u64> {
        let value = self.into_integer()?;
        u64::try_from(value).map_err(|_| CacheError::UnexpectedResponse)
    }

    pub fn into_bulk(self) -> CacheResult<Option<Vec<u8>>> {
        match self.into_result()? {
            RespValue::Bulk(data) => Ok(data),
            _ => Err(CacheError::UnexpectedResponse),
        }
    }

    /// Array of bulk strings; a null array reads as empty.
    pub fn into_bulk_array(self) -> CacheResult<Vec<Vec<u8>>> {
        match self.into_result()? {
            RespValue::Array(None) => Ok(Vec::new()),
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(Some(data)) => Ok(data),
                    _ => Err(CacheError::UnexpectedResponse),
                })
                .collect(),
            _ => Err(CacheError::UnexpectedResponse),
        }
    }

    /// `+OK` acknowledgement; `SET` with `NX`/`XX` may answer null instead.
    pub fn into_ok(self) -> CacheResult<bool> {
        match self.into_result()? {
            RespValue::Simple(_) => Ok(true),
            RespValue::Bulk(None) => Ok(false),
            _ => Err(CacheError::UnexpectedResponse),
        }
    }
}

/// A command under construction.
///
/// ```
/// use rcache_client::resp::Command;
///
/// let mut buf = Vec::new();
/// Command::new("GET").arg("key").encode_into(&mut buf);
/// assert_eq!(&buf, b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Command {
            args: vec![name.as_bytes().to_vec()],
        }
    }

    /// Appends a binary-safe argument.
    pub fn arg(mut self, value: impl AsRef<[u8]>) -> Self {
        self.args.push(value.as_ref().to_vec());
        self
    }

    /// Appends an integer argument in decimal form.
    pub fn arg_int(self, value: i64) -> Self {
        self.arg(value.to_string())
    }

    /// Appends a float argument (sorted-set scores).
    pub fn arg_float(self, value: f64) -> Self {
        let text = if value == f64::INFINITY {
            "+inf".to_string()
        } else if value == f64::NEG_INFINITY {
            "-inf".to_string()
        } else {
            value.to_string()
        };
        self.arg(text)
    }

    /// Command name, for logging.
    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.args[0]).unwrap_or("?")
    }

    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    /// Encodes the command as a RESP2 array of bulk strings.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(b'*');
        push_usize(out, self.args.len());
        out.extend_from_slice(b"\r\n");
        for arg in &self.args {
            out.push(b'$');
            push_usize(out, arg.len());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(arg);
            out.extend_from_slice(b"\r\n");
        }
    }
}

/// Reads one RESP value from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> CacheResult<RespValue> {
    read_line(reader, line_buf)?;
    if line_buf.is_empty() {
        return Err(CacheError::Protocol("empty reply line"));
    }

    match line_buf[0] {
        b'+' => Ok(RespValue::Simple(line_buf[1..].to_vec())),
        b'-' => Ok(RespValue::Error(line_buf[1..].to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            read_array(reader, len, line_buf)
        }
        _ => Err(CacheError::Protocol("unknown reply type")),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> CacheResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }
    if len > MAX_BULK_LEN {
        return Err(CacheError::Protocol("bulk length out of range"));
    }
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != [b'\r', b'\n'] {
        return Err(CacheError::Protocol("bulk string missing CRLF"));
    }
    Ok(RespValue::Bulk(Some(data)))
}

fn read_array<R: BufRead>(reader: &mut R, len: i64, line_buf: &mut Vec<u8>) -> CacheResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Array(None));
    }

    let mut items = Vec::with_capacity(len.min(MAX_ARRAY_PREALLOC) as usize);
    for _ in 0..len {
        items.push(read_response(reader, line_buf)?);
    }
    Ok(RespValue::Array(Some(items)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> CacheResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(CacheError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by store",
        )));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(CacheError::Protocol("line missing CRLF"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> CacheResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(CacheError::Protocol("invalid integer"))
}

fn push_usize(out: &mut Vec<u8>, value: usize) {
    let mut buf = [0u8; 20];
    let mut len = 0;
    let mut rest = value;
    loop {
        buf[len] = b'0' + (rest % 10) as u8;
        rest /= 10;
        len += 1;
        if rest == 0 {
            break;
        }
    }
    out.extend(buf[..len].iter().rev());
}
