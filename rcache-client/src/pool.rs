//! # Connection Pool
//!
//! Purpose: Reuse TCP connections to the store, split into a read-write
//! pool and a read-only pool, each bounded by its own slot limit.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections per mode.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections
//!    or adjusting counts; connects and I/O happen outside it.
//! 3. **Bounded Wait**: A full pool blocks on a condvar up to the acquire
//!    timeout, then fails with `PoolExhausted`.
//! 4. **Round-Robin**: New connections rotate across a mode's endpoints,
//!    skipping endpoints that refuse.
//! 5. **Checked Reuse**: An idle connection the store has since closed is
//!    dropped at checkout and its slot reused; commands are never resent.
//!
//! ## Structure Overview
//!
//! ```text
//! PoolManager
//!   ├── write: EndpointPool (read_write_hosts, max_write_pool_size)
//!   └── read:  EndpointPool (read_only_hosts or read_write_hosts, max_read_pool_size)
//!         └── inner: Arc<PoolInner>
//!               ├── endpoints + cursor: AtomicUsize
//!               ├── state: Mutex<PoolState { idle, live, closed }>
//!               └── available: Condvar
//! ```

use std::collections::VecDeque;
use std::io::{BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use rcache_common::{AccessMode, CacheConfig, CacheError, CacheResult, Endpoint, PoolStats};

use crate::resp::{read_response, Command, RespValue};

/// Settings shared by every connection of one mode.
#[derive(Debug, Clone)]
struct PoolSettings {
    mode: AccessMode,
    endpoints: Vec<Endpoint>,
    max_live: usize,
    acquire_timeout: Duration,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

struct PoolState {
    idle: VecDeque<Connection>,
    /// Idle plus checked-out connections; never above `max_live`.
    live: usize,
    closed: bool,
}

struct PoolInner {
    settings: PoolSettings,
    cursor: AtomicUsize,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Bounded pool of connections to one endpoint set.
#[derive(Clone)]
struct EndpointPool {
    inner: Arc<PoolInner>,
}

impl EndpointPool {
    fn new(settings: PoolSettings) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(settings.max_live),
            live: 0,
            closed: false,
        };
        EndpointPool {
            inner: Arc::new(PoolInner {
                settings,
                cursor: AtomicUsize::new(0),
                state: Mutex::new(state),
                available: Condvar::new(),
            }),
        }
    }

    fn acquire(&self) -> CacheResult<PooledConnection> {
        let settings = &self.inner.settings;
        let deadline = Instant::now() + settings.acquire_timeout;

        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(CacheError::PoolClosed);
            }
            while let Some(conn) = state.idle.pop_front() {
                if conn.is_open() {
                    return Ok(PooledConnection::new(self.inner.clone(), conn));
                }
                debug!(mode = %settings.mode, endpoint = %conn.endpoint, "dropping idle connection closed by store");
                state.live = state.live.saturating_sub(1);
                self.inner.available.notify_one();
            }
            if state.live < settings.max_live {
                state.live += 1;
                break;
            }
            if self.inner.available.wait_until(&mut state, deadline).timed_out()
                && state.idle.is_empty()
                && state.live >= settings.max_live
                && !state.closed
            {
                debug!(mode = %settings.mode, max = settings.max_live, "acquire timed out");
                return Err(CacheError::PoolExhausted {
                    mode: settings.mode,
                    max: settings.max_live,
                });
            }
        }
        drop(state);

        // Slot reserved; connect without holding the lock.
        match self.connect_round_robin() {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.inner.release_slot();
                Err(err)
            }
        }
    }

    fn connect_round_robin(&self) -> CacheResult<Connection> {
        let settings = &self.inner.settings;
        let endpoints = &settings.endpoints;
        let start = self.inner.cursor.fetch_add(1, Ordering::Relaxed);

        let mut last = String::from("no endpoints configured");
        for offset in 0..endpoints.len() {
            let endpoint = &endpoints[(start + offset) % endpoints.len()];
            match Connection::connect(endpoint, settings) {
                Ok(conn) => {
                    debug!(mode = %settings.mode, %endpoint, "opened connection");
                    return Ok(conn);
                }
                Err(err) => {
                    warn!(mode = %settings.mode, %endpoint, error = %err, "endpoint unreachable");
                    last = err.to_string();
                }
            }
        }

        Err(CacheError::Connectivity {
            mode: settings.mode,
            attempted: endpoints.len(),
            last,
        })
    }

    fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        let dropped = state.idle.len();
        state.idle.clear();
        state.live = state.live.saturating_sub(dropped);
        drop(state);
        self.inner.available.notify_all();
    }

    fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            idle: state.idle.len(),
            in_use: state.live - state.idle.len(),
            max: self.inner.settings.max_live,
        }
    }
}

impl PoolInner {
    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.live = state.live.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.state.lock();
        if state.closed {
            state.live = state.live.saturating_sub(1);
        } else {
            state.idle.push_back(conn);
        }
        drop(state);
        self.available.notify_one();
    }
}

/// Owner of the read-write and read-only pools.
///
/// Constructed explicitly and shared by handle (`Clone` is cheap); call
/// `shutdown` to close idle connections and reject further acquires.
#[derive(Clone)]
pub struct PoolManager {
    write: EndpointPool,
    read: EndpointPool,
}

impl PoolManager {
    /// Creates both pools. No connection is opened until the first acquire.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let settings = |mode, endpoints: &[Endpoint], max_live| PoolSettings {
            mode,
            endpoints: endpoints.to_vec(),
            max_live,
            acquire_timeout: config.acquire_timeout,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };
        let write = EndpointPool::new(settings(
            AccessMode::ReadWrite,
            &config.read_write_hosts,
            config.max_write_pool_size,
        ));
        let read = EndpointPool::new(settings(
            AccessMode::ReadOnly,
            config.effective_read_hosts(),
            config.max_read_pool_size,
        ));

        info!(
            read_write = config.read_write_hosts.len(),
            read_only = config.read_only_hosts.len(),
            max_write = config.max_write_pool_size,
            max_read = config.max_read_pool_size,
            "connection pools created"
        );
        Ok(PoolManager { write, read })
    }

    /// Checks out a connection for `mode`, blocking up to the acquire timeout.
    pub fn acquire(&self, mode: AccessMode) -> CacheResult<PooledConnection> {
        self.pool(mode).acquire()
    }

    /// Closes idle connections and fails all later acquires with `PoolClosed`.
    ///
    /// Connections still checked out are closed when their handles drop.
    pub fn shutdown(&self) {
        self.write.shutdown();
        self.read.shutdown();
        info!("connection pools shut down");
    }

    pub fn stats(&self, mode: AccessMode) -> PoolStats {
        self.pool(mode).stats()
    }

    fn pool(&self, mode: AccessMode) -> &EndpointPool {
        match mode {
            AccessMode::ReadWrite => &self.write,
            AccessMode::ReadOnly => &self.read,
        }
    }
}

/// RAII wrapper returning a connection to its pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Sends one command and returns the parsed reply.
    ///
    /// Error replies come back as `RespValue::Error`; only transport or
    /// framing failures are `Err`, and those retire the connection.
    pub fn exec(&mut self, command: &Command) -> CacheResult<RespValue> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(CacheError::PoolClosed),
        };
        let response = conn.exec(command);
        if let Err(err) = &response {
            if err.poisons_connection() {
                self.valid = false;
            }
        }
        response
    }

    /// Endpoint this connection is attached to.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.conn.as_ref().map(|conn| &conn.endpoint)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        if self.valid {
            self.pool.return_connection(conn);
        } else {
            warn!(mode = %self.pool.settings.mode, endpoint = %conn.endpoint, "discarding broken connection");
            self.pool.release_slot();
        }
    }
}

/// Single TCP connection with reusable buffers.
struct Connection {
    endpoint: Endpoint,
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(endpoint: &Endpoint, settings: &PoolSettings) -> CacheResult<Self> {
        let stream = connect_stream(endpoint, settings.connect_timeout)?;
        stream.set_read_timeout(settings.read_timeout)?;
        stream.set_write_timeout(settings.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let mut conn = Connection {
            endpoint: endpoint.clone(),
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        };

        if let Some(password) = &endpoint.password {
            conn.exec(&Command::new("AUTH").arg(password))?.into_ok()?;
        }
        Ok(conn)
    }

    /// Whether the socket is still usable for a new request.
    ///
    /// An idle connection must have nothing to read: end-of-stream means the
    /// store hung up, and pending bytes would desync the next reply.
    fn is_open(&self) -> bool {
        if !self.reader.buffer().is_empty() {
            return false;
        }
        let stream = self.reader.get_ref();
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut byte = [0u8; 1];
        let open = matches!(stream.peek(&mut byte), Err(err) if err.kind() == ErrorKind::WouldBlock);
        stream.set_nonblocking(false).is_ok() && open
    }

    fn exec(&mut self, command: &Command) -> CacheResult<RespValue> {
        self.write_buf.clear();
        command.encode_into(&mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_stream(endpoint: &Endpoint, timeout: Option<Duration>) -> CacheResult<TcpStream> {
    let addrs: Vec<SocketAddr> = endpoint
        .address()
        .to_socket_addrs()
        .map_err(|_| CacheError::InvalidEndpoint(endpoint.to_string()))?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(match last_err {
        Some(err) => CacheError::Io(err),
        None => CacheError::InvalidEndpoint(endpoint.to_string()),
    })
}
