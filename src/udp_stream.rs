//! UDP record relay
//!
//! Producers push text records onto a bounded queue without blocking; one
//! network thread drains the queue onto a UDP socket. A full queue drops
//! the record, a failed datagram is logged and skipped.

use crate::config::Destination;
use crate::error::{ForwarderError, ForwarderResult};
use crossbeam::channel::{bounded, select, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Slots in the outbound queue
pub const QUEUE_CAPACITY: usize = 30;

/// Optional observer for warnings, one call per event
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

fn report(sink: Option<&LogSink>, message: &str) {
    warn!("{}", message);
    if let Some(sink) = sink {
        sink(message);
    }
}

#[derive(Debug, Default)]
pub struct RelayStats {
    enqueued: AtomicU64,
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatsSnapshot {
    pub enqueued: u64,
    pub sent: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the bounded record queue
pub struct RelayQueue {
    tx: Sender<String>,
    stats: Arc<RelayStats>,
    sink: Option<LogSink>,
}

impl RelayQueue {
    pub fn bounded(
        capacity: usize,
        stats: Arc<RelayStats>,
        sink: Option<LogSink>,
    ) -> (Self, Receiver<String>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx, stats, sink }, rx)
    }

    /// Queue a record without blocking; false if it was not queued
    pub fn offer(&self, record: String) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                report(self.sink.as_ref(), "Failed to send: network queue full");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Relay stopped, record discarded");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

struct NetworkWorker {
    socket: UdpSocket,
    destination: SocketAddr,
    queue_rx: Receiver<String>,
    stop_rx: Receiver<()>,
    running: Arc<AtomicBool>,
    stats: Arc<RelayStats>,
    sink: Option<LogSink>,
}

impl NetworkWorker {
    fn run(self) {
        while self.running.load(Ordering::Acquire) {
            select! {
                recv(self.stop_rx) -> _ => break,
                recv(self.queue_rx) -> message => match message {
                    Ok(record) => self.transmit(&record),
                    Err(_) => break,
                },
            }
        }
        // Remaining records are discarded, the socket closes on drop
        debug!(
            "Network thread for {} exiting with {} records queued",
            self.destination,
            self.queue_rx.len()
        );
    }

    fn transmit(&self, record: &str) {
        match self.socket.send_to(record.as_bytes(), self.destination) {
            Ok(_) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                report(
                    self.sink.as_ref(),
                    &format!("Failed to send to {}: {}", self.destination, e),
                );
            }
        }
    }
}

/// Best-effort UDP relay to a single destination.
///
/// The destination is fixed for the relay's lifetime; open a new relay to
/// change it.
pub struct UdpRelay {
    destination: Destination,
    local_addr: SocketAddr,
    queue: RelayQueue,
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RelayStats>,
}

impl UdpRelay {
    pub fn open(destination: Destination) -> ForwarderResult<Self> {
        Self::open_with_sink(destination, None)
    }

    /// Bind an ephemeral socket and start the network thread
    pub fn open_with_sink(destination: Destination, sink: Option<LogSink>) -> ForwarderResult<Self> {
        let target = destination.addr();
        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).map_err(|e| {
            ForwarderError::SocketError(format!("Failed to bind UDP socket: {}", e))
        })?;
        let local_addr = socket.local_addr().map_err(|e| {
            ForwarderError::SocketError(format!("Failed to read local address: {}", e))
        })?;

        let stats = Arc::new(RelayStats::default());
        let running = Arc::new(AtomicBool::new(true));
        let (queue, queue_rx) = RelayQueue::bounded(QUEUE_CAPACITY, stats.clone(), sink.clone());
        let (stop_tx, stop_rx) = bounded(1);

        let worker = NetworkWorker {
            socket,
            destination: target,
            queue_rx,
            stop_rx,
            running: running.clone(),
            stats: stats.clone(),
            sink,
        };
        let handle = thread::Builder::new()
            .name("udp-relay".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                ForwarderError::Internal(format!("Failed to start network thread: {}", e))
            })?;

        info!("UDP relay {} -> {}", local_addr, target);

        Ok(Self {
            destination,
            local_addr,
            queue,
            stop_tx,
            running,
            worker: Mutex::new(Some(handle)),
            stats,
        })
    }

    /// Queue a record for transmission.
    ///
    /// Never blocks. Returns false when the record was dropped because the
    /// queue is full or the relay is stopped.
    pub fn send<S: Into<String>>(&self, text: S) -> bool {
        if !self.is_running() {
            return false;
        }
        self.queue.offer(text.into())
    }

    /// Stop the network thread and wait for it; queued records are discarded
    pub fn stop(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        self.running.store(false, Ordering::Release);
        let _ = self.stop_tx.try_send(());

        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("Network thread for {} panicked", self.destination);
        }
        info!("UDP relay to {} stopped", self.destination);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for UdpRelay {
    fn drop(&mut self) {
        self.stop();
    }
}
