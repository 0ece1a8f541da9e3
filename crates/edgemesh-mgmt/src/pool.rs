//! Fixed pool of connection slots driven by a readiness set
//!
//! The pool is single-threaded: one event loop waits for readiness over
//! every open slot and the listeners, then processes the batch. Load
//! shedding is built in: while every slot is occupied the listeners are
//! left unpolled and the short accept backlog turns new clients away.

use std::future::poll_fn;
use std::net::SocketAddr;
use std::task::Poll;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::config::MgmtConfig;
use crate::error::{MgmtError, MgmtResult};
use crate::listener::{self, Listener};
use crate::slot::{Slot, SlotState, SlotStream};

/// Maximum number of listening sockets per pool
pub const MAX_LISTENERS: usize = 4;

/// Wall-clock seconds, the unit slots record activity in
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Readiness observed by [`SlotPool::wait_ready`]
#[derive(Debug, Default)]
pub struct ReadyEvents {
    accepted: Vec<std::io::Result<SlotStream>>,
    readable: Vec<usize>,
    writable: Vec<usize>,
}

impl ReadyEvents {
    fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.readable.is_empty() && self.writable.is_empty()
    }
}

/// Fixed-size pool of management connection slots
#[derive(Debug)]
pub struct SlotPool {
    slots: Vec<Slot>,
    listeners: [Option<Listener>; MAX_LISTENERS],
    timeout: u64,
}

impl SlotPool {
    /// Build a pool. The slot count is fixed for the pool's lifetime.
    pub fn new(cfg: &MgmtConfig) -> MgmtResult<Self> {
        cfg.validate().map_err(MgmtError::Config)?;
        Ok(Self {
            slots: (0..cfg.slots).map(|_| Slot::new(cfg.request_max)).collect(),
            listeners: std::array::from_fn(|_| None),
            timeout: cfg.timeout_secs,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently holding a connection
    pub fn open_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_open()).count()
    }

    pub fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut Slot {
        &mut self.slots[index]
    }

    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut()
    }

    /// Add a TCP listener (dual-stack IPv6 with IPv4 fallback, backlog 1).
    pub fn listen_tcp(&mut self, port: u16, allow_remote: bool) -> MgmtResult<()> {
        let at = self.free_listener_slot()?;
        let listener = listener::listen_tcp(port, allow_remote)?;
        self.listeners[at] = Some(Listener::Tcp(listener));
        Ok(())
    }

    /// Add a listener on a filesystem path with optional mode and owner.
    #[cfg(unix)]
    pub fn listen_unix(
        &mut self,
        path: &std::path::Path,
        mode: Option<u32>,
        owner: Option<(u32, u32)>,
    ) -> MgmtResult<()> {
        let at = self.free_listener_slot()?;
        let listener = listener::listen_unix(path, mode, owner)?;
        self.listeners[at] = Some(Listener::Unix(listener));
        Ok(())
    }

    fn free_listener_slot(&self) -> MgmtResult<usize> {
        self.listeners
            .iter()
            .position(|l| l.is_none())
            .ok_or(MgmtError::ListenersFull)
    }

    /// Local addresses of the TCP listeners (useful after binding port 0)
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .flatten()
            .filter_map(|l| l.local_addr())
            .collect()
    }

    /// Drop every listening socket. Used during shutdown; established
    /// connections keep their slots.
    pub fn close_listeners(&mut self) {
        for listener in &mut self.listeners {
            *listener = None;
        }
    }

    /// Wait until at least one slot or listener is ready.
    ///
    /// Open slots are watched for readability, sending slots additionally
    /// for writability, and the listeners only while a slot is free.
    /// Ready listeners yield their accepted connection in the returned
    /// batch; seating it is [`SlotPool::process`]'s job.
    pub async fn wait_ready(&mut self) -> ReadyEvents {
        poll_fn(|cx| {
            let mut events = ReadyEvents::default();

            if self.open_slots() < self.slots.len() {
                for listener in self.listeners.iter().flatten() {
                    if let Poll::Ready(res) = listener.poll_accept(cx) {
                        events.accepted.push(res);
                    }
                }
            }

            for (i, slot) in self.slots.iter().enumerate() {
                let Some(stream) = slot.stream() else {
                    continue;
                };
                if stream.poll_read_ready(cx).is_ready() {
                    events.readable.push(i);
                }
                if slot.state() == SlotState::Sending && stream.poll_write_ready(cx).is_ready() {
                    events.writable.push(i);
                }
            }

            if events.is_empty() {
                Poll::Pending
            } else {
                Poll::Ready(events)
            }
        })
        .await
    }

    /// Handle one readiness batch.
    ///
    /// Accepted connections are seated first; each open slot is then
    /// read if readable, reaped on close or error, and written if
    /// writable. Returns the number of slots holding a complete request.
    pub fn process(&mut self, events: ReadyEvents) -> MgmtResult<usize> {
        let now = unix_now();

        for accepted in events.accepted {
            let stream = accepted?;
            self.seat(stream, now)?;
        }

        let mut nr_ready = 0;
        for i in 0..self.slots.len() {
            if !self.slots[i].is_open() {
                continue;
            }

            if events.readable.contains(&i) {
                self.slots[i].read_once(now);
            }

            match self.slots[i].state() {
                SlotState::Ready => nr_ready += 1,
                SlotState::Closed | SlotState::Error => {
                    trace!(slot = i, state = ?self.slots[i].state(), "closing slot");
                    self.slots[i].close();
                    continue;
                }
                _ => {}
            }

            if events.writable.contains(&i) && self.slots[i].state() == SlotState::Sending {
                self.slots[i].write_once(now);
            }
        }

        Ok(nr_ready)
    }

    /// Seat an accepted connection in the first free slot.
    fn seat(&mut self, stream: SlotStream, now: u64) -> MgmtResult<usize> {
        let Some(i) = self.slots.iter().position(|s| !s.is_open()) else {
            return Err(MgmtError::PoolFull);
        };
        self.slots[i].open(stream, now);
        trace!(slot = i, "accepted management connection");
        Ok(i)
    }

    /// Close every slot idle longer than the configured timeout.
    pub fn close_idle(&mut self, now: u64) -> usize {
        let mut nr_closed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_open() {
                continue;
            }
            if now.saturating_sub(slot.activity()) > self.timeout {
                debug!(slot = i, "closing idle management connection");
                slot.close();
                nr_closed += 1;
            }
        }
        nr_closed
    }
}
