//! A single management connection slot
//!
//! Each slot owns one accepted connection and walks it through a small
//! state machine: buffer a request until the HTTP/1.x framing says it is
//! complete, hand it to the application, then stream the attached reply
//! back out. All socket I/O is non-blocking; the pool decides when a
//! slot gets to read or write.

use std::io::IoSlice;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

/// How much buffer space a single read may add
const READ_CHUNK: usize = 512;

const HEADER_END: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &[u8] = b"Content-Length:";

/// Slot lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// No request in flight (the slot may still hold an open connection)
    Empty,
    /// Partway through buffering a request
    Reading,
    /// A complete request is buffered and awaits the application's reply
    Ready,
    /// A reply is attached and being written out
    Sending,
    /// Peer shut the connection down
    Closed,
    /// Transport error or oversized request; dead until closed
    Error,
}

/// Either transport a slot can carry
#[derive(Debug)]
pub(crate) enum SlotStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl SlotStream {
    fn try_read_buf(&self, buf: &mut BytesMut) -> std::io::Result<usize> {
        match self {
            SlotStream::Tcp(s) => s.try_read_buf(buf),
            #[cfg(unix)]
            SlotStream::Unix(s) => s.try_read_buf(buf),
        }
    }

    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> std::io::Result<usize> {
        match self {
            SlotStream::Tcp(s) => s.try_write_vectored(bufs),
            #[cfg(unix)]
            SlotStream::Unix(s) => s.try_write_vectored(bufs),
        }
    }

    pub(crate) fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self {
            SlotStream::Tcp(s) => s.poll_read_ready(cx),
            #[cfg(unix)]
            SlotStream::Unix(s) => s.poll_read_ready(cx),
        }
    }

    pub(crate) fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self {
            SlotStream::Tcp(s) => s.poll_write_ready(cx),
            #[cfg(unix)]
            SlotStream::Unix(s) => s.poll_write_ready(cx),
        }
    }
}

/// One connection slot
#[derive(Debug)]
pub struct Slot {
    stream: Option<SlotStream>,
    state: SlotState,
    request: BytesMut,
    reply_header: Bytes,
    reply: Bytes,
    reply_sendpos: usize,
    /// Cached total request length once the header has been parsed; 0
    /// means not yet known
    expected: usize,
    /// Wall-clock second of the last successful read or write
    activity: u64,
    request_max: usize,
}

impl Slot {
    pub(crate) fn new(request_max: usize) -> Self {
        Self {
            stream: None,
            state: SlotState::Empty,
            request: BytesMut::with_capacity(48),
            reply_header: Bytes::new(),
            reply: Bytes::new(),
            reply_sendpos: 0,
            expected: 0,
            activity: 0,
            request_max,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Wall-clock second of the last activity on this slot
    pub fn activity(&self) -> u64 {
        self.activity
    }

    /// The buffered request bytes
    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// Detach the request bytes, e.g. to reuse them as the reply body
    /// without copying.
    pub fn take_request(&mut self) -> Bytes {
        self.expected = 0;
        self.request.split().freeze()
    }

    /// Attach a reply. The slot streams it out, header first, as the
    /// connection becomes writable.
    pub fn send_reply(&mut self, header: Bytes, body: Bytes) {
        self.reply_header = header;
        self.reply = body;
        self.reply_sendpos = 0;
        self.state = SlotState::Sending;
    }

    pub(crate) fn stream(&self) -> Option<&SlotStream> {
        self.stream.as_ref()
    }

    /// Seat an accepted connection.
    pub(crate) fn open(&mut self, stream: SlotStream, now: u64) {
        self.stream = Some(stream);
        self.state = SlotState::Empty;
        self.activity = now;
    }

    /// Drop the connection and reset all request/reply state.
    pub(crate) fn close(&mut self) {
        self.stream = None;
        self.state = SlotState::Empty;
        self.request.clear();
        self.reply_header = Bytes::new();
        self.reply = Bytes::new();
        self.reply_sendpos = 0;
        self.expected = 0;
        self.activity = 0;
    }

    /// One non-blocking read plus framing.
    ///
    /// Drives `READING` to `READY` (complete request), `CLOSED`
    /// (zero-byte read), `ERROR` (transport error or oversized request)
    /// or back to `EMPTY` (spurious readiness).
    pub(crate) fn read_once(&mut self, now: u64) {
        let Some(stream) = &self.stream else {
            return;
        };
        self.state = SlotState::Reading;

        // a maxed-out request can never complete; also guarantees the
        // buffer below has spare room, so a zero read means peer shutdown
        if self.request.len() >= self.request_max {
            self.state = SlotState::Error;
            return;
        }
        if self.request.capacity() == self.request.len() {
            let room = READ_CHUNK.min(self.request_max - self.request.len());
            self.request.reserve(room);
        }

        match stream.try_read_buf(&mut self.request) {
            Ok(0) => {
                self.state = SlotState::Closed;
            }
            Ok(_) => {
                self.activity = now;
                self.advance_framing();
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.state = SlotState::Empty;
            }
            Err(_) => {
                self.state = SlotState::Error;
            }
        }
    }

    /// Check whether the buffered bytes form a complete request.
    fn advance_framing(&mut self) {
        if self.request.len() < HEADER_END.len() {
            return;
        }

        if self.expected == 0 {
            let Some(at) = find(&self.request, HEADER_END) else {
                if self.request.len() >= self.request_max {
                    self.state = SlotState::Error;
                }
                return;
            };
            let body_pos = at + HEADER_END.len();

            let expected = match find(&self.request[..body_pos], CONTENT_LENGTH) {
                None => body_pos,
                Some(at) => body_pos.saturating_add(parse_content_length(
                    &self.request[at + CONTENT_LENGTH.len()..body_pos],
                )),
            };

            if expected > self.request_max {
                self.state = SlotState::Error;
                return;
            }
            self.expected = expected;
        }

        if self.request.len() >= self.expected {
            self.state = SlotState::Ready;
            self.expected = 0;
        }
    }

    /// One vectored write of the remaining reply-header tail and body.
    ///
    /// Drives `SENDING` to `EMPTY` once the send cursor reaches the total
    /// reply length; the request buffer is cleared with it so the
    /// connection can carry the next request.
    pub(crate) fn write_once(&mut self, now: u64) {
        let Some(stream) = &self.stream else {
            return;
        };
        self.state = SlotState::Sending;

        let header_len = self.reply_header.len();
        let total = header_len + self.reply.len();

        let mut bufs: Vec<IoSlice<'_>> = Vec::with_capacity(2);
        let mut reply_pos = 0;
        if self.reply_sendpos < header_len {
            bufs.push(IoSlice::new(&self.reply_header[self.reply_sendpos..]));
        } else {
            reply_pos = self.reply_sendpos - header_len;
        }
        if reply_pos < self.reply.len() {
            bufs.push(IoSlice::new(&self.reply[reply_pos..]));
        }

        let sent = match stream.try_write_vectored(&bufs) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(_) => {
                self.state = SlotState::Error;
                return;
            }
        };

        self.reply_sendpos += sent;
        self.activity = now;

        if self.reply_sendpos >= total {
            self.state = SlotState::Empty;
            self.reply_sendpos = 0;
            self.reply_header = Bytes::new();
            self.reply = Bytes::new();
            self.request.clear();
            self.expected = 0;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decimal value after the field name, `strtoul`-style: leading
/// whitespace skipped, digits until the first non-digit, saturating.
fn parse_content_length(s: &[u8]) -> usize {
    let mut value = 0usize;
    let mut seen_digit = false;
    for &b in s {
        match b {
            b' ' | b'\t' if !seen_digit => continue,
            b'0'..=b'9' => {
                seen_digit = true;
                value = value.saturating_mul(10).saturating_add((b - b'0') as usize);
            }
            _ => break,
        }
    }
    value
}
