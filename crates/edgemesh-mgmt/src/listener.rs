//! Listening socket construction
//!
//! TCP listeners prefer a dual-stack IPv6 socket (`IPV6_V6ONLY` off) and
//! fall back to IPv4 when the host cannot create one. The backlog is 1:
//! when the pool runs out of slots the listeners are simply not polled,
//! and the tiny kernel queue sheds the burst.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
#[cfg(unix)]
use std::path::Path;
use std::task::{Context, Poll};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::debug;

use crate::error::MgmtResult;
use crate::slot::SlotStream;

/// Either transport the pool can listen on
#[derive(Debug)]
pub(crate) enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    pub(crate) fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<std::io::Result<SlotStream>> {
        match self {
            Listener::Tcp(l) => l.poll_accept(cx).map_ok(|(stream, _)| SlotStream::Tcp(stream)),
            #[cfg(unix)]
            Listener::Unix(l) => l
                .poll_accept(cx)
                .map_ok(|(stream, _)| SlotStream::Unix(stream)),
        }
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(l) => l.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }
}

/// Build a TCP listener on `port`; loopback only unless `allow_remote`.
pub(crate) fn listen_tcp(port: u16, allow_remote: bool) -> MgmtResult<TcpListener> {
    let socket = match Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP)) {
        Ok(socket) => {
            socket.set_reuse_address(true)?;
            socket.set_only_v6(false)?;
            let ip = if allow_remote {
                Ipv6Addr::UNSPECIFIED
            } else {
                Ipv6Addr::LOCALHOST
            };
            socket.bind(&SocketAddr::from((ip, port)).into())?;
            socket
        }
        Err(err) => {
            debug!(error = %err, "no IPv6 socket on this host, trying IPv4");
            let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
            socket.set_reuse_address(true)?;
            let ip = if allow_remote {
                Ipv4Addr::UNSPECIFIED
            } else {
                Ipv4Addr::LOCALHOST
            };
            socket.bind(&SocketAddr::from((ip, port)).into())?;
            socket
        }
    };

    // backlog of 1 - low, but sheds load quickly once the slots are full
    socket.listen(1)?;
    socket.set_nonblocking(true)?;
    Ok(TcpListener::from_std(socket.into())?)
}

/// Build a listener on a filesystem path, replacing any stale socket.
#[cfg(unix)]
pub(crate) fn listen_unix(
    path: &Path,
    mode: Option<u32>,
    owner: Option<(u32, u32)>,
) -> MgmtResult<UnixListener> {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.bind(&socket2::SockAddr::unix(path)?)?;

    // mode and ownership fixups are best effort: they worked or they did not
    if let Some(mode) = mode {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode));
    }
    if let Some((uid, gid)) = owner {
        let _ = std::os::unix::fs::chown(path, Some(uid), Some(gid));
    }

    // backlog of 1 - low, but sheds load quickly once the slots are full
    socket.listen(1)?;
    socket.set_nonblocking(true)?;
    Ok(UnixListener::from_std(socket.into())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_listener_binds_ephemeral_port() {
        let listener = listen_tcp(0, false).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_loopback());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_listener_replaces_stale_path() {
        let path = std::env::temp_dir().join(format!("edgemesh-listener-{}.sock", std::process::id()));

        // a stale socket from a crashed process must not block the bind
        let first = listen_unix(&path, Some(0o600), None).unwrap();
        drop(first);
        let second = listen_unix(&path, Some(0o600), None);
        assert!(second.is_ok());

        drop(second);
        let _ = std::fs::remove_file(&path);
    }
}
