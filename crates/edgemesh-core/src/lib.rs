//! edgemesh runtime core
//!
//! Shared building blocks for edge nodes and supernodes:
//! - MAC and socket address types with the overlay's formatting rules
//! - the peer registry with MAC-or-socket reconciliation
//! - replay-protection time stamps
//! - background re-resolution of supernode hostnames
//!
//! The tunnel device, encryption transforms and the packet protocol live
//! in their own crates; this one only consumes sockets, a wall clock and
//! the runtime's name resolution.

pub mod clock;
pub mod error;
pub mod mac;
pub mod peers;
pub mod resolve;
pub mod sock;
pub mod util;

pub use clock::{unix_now, ReplayClock, TIME_STAMP_FRAME, TIME_STAMP_JITTER};
pub use error::{CoreError, CoreResult};
pub use mac::{Mac, MAC_SIZE};
pub use peers::{AddOutcome, AddPolicy, Peer, PeerRegistry, SelectionCriterion};
pub use resolve::{parse_supernode, resolve_supernode, ResolveConfig, Resolver};
pub use sock::{bitlen2mask, inaddrtoa, intoa, mask2bitlen, IpSubnet, SockAddr};
