//! Minimal embedding example: answer management requests on loopback TCP
//! by echoing the request back as the reply body.
//!
//! Try it with: `curl -s http://127.0.0.1:5644/anything -d HELLO`

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use edgemesh_mgmt::{MgmtConfig, ReadyEvents, SlotPool, SlotState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut pool = SlotPool::new(&MgmtConfig::default())?;
    pool.listen_tcp(5644, false)?;
    println!("management echo listening on {:?}", pool.local_addrs());

    loop {
        // wake up periodically even when the pool is full and quiet, so
        // the idle reaper below always gets its turn
        let events = tokio::select! {
            events = pool.wait_ready() => events,
            _ = tokio::time::sleep(Duration::from_secs(5)) => ReadyEvents::default(),
        };
        match pool.process(events) {
            Ok(0) => {}
            Ok(_) => {
                for slot in pool.slots_mut() {
                    if slot.state() != SlotState::Ready {
                        continue;
                    }
                    let body = slot.take_request();
                    let header = format!(
                        "HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n",
                        body.len()
                    );
                    slot.send_reply(Bytes::from(header), body);
                }
            }
            Err(e) => warn!(error = %e, "reactor error"),
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        pool.close_idle(now);
    }
}
