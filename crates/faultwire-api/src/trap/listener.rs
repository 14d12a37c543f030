//! UDP trap receiver.
//!
//! A single task owns the socket; decoded traps are forwarded over a bounded
//! channel, undecodable datagrams are logged and dropped.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ber::{TrapPdu, decode_trap};
use crate::error::Error;

/// Largest possible UDP payload.
const MAX_DATAGRAM: usize = 65_535;

/// Default SNMP trap port.
pub const DEFAULT_TRAP_PORT: u16 = 162;

/// Listener parameters.
#[derive(Debug, Clone)]
pub struct TrapSettings {
    pub bind: SocketAddr,
    /// When set, traps carrying any other community string are dropped.
    pub community: Option<String>,
}

/// One accepted trap.
#[derive(Debug, Clone)]
pub struct TrapMessage {
    pub peer: SocketAddr,
    pub pdu: TrapPdu,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

pub struct TrapListener {
    settings: TrapSettings,
    running: Mutex<Option<Running>>,
}

impl TrapListener {
    pub fn new(settings: TrapSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &TrapSettings {
        &self.settings
    }

    /// Bind the socket and spawn the receive task.
    ///
    /// Returns the bound address and whether this call spawned the task.
    /// While a task is alive the existing address comes back with `false`
    /// and `events` is dropped unused.
    pub async fn start(
        &self,
        events: mpsc::Sender<TrapMessage>,
    ) -> Result<(SocketAddr, bool), Error> {
        let mut running = self.running.lock().await;
        if let Some(r) = running.as_ref() {
            if !r.handle.is_finished() {
                debug!(addr = %r.local_addr, "trap listener already running");
                return Ok((r.local_addr, false));
            }
        }

        let socket = UdpSocket::bind(self.settings.bind).await?;
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, "trap listener bound");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(receive_loop(
            socket,
            self.settings.community.clone(),
            events,
            cancel.clone(),
        ));
        *running = Some(Running {
            cancel,
            handle,
            local_addr,
        });
        Ok((local_addr, true))
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Address of the live socket, if any.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .await
            .as_ref()
            .filter(|r| !r.handle.is_finished())
            .map(|r| r.local_addr)
    }

    /// Close the socket. Idempotent.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some(Running { cancel, handle, .. }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "trap task ended abnormally");
            }
            info!("trap listener stopped");
        }
    }
}

impl Drop for TrapListener {
    fn drop(&mut self) {
        if let Some(r) = self.running.get_mut().take() {
            r.cancel.cancel();
        }
    }
}

/// Check that `addr` can be bound right now, releasing it immediately.
pub async fn check_bind(addr: SocketAddr) -> Result<SocketAddr, Error> {
    let socket = UdpSocket::bind(addr).await?;
    Ok(socket.local_addr()?)
}

async fn receive_loop(
    socket: UdpSocket,
    community: Option<String>,
    events: mpsc::Sender<TrapMessage>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0_u8; MAX_DATAGRAM];

    loop {
        let (len, peer) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "trap receive failed");
                    continue;
                }
            },
        };

        let pdu = match decode_trap(&buf[..len]) {
            Ok(pdu) => pdu,
            Err(e) => {
                warn!(%peer, len, error = %e, "dropping undecodable trap datagram");
                continue;
            }
        };

        if let Some(expected) = community.as_deref() {
            if pdu.community != expected {
                warn!(%peer, community = %pdu.community, "dropping trap with unexpected community");
                continue;
            }
        }

        debug!(%peer, kind = ?pdu.kind, varbinds = pdu.varbinds.len(), "trap received");
        if events.send(TrapMessage { peer, pdu }).await.is_err() {
            break;
        }
    }

    debug!("trap loop exiting");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::trap::ber::tests::{octets, v2_trap, varbind};

    fn loopback() -> TrapSettings {
        TrapSettings {
            bind: "127.0.0.1:0".parse().unwrap(),
            community: None,
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<TrapMessage>) -> Option<TrapMessage> {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn forwards_decoded_traps_and_skips_garbage() {
        let listener = TrapListener::new(loopback());
        let (tx, mut rx) = mpsc::channel(8);
        let (addr, spawned) = listener.start(tx).await.unwrap();
        assert!(spawned);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"not ber at all", addr).await.unwrap();
        let trap = v2_trap("public", &[varbind("1.3.6.1.4.1.56789.1.1.1", octets("A-1"))]);
        sender.send_to(&trap, addr).await.unwrap();

        let message = recv(&mut rx).await.expect("trap forwarded");
        assert_eq!(message.pdu.community, "public");
        assert_eq!(message.pdu.varbinds[0].value.to_string(), "A-1");
        assert_eq!(message.peer, sender.local_addr().unwrap());

        listener.stop().await;
        assert!(!listener.is_running().await);
    }

    #[tokio::test]
    async fn community_filter_drops_foreign_traps() {
        let listener = TrapListener::new(TrapSettings {
            community: Some("secret".into()),
            ..loopback()
        });
        let (tx, mut rx) = mpsc::channel(8);
        let (addr, _) = listener.start(tx).await.unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let wrong = v2_trap("public", &[varbind("1.3.6.1.4.1.56789.1.1.1", octets("A-1"))]);
        let right = v2_trap("secret", &[varbind("1.3.6.1.4.1.56789.1.1.1", octets("A-2"))]);
        sender.send_to(&wrong, addr).await.unwrap();
        sender.send_to(&right, addr).await.unwrap();

        let message = recv(&mut rx).await.expect("trap forwarded");
        assert_eq!(message.pdu.varbinds[0].value.to_string(), "A-2");
        listener.stop().await;
    }

    #[tokio::test]
    async fn second_start_reuses_socket() {
        let listener = TrapListener::new(loopback());
        let (tx, _rx) = mpsc::channel(8);
        let (first, spawned_first) = listener.start(tx.clone()).await.unwrap();
        let (second, spawned_second) = listener.start(tx).await.unwrap();
        assert!(spawned_first);
        assert!(!spawned_second);
        assert_eq!(first, second);
        assert_eq!(listener.local_addr().await, Some(first));

        listener.stop().await;
        listener.stop().await;
        assert_eq!(listener.local_addr().await, None);
    }

    #[tokio::test]
    async fn check_bind_reports_taken_port() {
        let held = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap();
        assert!(check_bind(addr).await.is_err());
        assert!(check_bind("127.0.0.1:0".parse().unwrap()).await.is_ok());
    }
}
