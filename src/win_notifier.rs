//! Fire-and-forget Win datagrams.

use std::net::{SocketAddr, UdpSocket};

use anyhow::Context;
use tracing::{info, instrument};

use crate::configuration::Configuration;
use crate::team::Team;
use crate::wire::Message;

/// Tells a vehicle its team won a round.
///
/// One datagram per win, no acknowledgment and no retry. A duplicated datagram gives the
/// vehicle one extra ramp step; that risk is accepted.
#[derive(Debug)]
pub struct WinNotifier {
    socket: UdpSocket,
    destinations: [SocketAddr; 2],
}

impl WinNotifier {
    /// Create a notifier on an ephemeral, non-blocking UDP socket.
    pub fn new(config: &Configuration) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("could not bind win socket")?;
        socket
            .set_nonblocking(true)
            .context("could not make win socket non-blocking")?;
        Ok(Self {
            socket,
            destinations: config.destinations,
        })
    }

    /// Send `"WIN"` to the vehicle of `team`.
    ///
    /// # Errors
    /// Returned when the datagram could not be handed to the network. Nothing is retried.
    #[instrument(skip(self))]
    pub fn notify(&self, team: Team) -> anyhow::Result<()> {
        let destination = self.destinations[team.index()];
        self.socket
            .send_to(Message::Win.encode().as_bytes(), destination)
            .with_context(|| format!("could not send win to {team} at {destination}"))?;
        info!(%destination, "win sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn win_goes_to_the_winner_only() {
        let rx_a = UdpSocket::bind("127.0.0.1:0").unwrap();
        let rx_b = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx_a.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        rx_b.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let config = Configuration::new()
            .with_destination(Team::A, rx_a.local_addr().unwrap())
            .with_destination(Team::B, rx_b.local_addr().unwrap());

        let notifier = WinNotifier::new(&config).unwrap();
        notifier.notify(Team::A).unwrap();

        let mut buf = [0; 16];
        let (n, _) = rx_a.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"WIN");
        assert!(rx_b.recv_from(&mut buf).is_err());
    }
}
