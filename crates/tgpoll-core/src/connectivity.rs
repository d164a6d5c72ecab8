//! Link state reported by whatever brings the network up.

use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    Up,
    Down,
}

/// Receiving side of the "connectivity established / lost" signal.
#[derive(Clone, Debug)]
pub struct Connectivity {
    rx: watch::Receiver<Link>,
}

impl Connectivity {
    /// A signal plus the sender used to flip it.
    pub fn channel(initial: Link) -> (watch::Sender<Link>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self { rx })
    }

    /// For hosts where the network is managed elsewhere.
    pub fn always_up() -> Self {
        let (tx, this) = Self::channel(Link::Up);
        // Keep the value readable after the sender is gone.
        drop(tx);
        this
    }

    pub fn is_up(&self) -> bool {
        *self.rx.borrow() == Link::Up
    }

    /// Resolve once the link is up. If the sender is dropped while the link
    /// is down, this never resolves.
    pub async fn wait_up(&mut self) {
        if self.is_up() {
            return;
        }
        if self.rx.wait_for(|link| *link == Link::Up).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
