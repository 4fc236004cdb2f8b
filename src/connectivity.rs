use std::future::Future;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::UdpSocket;
use tokio::time::{Instant, sleep, timeout};

use crate::error::ConnectivityError;
use crate::messages::ConnectivityState;

pub trait NetworkLink {
    fn begin_association(&mut self);

    /// May answer from cache.
    fn poll(&mut self) -> impl Future<Output = bool> + Send;

    fn check(&mut self) -> impl Future<Output = bool> + Send;
}

pub struct Monitor<L> {
    link: L,
    state: ConnectivityState,
    attempts: u32,
    poll_every: Duration,
}

impl<L: NetworkLink> Monitor<L> {
    pub fn new(link: L, attempts: u32, poll_every: Duration) -> Self {
        Monitor {
            link,
            state: ConnectivityState::Disconnected,
            attempts: attempts.max(1),
            poll_every,
        }
    }

    pub fn status(&self) -> ConnectivityState {
        self.state
    }

    pub async fn refresh(&mut self) -> ConnectivityState {
        let up = self.link.poll().await;
        let next = if up {
            ConnectivityState::Connected
        } else {
            ConnectivityState::Disconnected
        };
        if next != self.state {
            match next {
                ConnectivityState::Connected => info!("Link up"),
                _ => warn!("Link down"),
            }
        }
        self.state = next;
        next
    }

    /// Associates if not connected. The whole attempt, link checks included,
    /// is capped at `attempts * poll_every`.
    pub async fn ensure_connected(&mut self) -> Result<(), ConnectivityError> {
        if self.state == ConnectivityState::Connected {
            return Ok(());
        }

        self.state = ConnectivityState::Reconnecting;
        info!("Connecting");
        self.link.begin_association();

        let deadline = self.poll_every * self.attempts;
        let (attempts, poll_every) = (self.attempts, self.poll_every);
        let link = &mut self.link;
        let mut made = 0;

        let associated = timeout(deadline, async {
            for attempt in 1..=attempts {
                made = attempt;
                if link.check().await {
                    return true;
                }
                debug!("Link still down ({}/{})", attempt, attempts);
                if attempt < attempts {
                    sleep(poll_every).await;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        if associated {
            self.state = ConnectivityState::Connected;
            info!("Connected after {} attempt(s)", made);
            return Ok(());
        }

        self.state = ConnectivityState::Disconnected;
        let err = ConnectivityError::AssociationTimeout { attempts: made };
        error!("{}", err);
        Err(err)
    }
}

/// Up while the kernel can route to the collector. Nothing is sent, so a
/// stopped collector still counts as up.
pub struct RouteLink {
    target: String,
    recheck: Duration,
    up: bool,
    last_check: Option<Instant>,
}

impl RouteLink {
    pub fn new(host: &str, port: u16, recheck: Duration) -> Self {
        RouteLink {
            target: format!("{}:{}", host.trim(), port),
            recheck,
            up: false,
            last_check: None,
        }
    }

    async fn has_route(&self) -> bool {
        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(err) => {
                warn!("Cannot open route check socket: {}", err);
                return false;
            }
        };
        match socket.connect(self.target.as_str()).await {
            Ok(()) => true,
            Err(err) => {
                debug!("No route to {}: {}", self.target, err);
                false
            }
        }
    }
}

impl NetworkLink for RouteLink {
    fn begin_association(&mut self) {
        self.last_check = None;
    }

    async fn poll(&mut self) -> bool {
        match self.last_check {
            Some(at) if at.elapsed() < self.recheck => self.up,
            _ => self.check().await,
        }
    }

    async fn check(&mut self) -> bool {
        self.up = self.has_route().await;
        self.last_check = Some(Instant::now());
        self.up
    }
}
