use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::sleep;

use crate::connectivity::{Monitor, NetworkLink};
use crate::delivery::{DeliveryClient, Indicator, Transport};
use crate::messages::{ConnectivityState, Transition};
use crate::sampler::PresenceSampler;
use crate::tracker::StateTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Link down and could not be restored; nothing sampled.
    Offline,
    Steady,
    Delivered(Transition),
    /// Edge committed locally, collector never acknowledged it.
    DeliveryFailed(Transition),
}

pub struct Manager<S, L, T, I> {
    sampler: S,
    tracker: StateTracker,
    monitor: Monitor<L>,
    delivery: DeliveryClient<T, I>,
    poll_interval: Duration,
    disconnected_backoff: Duration,
}

impl<S, L, T, I> Manager<S, L, T, I>
where
    S: PresenceSampler,
    L: NetworkLink,
    T: Transport,
    I: Indicator,
{
    pub fn new(
        sampler: S,
        tracker: StateTracker,
        monitor: Monitor<L>,
        delivery: DeliveryClient<T, I>,
        poll_interval: Duration,
        disconnected_backoff: Duration,
    ) -> Self {
        Manager {
            sampler,
            tracker,
            monitor,
            delivery,
            poll_interval,
            disconnected_backoff,
        }
    }

    /// One iteration, without the trailing poll delay.
    pub async fn step(&mut self) -> Step {
        if self.monitor.refresh().await != ConnectivityState::Connected
            && self.monitor.ensure_connected().await.is_err()
        {
            sleep(self.disconnected_backoff).await;
            return Step::Offline;
        }

        let reading = self.sampler.sample().await;
        let Some(transition) = self.tracker.observe(reading) else {
            return Step::Steady;
        };

        match self.delivery.deliver(&mut self.monitor, transition.to).await {
            Ok(receipt) => {
                debug!(
                    "{} acknowledged with {} after {} attempt(s)",
                    transition, receipt.status, receipt.attempts
                );
                Step::Delivered(transition)
            }
            Err(err) => {
                warn!("Dropping {}: {}", transition, err);
                Step::DeliveryFailed(transition)
            }
        }
    }

    pub async fn run_loop(mut self, shutdown: impl Future<Output = ()>) {
        info!(
            "Starting control loop (poll every {:?}, presence {}, link {:?})",
            self.poll_interval,
            crate::messages::presence_name(self.tracker.current()),
            self.monitor.status()
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Exiting control loop");
                    break;
                }
                step = self.step() => {
                    if step != Step::Steady {
                        debug!("Cycle: {:?}", step);
                    }
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}
