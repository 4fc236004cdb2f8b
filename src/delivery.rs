use std::future::Future;
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::Client;
use tokio::time::sleep;

use crate::connectivity::{Monitor, NetworkLink};
use crate::error::{DeliveryError, TransportError};
use crate::messages::PresenceEvent;

/// `Ok` holds the HTTP status, whatever it is.
pub trait Transport {
    fn send(
        &mut self,
        event: &PresenceEvent,
    ) -> impl Future<Output = Result<u16, TransportError>> + Send;
}

pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport {
            client,
            url: format!("{}/sensor_data", base_url.trim_end_matches('/')),
        })
    }
}

impl Transport for HttpTransport {
    async fn send(&mut self, event: &PresenceEvent) -> Result<u16, TransportError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        Ok(response.status().as_u16())
    }
}

pub trait Indicator {
    fn set(&mut self, on: bool);
}

pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        debug!("Indicator {}", if on { "on" } else { "off" });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub attempts: u32,
    pub status: u16,
}

/// Lives for one `deliver` call.
struct DeliveryAttempt {
    payload: PresenceEvent,
    retries_remaining: u32,
    last_error: Option<TransportError>,
}

pub struct DeliveryClient<T, I> {
    transport: T,
    indicator: I,
    max_retries: u32,
    retry_delay: Duration,
    pulse: Duration,
}

impl<T: Transport, I: Indicator> DeliveryClient<T, I> {
    pub fn new(
        transport: T,
        indicator: I,
        max_retries: u32,
        retry_delay: Duration,
        pulse: Duration,
    ) -> Self {
        DeliveryClient {
            transport,
            indicator,
            max_retries: max_retries.max(1),
            retry_delay,
            pulse,
        }
    }

    /// At most `max_retries` sends in total. Nothing is queued on failure.
    pub async fn deliver<L: NetworkLink>(
        &mut self,
        monitor: &mut Monitor<L>,
        present: bool,
    ) -> Result<Receipt, DeliveryError> {
        monitor.ensure_connected().await?;

        let mut attempt = DeliveryAttempt {
            payload: PresenceEvent::new(present),
            retries_remaining: self.max_retries,
            last_error: None,
        };

        while attempt.retries_remaining > 0 {
            attempt.retries_remaining -= 1;
            let number = self.max_retries - attempt.retries_remaining;

            match self.transport.send(&attempt.payload).await {
                Ok(status) => {
                    info!(
                        "Sent {{\"value\": {}}} (status {}, attempt {})",
                        attempt.payload.value, status, number
                    );
                    self.pulse_indicator().await;
                    return Ok(Receipt {
                        attempts: number,
                        status,
                    });
                }
                Err(err) => {
                    warn!(
                        "Delivery attempt {}/{} failed: {}",
                        number, self.max_retries, err
                    );
                    attempt.last_error = Some(err);
                }
            }

            if attempt.retries_remaining > 0 {
                sleep(self.retry_delay).await;
            }
        }

        let err = DeliveryError::Exhausted {
            attempts: self.max_retries,
            last: attempt
                .last_error
                .unwrap_or_else(|| TransportError::Other("no attempt made".into())),
        };
        error!("Dropping presence event {}: {}", attempt.payload.value, err);
        Err(err)
    }

    async fn pulse_indicator(&mut self) {
        self.indicator.set(true);
        sleep(self.pulse).await;
        self.indicator.set(false);
    }
}
