use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde_derive::Deserialize;

use crate::error::ConfigError;
use crate::messages::Mode;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub mode: Option<ModeSetting>,
    pub fallback_mode: Option<Mode>,
    pub collector: CollectorConfig,
    pub network: Option<NetworkConfig>,
    pub sensor: Option<SensorConfig>,
    pub simulation: Option<SimulationConfig>,
    pub server: Option<ServerConfig>,
    pub cycle: Option<CycleConfig>,
    pub indicator: Option<IndicatorConfig>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    Simulation,
    Real,
    /// Ask the collector's `/mode` endpoint once.
    Remote,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CollectorConfig {
    pub host: String,
    pub port: Option<u16>,
    pub request_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct NetworkConfig {
    pub association_attempts: Option<u32>,
    pub association_poll_ms: Option<u64>,
    pub recheck_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SensorConfig {
    pub distance_threshold_cm: Option<f32>,
    pub echo_timeout_us: Option<u64>,
    pub gpio_chip: Option<String>,
    pub trigger_pin: Option<u8>,
    pub echo_pin: Option<u8>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SimulationConfig {
    pub toggle_interval_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ServerConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct CycleConfig {
    pub poll_interval_ms: Option<u64>,
    pub disconnected_backoff_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct IndicatorConfig {
    pub pulse_ms: Option<u64>,
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::de::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.host.trim().is_empty() {
            return Err(ConfigError::Invalid("collector.host must not be empty"));
        }
        if self.collector.max_retries() == 0 {
            return Err(ConfigError::Invalid("collector.max_retries must be at least 1"));
        }
        if self.network().association_attempts() == 0 {
            return Err(ConfigError::Invalid(
                "network.association_attempts must be at least 1",
            ));
        }
        if self.simulation().toggle_interval().is_zero() {
            return Err(ConfigError::Invalid(
                "simulation.toggle_interval_ms must be non-zero",
            ));
        }
        if self.cycle().poll_interval().is_zero() {
            return Err(ConfigError::Invalid("cycle.poll_interval_ms must be non-zero"));
        }
        if !(self.sensor().distance_threshold_cm() > 0.0) {
            return Err(ConfigError::Invalid(
                "sensor.distance_threshold_cm must be positive",
            ));
        }
        Ok(())
    }

    pub fn mode(&self) -> ModeSetting {
        self.mode.unwrap_or(ModeSetting::Remote)
    }

    pub fn fallback_mode(&self) -> Mode {
        self.fallback_mode.unwrap_or(Mode::Simulation)
    }

    pub fn network(&self) -> NetworkConfig {
        self.network.clone().unwrap_or_default()
    }

    pub fn sensor(&self) -> SensorConfig {
        self.sensor.clone().unwrap_or_default()
    }

    pub fn simulation(&self) -> SimulationConfig {
        self.simulation.clone().unwrap_or_default()
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn cycle(&self) -> CycleConfig {
        self.cycle.clone().unwrap_or_default()
    }

    pub fn indicator(&self) -> IndicatorConfig {
        self.indicator.clone().unwrap_or_default()
    }
}

impl CollectorConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5000)
    }

    /// `http://<host>:<port>`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host.trim(), self.port())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(5000))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(3)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.unwrap_or(1000))
    }
}

impl NetworkConfig {
    pub fn association_attempts(&self) -> u32 {
        self.association_attempts.unwrap_or(20)
    }

    pub fn association_poll(&self) -> Duration {
        Duration::from_millis(self.association_poll_ms.unwrap_or(500))
    }

    pub fn recheck(&self) -> Duration {
        Duration::from_secs(self.recheck_seconds.unwrap_or(5))
    }
}

impl SensorConfig {
    pub fn distance_threshold_cm(&self) -> f32 {
        self.distance_threshold_cm.unwrap_or(50.0)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_micros(self.echo_timeout_us.unwrap_or(30_000))
    }

    pub fn gpio_chip(&self) -> &str {
        self.gpio_chip.as_deref().unwrap_or("/dev/gpiochip0")
    }
}

impl SimulationConfig {
    pub fn toggle_interval(&self) -> Duration {
        Duration::from_millis(self.toggle_interval_ms.unwrap_or(5000))
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.bind.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            self.port.unwrap_or(81),
        )
    }
}

impl CycleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(100))
    }

    pub fn disconnected_backoff(&self) -> Duration {
        Duration::from_millis(self.disconnected_backoff_ms.unwrap_or(1000))
    }
}

impl IndicatorConfig {
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms.unwrap_or(50))
    }
}
