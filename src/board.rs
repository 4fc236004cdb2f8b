use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::{CdevPin, Delay};
use log::{error, info};

use crate::config::{AppConfig, SensorConfig};
use crate::error::GpioError;
use crate::messages::Mode;
use crate::sampler::{Offloaded, PresenceSampler, Simulated, Ultrasonic};

pub type Sonar = Ultrasonic<CdevPin, CdevPin, Delay>;

pub enum Sampler {
    Simulated(Simulated),
    Sonar(Offloaded<Sonar>),
}

impl PresenceSampler for Sampler {
    async fn sample(&mut self) -> bool {
        match self {
            Sampler::Simulated(sim) => sim.sample().await,
            Sampler::Sonar(sonar) => sonar.sample().await,
        }
    }
}

/// Claims the trigger (output) and echo (input) lines on the character device.
pub fn open_sonar(sensor: &SensorConfig) -> Result<Sonar, GpioError> {
    let (Some(trigger_pin), Some(echo_pin)) = (sensor.trigger_pin, sensor.echo_pin) else {
        return Err(GpioError::PinsNotConfigured);
    };

    let mut chip = Chip::new(sensor.gpio_chip()).map_err(|e| GpioError::Chip {
        chip: sensor.gpio_chip().to_string(),
        reason: e.to_string(),
    })?;
    let trigger = claim(&mut chip, trigger_pin, LineRequestFlags::OUTPUT, "presence-trigger")?;
    let echo = claim(&mut chip, echo_pin, LineRequestFlags::INPUT, "presence-echo")?;

    Ok(Ultrasonic::new(
        trigger,
        echo,
        Delay,
        sensor.distance_threshold_cm(),
        sensor.echo_timeout(),
    ))
}

fn claim(chip: &mut Chip, pin: u8, flags: LineRequestFlags, label: &str) -> Result<CdevPin, GpioError> {
    let line_err = |reason: String| GpioError::Line { pin, reason };
    let handle = chip
        .get_line(u32::from(pin))
        .and_then(|line| line.request(flags, 0, label))
        .map_err(|e| line_err(e.to_string()))?;
    CdevPin::new(handle).map_err(|e| line_err(e.to_string()))
}

/// Real mode drives the ultrasonic sensor. If its lines cannot be claimed the
/// device keeps running on the simulated source.
pub fn build_sampler(mode: Mode, config: &AppConfig) -> Sampler {
    let simulated = || Sampler::Simulated(Simulated::new(config.simulation().toggle_interval()));
    if mode == Mode::Simulation {
        return simulated();
    }

    let sensor = config.sensor();
    match open_sonar(&sensor) {
        Ok(sonar) => {
            info!(
                "Ultrasonic sensor on {} (trigger {:?}, echo {:?})",
                sensor.gpio_chip(),
                sensor.trigger_pin,
                sensor.echo_pin
            );
            Sampler::Sonar(Offloaded::new(sonar))
        }
        Err(err) => {
            error!("Ultrasonic sensor unavailable, simulating instead: {}", err);
            simulated()
        }
    }
}
