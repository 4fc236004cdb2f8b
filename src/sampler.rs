use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin};
use log::{debug, warn};

pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.034;

pub trait PresenceSampler {
    fn sample(&mut self) -> impl Future<Output = bool> + Send;
}

/// A reading that holds the calling thread, such as GPIO pulse timing.
pub trait BlockingSampler {
    fn sample_blocking(&mut self) -> bool;
}

/// Runs a [`BlockingSampler`] on tokio's blocking pool so the runtime
/// workers stay free while the echo is timed.
pub struct Offloaded<S> {
    sensor: Arc<Mutex<S>>,
}

impl<S> Offloaded<S> {
    pub fn new(sensor: S) -> Self {
        Offloaded {
            sensor: Arc::new(Mutex::new(sensor)),
        }
    }
}

impl<S: BlockingSampler + Send + 'static> PresenceSampler for Offloaded<S> {
    async fn sample(&mut self) -> bool {
        let sensor = self.sensor.clone();
        let reading = tokio::task::spawn_blocking(move || match sensor.lock() {
            Ok(mut sensor) => sensor.sample_blocking(),
            Err(_) => false,
        })
        .await;
        reading.unwrap_or_else(|err| {
            warn!("Sensor read task failed: {}", err);
            false
        })
    }
}

pub fn distance_cm(echo: Duration) -> f32 {
    echo.as_micros() as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0
}

/// HC-SR04. A missing or overlong echo reads as nothing in range.
pub struct Ultrasonic<T, E, D> {
    trigger: T,
    echo: E,
    delay: D,
    threshold_cm: f32,
    echo_timeout: Duration,
}

impl<T, E, D> Ultrasonic<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    pub fn new(trigger: T, echo: E, delay: D, threshold_cm: f32, echo_timeout: Duration) -> Self {
        Ultrasonic {
            trigger,
            echo,
            delay,
            threshold_cm,
            echo_timeout,
        }
    }

    pub fn measure(&mut self) -> Option<f32> {
        match self.echo_pulse() {
            Ok(pulse) => pulse.map(distance_cm),
            Err(kind) => {
                warn!("Ultrasonic pin error: {:?}", kind);
                None
            }
        }
    }

    fn echo_pulse(&mut self) -> Result<Option<Duration>, ErrorKind> {
        self.trigger.set_low().map_err(|e| e.kind())?;
        self.delay.delay_us(2);
        self.trigger.set_high().map_err(|e| e.kind())?;
        self.delay.delay_us(10);
        self.trigger.set_low().map_err(|e| e.kind())?;

        let waiting = Instant::now();
        while !self.echo.is_high().map_err(|e| e.kind())? {
            if waiting.elapsed() >= self.echo_timeout {
                return Ok(None);
            }
        }

        let rise = Instant::now();
        while self.echo.is_high().map_err(|e| e.kind())? {
            if rise.elapsed() >= self.echo_timeout {
                return Ok(None);
            }
        }
        Ok(Some(rise.elapsed()))
    }
}

impl<T, E, D> BlockingSampler for Ultrasonic<T, E, D>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
{
    fn sample_blocking(&mut self) -> bool {
        match self.measure() {
            Some(distance) if distance < self.threshold_cm => {
                debug!("Object detected at {:.2} cm", distance);
                true
            }
            Some(distance) => {
                debug!("Nearest object at {:.2} cm", distance);
                false
            }
            None => {
                debug!("No echo");
                false
            }
        }
    }
}

/// Presence flips every `interval`, starting absent.
pub struct Simulated {
    started: tokio::time::Instant,
    interval: Duration,
}

impl Simulated {
    pub fn new(interval: Duration) -> Self {
        Simulated {
            started: tokio::time::Instant::now(),
            interval,
        }
    }
}

impl PresenceSampler for Simulated {
    async fn sample(&mut self) -> bool {
        let periods = self.started.elapsed().as_nanos() / self.interval.as_nanos().max(1);
        periods % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::convert::Infallible;

    use embedded_hal::digital::ErrorType;

    use super::*;

    #[derive(Default)]
    struct Trigger {
        pulses: u32,
        high: bool,
    }

    impl ErrorType for Trigger {
        type Error = Infallible;
    }

    impl OutputPin for Trigger {
        fn set_low(&mut self) -> Result<(), Infallible> {
            if self.high {
                self.pulses += 1;
            }
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    /// Echo line that replays scripted levels, then stays at `rest`.
    struct Echo {
        levels: VecDeque<bool>,
        rest: bool,
    }

    impl Echo {
        fn silent() -> Self {
            Echo {
                levels: VecDeque::new(),
                rest: false,
            }
        }

        fn pulse(low_reads: usize, high_reads: usize) -> Self {
            let mut levels = VecDeque::new();
            levels.extend(std::iter::repeat_n(false, low_reads));
            levels.extend(std::iter::repeat_n(true, high_reads));
            Echo {
                levels,
                rest: false,
            }
        }

        fn stuck_high() -> Self {
            Echo {
                levels: VecDeque::new(),
                rest: true,
            }
        }
    }

    impl ErrorType for Echo {
        type Error = Infallible;
    }

    impl InputPin for Echo {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.levels.pop_front().unwrap_or(self.rest))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|h| !h)
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl embedded_hal::digital::Error for Broken {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    impl ErrorType for Broken {
        type Error = Broken;
    }

    impl InputPin for Broken {
        fn is_high(&mut self) -> Result<bool, Broken> {
            Err(Broken)
        }

        fn is_low(&mut self) -> Result<bool, Broken> {
            Err(Broken)
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn sensor<E: InputPin>(echo: E) -> Ultrasonic<Trigger, E, NoDelay> {
        Ultrasonic::new(
            Trigger::default(),
            echo,
            NoDelay,
            50.0,
            Duration::from_millis(2),
        )
    }

    #[test]
    fn test_distance_conversion() {
        assert!((distance_cm(Duration::from_micros(1000)) - 17.0).abs() < 1e-3);
        assert!((distance_cm(Duration::from_micros(5882)) - 99.994).abs() < 1e-2);
        assert_eq!(distance_cm(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_echo_timeout_is_absent() {
        let mut sonar = sensor(Echo::silent());
        assert_eq!(sonar.measure(), None);
        assert!(!sonar.sample_blocking());
    }

    #[test]
    fn test_echo_never_falling_is_absent() {
        let mut sonar = sensor(Echo::stuck_high());
        assert!(!sonar.sample_blocking());
    }

    #[test]
    fn test_pin_fault_is_absent() {
        let mut sonar = sensor(Broken);
        assert!(!sonar.sample_blocking());
    }

    #[test]
    fn test_short_echo_is_present() {
        let mut sonar = sensor(Echo::pulse(3, 2));
        assert!(sonar.sample_blocking());
        assert_eq!(sonar.trigger.pulses, 1);
    }

    #[tokio::test]
    async fn test_offloaded_reads_on_blocking_pool() {
        let mut present = Offloaded::new(sensor(Echo::pulse(1, 1)));
        assert!(present.sample().await);
        // Script exhausted: the echo line now stays low.
        assert!(!present.sample().await);

        let mut silent = Offloaded::new(sensor(Echo::silent()));
        assert!(!silent.sample().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_toggles_once_per_interval() {
        let interval = Duration::from_secs(5);
        let mut sim = Simulated::new(interval);
        let mut last = sim.sample().await;
        assert!(!last);

        let mut toggles = 0;
        // 10 intervals, polled every 100ms.
        for _ in 0..500 {
            tokio::time::advance(Duration::from_millis(100)).await;
            let now = sim.sample().await;
            if now != last {
                toggles += 1;
            }
            last = now;
        }
        assert_eq!(toggles, 10);
        assert!(!last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_alternates() {
        let mut sim = Simulated::new(Duration::from_secs(5));
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(sim.sample().await);
            tokio::time::advance(Duration::from_secs(5)).await;
        }
        assert_eq!(seen, vec![false, true, false, true]);
    }
}
