//! Constructor parameters for the three engines.
//!
//! Defaults mirror the classroom simulations these engines grew out of.
//! A [`SimulationConfig`] can be read from TOML for harnesses:
//!
//! ```toml
//! [buffer]
//! capacity = 3
//! produce_delay = { min_secs = 0.1, max_secs = 0.2 }
//!
//! [dining]
//! philosophers = 7
//! ```

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{ConfigurationError, SimulationResult};

/// Uniform range of simulated work, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    #[must_use]
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// A range that never sleeps; useful for tests.
    #[must_use]
    pub const fn instant() -> Self {
        Self::new(0.0, 0.0)
    }

    #[must_use]
    pub fn from_millis(min: u64, max: u64) -> Self {
        Self::new(
            Duration::from_millis(min).as_secs_f64(),
            Duration::from_millis(max).as_secs_f64(),
        )
    }

    /// Returns the range multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.min_secs * factor, self.max_secs * factor)
    }

    /// # Errors
    ///
    /// Rejects negative, non-finite and inverted ranges, and ranges whose
    /// upper bound does not fit in a [`Duration`].
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigurationError> {
        let valid = self.min_secs.is_finite()
            && self.max_secs.is_finite()
            && self.min_secs >= 0.0
            && self.min_secs <= self.max_secs
            && Duration::try_from_secs_f64(self.max_secs).is_ok();
        if valid {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidDelayRange {
                name,
                min: self.min_secs,
                max: self.max_secs,
            })
        }
    }

    /// Draws a uniformly distributed delay from the range. A range that
    /// skipped validation saturates at [`Duration::MAX`] or zero.
    #[must_use]
    pub fn sample(&self, rng: &mut fastrand::Rng) -> Duration {
        let span = self.max_secs - self.min_secs;
        let secs = self.min_secs + span * rng.f64();
        Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    pub produce_delay: DelayRange,
    pub consume_delay: DelayRange,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            produce_delay: DelayRange::new(0.5, 1.5),
            consume_delay: DelayRange::new(1.0, 2.0),
        }
    }
}

impl BufferConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_produce_delay(mut self, delay: DelayRange) -> Self {
        self.produce_delay = delay;
        self
    }

    #[must_use]
    pub fn with_consume_delay(mut self, delay: DelayRange) -> Self {
        self.consume_delay = delay;
        self
    }

    #[must_use]
    pub fn scaled(mut self, factor: f64) -> Self {
        self.produce_delay = self.produce_delay.scaled(factor);
        self.consume_delay = self.consume_delay.scaled(factor);
        self
    }

    /// # Errors
    ///
    /// Fails on zero capacity or an invalid delay range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.capacity == 0 {
            return Err(ConfigurationError::ZeroCapacity);
        }
        self.produce_delay.validate("produce")?;
        self.consume_delay.validate("consume")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarbershopConfig {
    pub waiting_seats: usize,
    pub cut_delay: DelayRange,
    pub arrival_delay: DelayRange,
}

impl Default for BarbershopConfig {
    fn default() -> Self {
        Self {
            waiting_seats: 5,
            cut_delay: DelayRange::new(1.0, 3.0),
            arrival_delay: DelayRange::new(0.5, 2.0),
        }
    }
}

impl BarbershopConfig {
    #[must_use]
    pub fn with_waiting_seats(mut self, seats: usize) -> Self {
        self.waiting_seats = seats;
        self
    }

    #[must_use]
    pub fn with_cut_delay(mut self, delay: DelayRange) -> Self {
        self.cut_delay = delay;
        self
    }

    #[must_use]
    pub fn with_arrival_delay(mut self, delay: DelayRange) -> Self {
        self.arrival_delay = delay;
        self
    }

    #[must_use]
    pub fn scaled(mut self, factor: f64) -> Self {
        self.cut_delay = self.cut_delay.scaled(factor);
        self.arrival_delay = self.arrival_delay.scaled(factor);
        self
    }

    /// # Errors
    ///
    /// Fails on zero seats or an invalid delay range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.waiting_seats == 0 {
            return Err(ConfigurationError::ZeroCapacity);
        }
        self.cut_delay.validate("cut")?;
        self.arrival_delay.validate("arrival")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiningConfig {
    pub philosophers: usize,
    pub think_delay: DelayRange,
    pub eat_delay: DelayRange,
}

impl Default for DiningConfig {
    fn default() -> Self {
        Self {
            philosophers: 5,
            think_delay: DelayRange::new(1.0, 3.0),
            eat_delay: DelayRange::new(2.0, 4.0),
        }
    }
}

impl DiningConfig {
    #[must_use]
    pub fn with_philosophers(mut self, count: usize) -> Self {
        self.philosophers = count;
        self
    }

    #[must_use]
    pub fn with_think_delay(mut self, delay: DelayRange) -> Self {
        self.think_delay = delay;
        self
    }

    #[must_use]
    pub fn with_eat_delay(mut self, delay: DelayRange) -> Self {
        self.eat_delay = delay;
        self
    }

    #[must_use]
    pub fn scaled(mut self, factor: f64) -> Self {
        self.think_delay = self.think_delay.scaled(factor);
        self.eat_delay = self.eat_delay.scaled(factor);
        self
    }

    /// # Errors
    ///
    /// Fails with fewer than two philosophers or an invalid delay range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.philosophers < 2 {
            return Err(ConfigurationError::TooFewPhilosophers(self.philosophers));
        }
        self.think_delay.validate("think")?;
        self.eat_delay.validate("eat")
    }
}

/// Aggregate of every engine configuration, as read by harnesses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub buffer: BufferConfig,
    pub barbershop: BarbershopConfig,
    pub dining: DiningConfig,
}

impl SimulationConfig {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimulationError::ConfigLoad`] when the file cannot
    /// be read or parsed, and `InvalidConfiguration` when a section fails
    /// validation.
    pub fn from_path<V: Into<std::path::PathBuf>>(target: V) -> SimulationResult<Self> {
        let config: Self = from_path(target)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// See [`SimulationConfig::from_path`].
    pub fn from_toml_str(content: &str) -> SimulationResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first section that fails validation.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.buffer.validate()?;
        self.barbershop.validate()?;
        self.dining.validate()
    }

    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            buffer: self.buffer.scaled(factor),
            barbershop: self.barbershop.scaled(factor),
            dining: self.dining.scaled(factor),
        }
    }
}

fn from_path<T, V>(target: V) -> SimulationResult<T>
where
    T: DeserializeOwned,
    V: Into<std::path::PathBuf>,
{
    let target_path = target.into();
    let config_content = std::fs::read_to_string(target_path)?;
    let config_obj: T = toml::from_str(&config_content)?;
    Ok(config_obj)
}

#[cfg(test)]
mod test_config {
    use super::*;
    use crate::errors::SimulationError;

    #[test]
    fn defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert_eq!(BufferConfig::default().capacity, 8);
        assert_eq!(BarbershopConfig::default().waiting_seats, 5);
        assert_eq!(DiningConfig::default().philosophers, 5);
    }

    #[test]
    fn rejects_zero_capacity_and_lonely_philosopher() {
        assert_eq!(
            BufferConfig::default().with_capacity(0).validate(),
            Err(ConfigurationError::ZeroCapacity)
        );
        assert_eq!(
            BarbershopConfig::default().with_waiting_seats(0).validate(),
            Err(ConfigurationError::ZeroCapacity)
        );
        assert_eq!(
            DiningConfig::default().with_philosophers(1).validate(),
            Err(ConfigurationError::TooFewPhilosophers(1))
        );
    }

    #[test]
    fn rejects_inverted_delay_ranges() {
        let config = DiningConfig::default().with_eat_delay(DelayRange::new(2.0, 1.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidDelayRange { name: "eat", .. })
        ));
        assert!(DelayRange::new(-1.0, 1.0).validate("think").is_err());
        assert!(DelayRange::new(0.0, f64::NAN).validate("think").is_err());
    }

    #[test]
    fn rejects_ranges_longer_than_a_duration() {
        assert!(matches!(
            DelayRange::new(1e20, 1e20).validate("think"),
            Err(ConfigurationError::InvalidDelayRange { name: "think", .. })
        ));

        let config = DiningConfig::default().with_think_delay(DelayRange::new(1.0, 1e20));
        assert!(config.validate().is_err());

        // a valid range scaled past the limit fails the second validation
        let scaled = DiningConfig::default().scaled(1e20);
        assert!(scaled.validate().is_err());
    }

    #[test]
    fn unvalidated_huge_range_saturates_instead_of_panicking() {
        let mut rng = fastrand::Rng::with_seed(1);
        assert_eq!(DelayRange::new(1e20, 1e20).sample(&mut rng), Duration::MAX);
    }

    #[test]
    fn samples_stay_within_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        let range = DelayRange::from_millis(10, 20);
        for _ in 0..100 {
            let delay = range.sample(&mut rng);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
        assert_eq!(DelayRange::instant().sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str(
            r"
            [buffer]
            capacity = 3

            [dining]
            philosophers = 7
            eat_delay = { min_secs = 0.1, max_secs = 0.2 }
            ",
        )
        .expect("should parse");

        assert_eq!(config.buffer.capacity, 3);
        assert_eq!(config.buffer.produce_delay, DelayRange::new(0.5, 1.5));
        assert_eq!(config.dining.philosophers, 7);
        assert_eq!(config.dining.eat_delay, DelayRange::new(0.1, 0.2));
        assert_eq!(config.barbershop, BarbershopConfig::default());
    }

    #[test]
    fn invalid_toml_sections_fail_validation() {
        let result = SimulationConfig::from_toml_str("[barbershop]\nwaiting_seats = 0\n");
        assert!(matches!(
            result,
            Err(SimulationError::InvalidConfiguration(ConfigurationError::ZeroCapacity))
        ));

        let result = SimulationConfig::from_toml_str("[buffer\n");
        assert!(matches!(result, Err(SimulationError::ConfigLoad(_))));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let result = SimulationConfig::from_path("/definitely/not/here.toml");
        assert!(matches!(result, Err(SimulationError::ConfigLoad(_))));
    }

    #[test]
    fn scaling_multiplies_every_range() {
        let config = BufferConfig::default().scaled(0.5);
        assert_eq!(config.produce_delay, DelayRange::new(0.25, 0.75));
        assert_eq!(config.consume_delay, DelayRange::new(0.5, 1.0));
    }
}
