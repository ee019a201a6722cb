use derive_more::From;

/// Reasons an engine configuration is rejected at construction time.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigurationError {
    /// Buffer or waiting room capacity was zero.
    ZeroCapacity,

    /// Fewer than two philosophers cannot share a ring of forks.
    TooFewPhilosophers(usize),

    /// A philosopher index outside the table was used.
    UnknownPhilosopher { id: usize, philosophers: usize },

    /// A delay range was negative, non-finite or had `min > max`.
    InvalidDelayRange {
        name: &'static str,
        min: f64,
        max: f64,
    },
}

impl std::error::Error for ConfigurationError {}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "capacity must be at least 1"),
            Self::TooFewPhilosophers(count) => {
                write!(f, "at least 2 philosophers are required, got {count}")
            }
            Self::UnknownPhilosopher { id, philosophers } => {
                write!(f, "philosopher {id} is not seated at a table of {philosophers}")
            }
            Self::InvalidDelayRange { name, min, max } => {
                write!(f, "invalid {name} delay range: min={min}s max={max}s")
            }
        }
    }
}

#[derive(From, Debug)]
pub enum SimulationError {
    #[from]
    InvalidConfiguration(ConfigurationError),

    /// The engine was asked to shut down while the caller was blocked
    /// or before it could block.
    ShutdownInProgress,

    #[from(ignore)]
    ConfigLoad(String),

    #[from(ignore)]
    ActorPanicked(String),
}

impl From<std::io::Error> for SimulationError {
    fn from(err: std::io::Error) -> Self {
        Self::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for SimulationError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigLoad(err.to_string())
    }
}

impl SimulationError {
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownInProgress)
    }
}

impl std::error::Error for SimulationError {}

impl core::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration(err) => write!(f, "invalid configuration: {err}"),
            Self::ShutdownInProgress => write!(f, "simulation is shutting down"),
            Self::ConfigLoad(err) => write!(f, "failed to load configuration: {err}"),
            Self::ActorPanicked(name) => write!(f, "actor thread {name} panicked"),
        }
    }
}

pub type SimulationResult<T> = std::result::Result<T, SimulationError>;
