//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → handed to startup, which builds the registry, monitor and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the instance set is fixed for the
//!   lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_toml_str, parse_config, read_config, ConfigError};
pub use schema::{
    DispatchConfig, HealthCheckConfig, InstanceConfig, InstanceRangeConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, RouterConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
