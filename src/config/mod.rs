//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → sections handed to the subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is loaded once and never mutated afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ForwardingConfig, HealthCheckConfig, ListenerConfig, ObservabilityConfig, ProbeKind, ProxyConfig,
};
pub use validation::ValidationError;
