//! Settings loading and provider selection for the host broker.
//!
//! This crate owns the settings document schema, its validation, and the
//! default-instance / nickname resolution used by the CLI. The loaded
//! [`Settings`] value is immutable; consumers receive it by reference.

pub mod cli;
pub mod errors;
pub mod host;
pub mod providers;
pub mod settings;

pub use errors::SettingsError;
pub use host::{Host, HostArgs};
pub use settings::Settings;
