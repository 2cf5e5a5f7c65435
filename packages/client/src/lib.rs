//! # Formset Client
//!
//! Drives a [`Formset`](formset_runtime::Formset) against a server. The
//! runtime hands out suspensions; [`FormsetClient`] fulfils them through a
//! [`Transport`] and feeds the results back.
//!
//! The client is single-threaded: run it on a current-thread runtime or
//! inside a `LocalSet`. Any number of chains and uploads may be in flight at
//! once; the formset is only borrowed between awaits.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod transport;

pub use client::FormsetClient;
pub use config::{ClientConfig, DEFAULT_CONFIG_NAME};
pub use error::{ClientError, ClientResult, ConfigError};
pub use http::HttpTransport;
pub use mock::MockTransport;
pub use transport::{OptionItem, OptionsPage, Transport};
