pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliCommand, CliConfig};

pub use crate::adapters::{delivery::WriterChannel, http::HttpFetcher, storage::LocalStorage};
pub use crate::app::commands::{Command, CommandHandler};
pub use crate::app::runtime::Runtime;
pub use crate::config::ProbeConfig;
pub use crate::core::orchestrator::{CheckReport, Orchestrator};
pub use crate::domain::model::{Annotations, Classification, Identifier, OwnerId};
pub use crate::domain::ports::{Annotator, NoAnnotation};
pub use crate::utils::error::{CheckError, Result};
