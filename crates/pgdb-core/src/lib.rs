//! Provisioning and supervision of the local databases behind PolyglotDB.
//!
//! `pgdb-core` downloads the Neo4j graph database and the InfluxDB time-series
//! database for the host platform, renders their config files from bundled
//! templates, and starts/stops them as background processes. Nothing here
//! talks to either database; they are treated as opaque executables.
//!
//! # Layout on disk
//!
//! | Path | Contents |
//! |------|----------|
//! | `<config home>/config.ini` | persisted [`InstallationConfig`] |
//! | `<config home>/downloads/` | scratch space, removed after install |
//! | `<config home>/influxd.pid` | PID of the detached InfluxDB process |
//! | `<data dir>/neo4j/` | Neo4j distribution and `conf/neo4j.conf` |
//! | `<data dir>/influxdb/` | InfluxDB distribution and `influxdb.conf` |
//!
//! The config home is `$PGDB_HOME`, or `~/.pgdb` when unset.

pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod platform;
pub mod supervisor;
pub mod template;

pub use component::{Component, INFLUXDB_VERSION, NEO4J_VERSION};
pub use config::{ConfigStore, InstallationConfig};
pub use context::RuntimeContext;
pub use error::{PgdbError, PgdbResult};
pub use fetch::{ArchiveSource, FetchOutcome, HookOutcome, HttpSource, NoProgress, ProgressSink};
pub use orchestrator::{
    Declined, InstallOptions, InstallOutcome, InstallReport, Orchestrator, Prompt, UninstallReport,
};
pub use platform::{ArchiveFormat, Platform, PlatformProfile};
pub use supervisor::{ServiceHandle, ServiceState, StopOutcome, Supervisor};
