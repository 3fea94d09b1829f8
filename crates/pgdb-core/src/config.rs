//! Persistent installation settings stored in `<config home>/config.ini`.
//!
//! The file is read through the `config` crate's INI source and written back by
//! an explicit serializer, so section and key order stay stable across runs and
//! the file stays readable by any INI tooling.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, File, FileFormat};
use tracing::{debug, info};

use crate::context::RuntimeContext;
use crate::error::{PgdbError, PgdbResult};
use crate::template::TemplateValues;

const NEO4J_SECTION: &str = "Neo4j";
const INFLUXDB_SECTION: &str = "InfluxDB";
const DATA_SECTION: &str = "Data";

/// Neo4j ports and heap size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jSettings {
    pub http_port: u16,
    pub https_port: u16,
    pub bolt_port: u16,
    /// Maximum JVM heap in megabytes
    pub max_heap: u32,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            http_port: 7474,
            https_port: 7475,
            bolt_port: 7687,
            max_heap: 4096,
        }
    }
}

impl Neo4jSettings {
    /// Placeholder values for the Neo4j config template
    pub fn template_values(&self) -> TemplateValues {
        TemplateValues::from([
            ("http_port".to_string(), self.http_port.to_string()),
            ("https_port".to_string(), self.https_port.to_string()),
            ("bolt_port".to_string(), self.bolt_port.to_string()),
            ("max_heap".to_string(), self.max_heap.to_string()),
        ])
    }
}

/// InfluxDB ports, auth flag and storage locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxDbSettings {
    pub http_port: u16,
    pub udp_port: u16,
    pub auth_enabled: bool,
    pub data_directory: PathBuf,
    pub wal_directory: PathBuf,
    pub meta_directory: PathBuf,
}

impl InfluxDbSettings {
    /// Defaults with storage nested under `<data_dir>/influxdb/`
    pub fn under(data_dir: &Path) -> Self {
        let root = data_dir.join("influxdb");
        Self {
            http_port: 8086,
            udp_port: 8087,
            auth_enabled: false,
            data_directory: root.join("data"),
            wal_directory: root.join("wal"),
            meta_directory: root.join("meta"),
        }
    }

    /// Placeholder values for the InfluxDB config template (unsanitized)
    pub fn template_values(&self) -> TemplateValues {
        TemplateValues::from([
            ("http_port".to_string(), self.http_port.to_string()),
            ("udp_port".to_string(), self.udp_port.to_string()),
            ("auth_enabled".to_string(), self.auth_enabled.to_string()),
            (
                "data_directory".to_string(),
                self.data_directory.display().to_string(),
            ),
            (
                "wal_directory".to_string(),
                self.wal_directory.display().to_string(),
            ),
            (
                "meta_directory".to_string(),
                self.meta_directory.display().to_string(),
            ),
        ])
    }
}

/// Root installation directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSettings {
    pub directory: PathBuf,
}

/// Full settings record persisted between invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationConfig {
    pub neo4j: Neo4jSettings,
    pub influxdb: InfluxDbSettings,
    pub data: DataSettings,
}

impl InstallationConfig {
    /// Built-in defaults for an installation rooted at `data_dir`
    pub fn defaults(data_dir: &Path) -> Self {
        Self {
            neo4j: Neo4jSettings::default(),
            influxdb: InfluxDbSettings::under(data_dir),
            data: DataSettings {
                directory: data_dir.to_path_buf(),
            },
        }
    }

    /// Point the installation at `dir` and move InfluxDB storage under it
    pub fn relocate(&mut self, dir: &Path) {
        let defaults = InfluxDbSettings::under(dir);
        self.data.directory = dir.to_path_buf();
        self.influxdb.data_directory = defaults.data_directory;
        self.influxdb.wal_directory = defaults.wal_directory;
        self.influxdb.meta_directory = defaults.meta_directory;
    }

    /// Render as INI text
    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        let sections: [(&str, Vec<(&str, String)>); 3] = [
            (
                NEO4J_SECTION,
                vec![
                    ("http_port", self.neo4j.http_port.to_string()),
                    ("https_port", self.neo4j.https_port.to_string()),
                    ("bolt_port", self.neo4j.bolt_port.to_string()),
                    ("max_heap", self.neo4j.max_heap.to_string()),
                ],
            ),
            (
                INFLUXDB_SECTION,
                vec![
                    ("http_port", self.influxdb.http_port.to_string()),
                    ("udp_port", self.influxdb.udp_port.to_string()),
                    ("auth_enabled", self.influxdb.auth_enabled.to_string()),
                    (
                        "data_directory",
                        self.influxdb.data_directory.display().to_string(),
                    ),
                    (
                        "wal_directory",
                        self.influxdb.wal_directory.display().to_string(),
                    ),
                    (
                        "meta_directory",
                        self.influxdb.meta_directory.display().to_string(),
                    ),
                ],
            ),
            (
                DATA_SECTION,
                vec![("directory", self.data.directory.display().to_string())],
            ),
        ];

        for (name, entries) in sections {
            // Writing to a String cannot fail
            let _ = writeln!(out, "[{name}]");
            for (key, value) in entries {
                let _ = writeln!(out, "{key} = {}", escape_ini_value(&value));
            }
            out.push('\n');
        }
        out
    }

    /// Build from parsed INI sections, filling anything absent from `defaults`
    fn from_sections(
        path: &Path,
        sections: &HashMap<String, HashMap<String, String>>,
        defaults: InstallationConfig,
    ) -> PgdbResult<Self> {
        let reader = SectionReader { path, sections };
        let mut config = defaults;

        let neo4j = NEO4J_SECTION;
        reader.read(neo4j, "http_port", &mut config.neo4j.http_port)?;
        reader.read(neo4j, "https_port", &mut config.neo4j.https_port)?;
        reader.read(neo4j, "bolt_port", &mut config.neo4j.bolt_port)?;
        reader.read(neo4j, "max_heap", &mut config.neo4j.max_heap)?;

        if let Some(dir) = reader.get(DATA_SECTION, "directory") {
            config.relocate(Path::new(dir));
        }

        let influx = INFLUXDB_SECTION;
        reader.read(influx, "http_port", &mut config.influxdb.http_port)?;
        reader.read(influx, "udp_port", &mut config.influxdb.udp_port)?;
        reader.read(influx, "auth_enabled", &mut config.influxdb.auth_enabled)?;
        reader.read(influx, "data_directory", &mut config.influxdb.data_directory)?;
        reader.read(influx, "wal_directory", &mut config.influxdb.wal_directory)?;
        reader.read(influx, "meta_directory", &mut config.influxdb.meta_directory)?;

        Ok(config)
    }
}

/// The INI reader unescapes `\x` sequences, so a bare `\` would be dropped
fn escape_ini_value(value: &str) -> String {
    value.replace('\\', "\\\\")
}

/// Case-insensitive lookup over INI sections
struct SectionReader<'a> {
    path: &'a Path,
    sections: &'a HashMap<String, HashMap<String, String>>,
}

impl SectionReader<'_> {
    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(section))
            .and_then(|(_, entries)| {
                entries
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value.trim())
            })
    }

    fn read<T: FromStr>(&self, section: &str, key: &str, slot: &mut T) -> PgdbResult<()> {
        if let Some(raw) = self.get(section, key) {
            *slot = raw.parse().map_err(|_| PgdbError::ConfigParse {
                path: self.path.to_path_buf(),
                message: format!("[{section}] {key} has invalid value '{raw}'"),
            })?;
        }
        Ok(())
    }
}

/// Load settings from `path`, or `None` when the file does not exist
pub fn load_config(path: &Path, default_data_dir: &Path) -> PgdbResult<Option<InstallationConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let path_str = path.to_string_lossy();
    let sections: HashMap<String, HashMap<String, String>> = Config::builder()
        .add_source(File::new(&path_str, FileFormat::Ini))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| PgdbError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let defaults = InstallationConfig::defaults(default_data_dir);
    InstallationConfig::from_sections(path, &sections, defaults).map(Some)
}

/// Write settings to `path`, replacing any previous file
pub fn save_config(path: &Path, config: &InstallationConfig) -> PgdbResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| PgdbError::ConfigIo {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, config.to_ini()).map_err(|source| PgdbError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Settings plus the dirty flag that decides whether they are written back
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: InstallationConfig,
    dirty: bool,
}

impl ConfigStore {
    /// Load the settings file, or start from defaults (marked dirty) on first run
    pub fn load(ctx: &RuntimeContext) -> PgdbResult<Self> {
        match load_config(&ctx.config_path, &ctx.default_data_dir)? {
            Some(config) => {
                debug!(path = %ctx.config_path.display(), "loaded settings");
                Ok(Self {
                    config,
                    dirty: false,
                })
            }
            None => {
                debug!(path = %ctx.config_path.display(), "no settings file, using defaults");
                Ok(Self {
                    config: InstallationConfig::defaults(&ctx.default_data_dir),
                    dirty: true,
                })
            }
        }
    }

    pub fn from_config(config: InstallationConfig) -> Self {
        Self {
            config,
            dirty: false,
        }
    }

    pub fn config(&self) -> &InstallationConfig {
        &self.config
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Point the installation at `dir`
    pub fn set_data_directory(&mut self, dir: &Path) {
        self.config.relocate(dir);
        self.dirty = true;
    }

    /// Force the next `persist_if_changed` to write
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drop pending changes without writing them
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Write the settings if anything changed; returns whether a write happened
    pub fn persist_if_changed(&mut self, ctx: &RuntimeContext) -> PgdbResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        ctx.ensure_dirs()?;
        save_config(&ctx.config_path, &self.config)?;
        info!(path = %ctx.config_path.display(), "settings saved");
        self.dirty = false;
        Ok(true)
    }
}
