//! pgdb home directory layout and the runtime context shared by every command

use std::path::{self, Path, PathBuf};

use crate::component::Component;
use crate::error::{PgdbError, PgdbResult};
use crate::platform::PlatformProfile;

/// Environment variable overriding the config home (defaults to `~/.pgdb`)
pub const HOME_ENV: &str = "PGDB_HOME";

/// Environment variable pointing at a directory of replacement config templates
pub const TEMPLATES_ENV: &str = "PGDB_TEMPLATES";

/// Immutable paths and platform facts resolved once at process start.
///
/// Layout under the config home:
///
/// ```text
/// <home>/config.ini     settings
/// <home>/downloads/     scratch space for archives
/// <home>/influxd.pid    PID of the detached InfluxDB process
/// <home>/data/          default installation directory
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Root config home (`$PGDB_HOME` or `~/.pgdb`)
    pub config_home: PathBuf,
    /// `<home>/config.ini`
    pub config_path: PathBuf,
    /// `<home>/downloads`
    pub scratch_dir: PathBuf,
    /// `<home>/influxd.pid`
    pub pid_file: PathBuf,
    /// `<home>/data`
    pub default_data_dir: PathBuf,
    /// The invoking user's home directory
    pub user_home: PathBuf,
    /// Replacement templates directory, if `$PGDB_TEMPLATES` is set
    pub template_dir: Option<PathBuf>,
    pub platform: PlatformProfile,
}

impl RuntimeContext {
    /// Build a context rooted at an explicit config home
    pub fn with_home(config_home: PathBuf, user_home: PathBuf, platform: PlatformProfile) -> Self {
        Self {
            config_path: config_home.join("config.ini"),
            scratch_dir: config_home.join("downloads"),
            pid_file: config_home.join("influxd.pid"),
            default_data_dir: config_home.join("data"),
            config_home,
            user_home,
            template_dir: None,
            platform,
        }
    }

    /// Resolve the context from `$PGDB_HOME`, `$PGDB_TEMPLATES` and the user home
    pub fn from_env() -> PgdbResult<Self> {
        let user_home = dirs::home_dir();
        let config_home = match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => user_home
                .as_ref()
                .map(|h| h.join(".pgdb"))
                .ok_or(PgdbError::NoHomeDirectory)?,
        };
        let user_home = user_home.unwrap_or_else(|| config_home.clone());

        let mut ctx = Self::with_home(config_home, user_home, PlatformProfile::current());
        ctx.template_dir = std::env::var_os(TEMPLATES_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        Ok(ctx)
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Leftover Neo4j runtime state (`~/.neo4j`) that breaks a fresh start
    pub fn neo4j_runtime_dir(&self) -> PathBuf {
        self.user_home.join(".neo4j")
    }

    /// Install directory of a component under a data directory
    pub fn component_dir(&self, data_dir: &Path, component: Component) -> PathBuf {
        data_dir.join(component.dir_name())
    }

    /// Absolute path of a component's executable under a data directory
    pub fn executable(&self, data_dir: &Path, component: Component) -> PathBuf {
        self.component_dir(data_dir, component)
            .join(self.platform.executable(component))
    }

    /// Create the config home; failure here aborts the run
    pub fn ensure_dirs(&self) -> PgdbResult<()> {
        std::fs::create_dir_all(&self.config_home).map_err(|source| PgdbError::ConfigIo {
            path: self.config_home.clone(),
            source,
        })
    }

    /// Expand `~`, make a user-supplied directory absolute and drop `.`/`..`
    pub fn resolve_user_path(&self, raw: &Path) -> PgdbResult<PathBuf> {
        let expanded = match raw.strip_prefix("~") {
            Ok(rest) => self.user_home.join(rest),
            Err(_) => raw.to_path_buf(),
        };
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(expanded)
        };
        Ok(normalize_lexically(&absolute))
    }
}

/// Collapse `.` and `..` without touching the filesystem; `..` at the root stays at the root
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            path::Component::CurDir => {}
            path::Component::ParentDir => match out.components().next_back() {
                Some(path::Component::Normal(_)) => {
                    out.pop();
                }
                Some(path::Component::RootDir | path::Component::Prefix(_)) => {}
                _ => out.push(part),
            },
            other => out.push(other),
        }
    }
    out
}
