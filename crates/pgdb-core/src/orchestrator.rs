//! Command-level sequencing: install, uninstall, start, stop.
//!
//! `install` walks a fixed sequence:
//!
//! ```text
//! resolve target dir -> confirm overwrite (if it exists) -> remove prior install
//!   -> fetch neo4j -> configure neo4j -> fetch influxdb -> configure influxdb
//!   -> clean scratch -> persist settings
//! ```
//!
//! An existing target directory is either removed entirely or the install is
//! aborted; installs are never merged into an existing tree.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::component::Component;
use crate::config::ConfigStore;
use crate::context::RuntimeContext;
use crate::error::{PgdbError, PgdbResult};
use crate::fetch::{self, ArchiveSource, FetchOutcome, HookOutcome, ProgressSink};
use crate::supervisor::{ServiceHandle, StopOutcome, Supervisor};
use crate::template::{self, Sanitize, INFLUXDB_TEMPLATE, NEO4J_TEMPLATE};

/// Asks the user yes/no questions
pub trait Prompt {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Options of the `install` command
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Explicit install directory; falls back to the default data directory
    pub directory: Option<PathBuf>,
    /// Never prompt
    pub quiet: bool,
    /// Download fresh distributions even if a component directory exists
    pub download: bool,
}

/// Why an install stopped before doing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declined {
    /// User rejected installing into the default directory
    DefaultDirectory,
    /// User rejected overwriting an existing directory
    Overwrite,
}

/// Summary of a completed install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub data_dir: PathBuf,
    pub components: Vec<(Component, FetchOutcome)>,
    /// Non-fatal problems (e.g. service registration without elevation)
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(InstallReport),
    Declined(Declined),
}

/// Summary of an uninstall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub data_dir: PathBuf,
    /// False when there was no installation directory to remove
    pub data_dir_existed: bool,
    pub warnings: Vec<String>,
}

/// Runs pgdb commands against one runtime context and its settings
pub struct Orchestrator<'a> {
    ctx: &'a RuntimeContext,
    store: ConfigStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a RuntimeContext, store: ConfigStore) -> Self {
        Self { ctx, store }
    }

    /// Load settings for `ctx` (defaults on first run)
    pub fn load(ctx: &'a RuntimeContext) -> PgdbResult<Self> {
        Ok(Self::new(ctx, ConfigStore::load(ctx)?))
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn data_dir(&self) -> &Path {
        &self.store.config().data.directory
    }

    fn supervisor(&self) -> Supervisor<'a> {
        Supervisor::new(self.ctx, self.data_dir().to_path_buf())
    }

    /// Install both services
    pub fn install(
        &mut self,
        options: &InstallOptions,
        prompt: &mut dyn Prompt,
        source: &dyn ArchiveSource,
        progress: &mut dyn ProgressSink,
    ) -> PgdbResult<InstallOutcome> {
        let directory = match &options.directory {
            Some(raw) => self.ctx.resolve_user_path(raw)?,
            None => {
                let directory = self.ctx.default_data_dir.clone();
                if !options.quiet
                    && !prompt.confirm(&format!(
                        "No install directory was specified, so required files will be installed to {}. Is that okay?",
                        directory.display()
                    ))
                {
                    self.store.mark_clean();
                    return Ok(InstallOutcome::Declined(Declined::DefaultDirectory));
                }
                directory
            }
        };
        if self.store.config().data.directory != directory {
            self.store.set_data_directory(&directory);
        }
        info!(path = %directory.display(), "install target resolved");

        if directory.exists() {
            if options.quiet {
                if !looks_like_installation(&directory)? {
                    return Err(PgdbError::UnrelatedDirectory(directory));
                }
            } else if !prompt.confirm(&format!(
                "The directory {} already exists, would you like to overwrite it?",
                directory.display()
            )) {
                self.store.mark_clean();
                return Ok(InstallOutcome::Declined(Declined::Overwrite));
            }
            info!(path = %directory.display(), "removing previous installation");
            self.remove_installation(&directory)?;
            // The settings file went away with the config home
            self.store.mark_dirty();
        }

        let result = self.install_components(&directory, options.download, source, progress);
        remove_dir_if_exists(&self.ctx.scratch_dir)?;
        let report = result?;

        self.store.persist_if_changed(self.ctx)?;
        Ok(InstallOutcome::Installed(report))
    }

    fn install_components(
        &self,
        directory: &Path,
        overwrite: bool,
        source: &dyn ArchiveSource,
        progress: &mut dyn ProgressSink,
    ) -> PgdbResult<InstallReport> {
        let mut report = InstallReport {
            data_dir: directory.to_path_buf(),
            components: Vec::new(),
            warnings: Vec::new(),
        };

        for &component in Component::all() {
            let outcome = fetch::fetch(
                self.ctx,
                source,
                component,
                component.default_version(),
                directory,
                overwrite,
                progress,
            )?;
            if matches!(outcome, FetchOutcome::Installed(_)) {
                if let HookOutcome::Warning(warning) = fetch::post_install(self.ctx, component, directory) {
                    report.warnings.push(warning);
                }
            }
            self.configure(component, directory)?;
            report.components.push((component, outcome));
        }

        Ok(report)
    }

    /// Render a component's config file from its template and the current settings
    pub fn configure(&self, component: Component, directory: &Path) -> PgdbResult<PathBuf> {
        let config = self.store.config();
        let (values, sanitize, bundled) = match component {
            Component::Neo4j => (config.neo4j.template_values(), Sanitize::None, NEO4J_TEMPLATE),
            Component::InfluxDb => (
                config.influxdb.template_values(),
                Sanitize::ForwardSlashes,
                INFLUXDB_TEMPLATE,
            ),
        };
        let output = Supervisor::new(self.ctx, directory).config_path(component);
        let file_name = format!("{}.conf", component.dir_name());

        match &self.ctx.template_dir {
            Some(dir) => template::render(&dir.join(&file_name), &output, &values, sanitize)?,
            None => template::render_to(&file_name, bundled, &output, &values, sanitize)?,
        }
        info!(%component, path = %output.display(), "configured");
        Ok(output)
    }

    /// Remove the installation directory and the config home
    pub fn uninstall(&mut self) -> PgdbResult<UninstallReport> {
        let directory = self.data_dir().to_path_buf();
        let report = self.remove_installation(&directory)?;
        // The settings file was just deleted with the config home
        self.store.mark_clean();
        Ok(report)
    }

    fn remove_installation(&self, directory: &Path) -> PgdbResult<UninstallReport> {
        let mut report = UninstallReport {
            data_dir: directory.to_path_buf(),
            data_dir_existed: directory.exists(),
            warnings: Vec::new(),
        };

        if report.data_dir_existed {
            let supervisor = Supervisor::new(self.ctx, directory);
            if let HookOutcome::Warning(warning) = supervisor.unregister_service() {
                report.warnings.push(warning);
            }
        } else {
            debug!(path = %directory.display(), "no installation directory to remove");
        }

        remove_dir_if_exists(directory)?;
        remove_dir_if_exists(&self.ctx.config_home)?;
        Ok(report)
    }

    /// Start Neo4j, then InfluxDB
    pub fn start(&self) -> PgdbResult<Vec<ServiceHandle>> {
        self.supervisor().start_all()
    }

    /// Stop Neo4j, then InfluxDB; safe to repeat
    pub fn stop(&self) -> Vec<(Component, StopOutcome)> {
        self.supervisor().stop_all()
    }

    /// Persist settings if this invocation changed them
    pub fn finish(mut self) -> PgdbResult<bool> {
        self.store.persist_if_changed(self.ctx)
    }
}

/// Empty, or holding a component directory from an earlier install
fn looks_like_installation(dir: &Path) -> PgdbResult<bool> {
    let mut empty = true;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        empty = false;
        let is_component = entry
            .file_name()
            .to_str()
            .and_then(Component::from_dir_name)
            .is_some();
        if is_component && entry.path().is_dir() {
            return Ok(true);
        }
    }
    Ok(empty)
}

fn remove_dir_if_exists(dir: &Path) -> PgdbResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "removed directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "could not remove directory");
            Err(e.into())
        }
    }
}
