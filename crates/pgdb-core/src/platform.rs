//! Platform-dependent naming for archives and executables.
//!
//! Everything that differs between Windows, macOS and Linux is answered by a
//! [`PlatformProfile`] selected once at startup, so the fetcher and the
//! supervisor never branch on the host OS themselves.

use std::path::PathBuf;

use crate::component::Component;

/// Host operating system bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn all() -> &'static [Platform] {
        &[Platform::Windows, Platform::MacOs, Platform::Linux]
    }
}

/// Archive container format of a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// File extension used for the scratch copy of the archive
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

/// Per-platform answers to "what is this file called and how do I run it"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    platform: Platform,
}

impl PlatformProfile {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn current() -> Self {
        Self::new(Platform::current())
    }

    /// Distribution suffix appended to the release name in the download URL
    pub fn archive_suffix(&self, component: Component) -> &'static str {
        match (component, self.platform) {
            (Component::Neo4j, Platform::Windows) => "windows.zip",
            (Component::Neo4j, _) => "unix.tar.gz",
            (Component::InfluxDb, Platform::Windows) => "windows_amd64.zip",
            (Component::InfluxDb, Platform::MacOs) => "darwin_amd64.tar.gz",
            (Component::InfluxDb, Platform::Linux) => "linux_amd64.tar.gz",
        }
    }

    pub fn archive_format(&self, component: Component) -> ArchiveFormat {
        if self.archive_suffix(component).ends_with(".zip") {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::TarGz
        }
    }

    /// File name of the downloaded archive inside the scratch directory
    pub fn archive_file_name(&self, component: Component) -> String {
        format!(
            "{}.{}",
            component.dir_name(),
            self.archive_format(component).extension()
        )
    }

    /// Executable path relative to the component's install directory
    pub fn executable(&self, component: Component) -> PathBuf {
        match (component, self.platform) {
            (Component::Neo4j, Platform::Windows) => ["bin", "neo4j.bat"].iter().collect(),
            (Component::Neo4j, _) => ["bin", "neo4j"].iter().collect(),
            (Component::InfluxDb, Platform::Windows) => PathBuf::from("influxd.exe"),
            (Component::InfluxDb, _) => ["usr", "bin", "influxd"].iter().collect(),
        }
    }

    /// Whether the component is registered as a native OS service needing elevation
    pub fn requires_service_registration(&self, component: Component) -> bool {
        self.platform == Platform::Windows && component == Component::Neo4j
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::current()
    }
}
