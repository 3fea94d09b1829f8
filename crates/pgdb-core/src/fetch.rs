//! Download and unpack platform-specific database distributions.
//!
//! A fetch resolves a [`DownloadSpec`], streams the archive into the scratch
//! directory through an [`ArchiveSource`], unpacks it into the target data
//! directory and renames the version-qualified top-level directory
//! (`neo4j-community-5.21.0`, `influxdb-1.8.9-1`) to the component's canonical
//! name so later steps never need to know the version.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::component::Component;
use crate::context::RuntimeContext;
use crate::error::{PgdbError, PgdbResult};
use crate::platform::{ArchiveFormat, PlatformProfile};
use crate::supervisor;

const CHUNK_SIZE: usize = 64 * 1024;

/// Receives byte-level download progress.
///
/// `start` is called before the request is sent, `set_total` once response
/// headers arrive (`None` when the server does not announce a length).
pub trait ProgressSink {
    fn start(&mut self, label: &str);
    fn set_total(&mut self, total: Option<u64>);
    fn advance(&mut self, bytes: u64);
    fn finish(&mut self);
}

/// Progress sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _label: &str) {}
    fn set_total(&mut self, _total: Option<u64>) {}
    fn advance(&mut self, _bytes: u64) {}
    fn finish(&mut self) {}
}

/// Everything needed to retrieve one distribution archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
    pub component: Component,
    pub version: String,
    pub suffix: &'static str,
    pub format: ArchiveFormat,
    pub url: String,
    /// Where the archive is written inside the scratch directory
    pub archive_path: PathBuf,
    /// Directory the archive is unpacked into
    pub target_dir: PathBuf,
}

impl DownloadSpec {
    pub fn resolve(
        component: Component,
        version: &str,
        profile: &PlatformProfile,
        scratch_dir: &Path,
        target_dir: &Path,
    ) -> Self {
        Self {
            component,
            version: version.to_string(),
            suffix: profile.archive_suffix(component),
            format: profile.archive_format(component),
            url: download_url(component, version, profile),
            archive_path: scratch_dir.join(profile.archive_file_name(component)),
            target_dir: target_dir.to_path_buf(),
        }
    }
}

/// Build the release download URL for a component on a platform
pub fn download_url(component: Component, version: &str, profile: &PlatformProfile) -> String {
    let suffix = profile.archive_suffix(component);
    match component {
        Component::Neo4j => format!(
            "https://neo4j.com/artifact.php?name=neo4j-community-{}-{}",
            version, suffix
        ),
        Component::InfluxDb => format!(
            "https://dl.influxdata.com/influxdb/releases/influxdb-{}_{}",
            version, suffix
        ),
    }
}

/// Where distribution archives come from
pub trait ArchiveSource {
    /// Write the archive described by `spec` to `spec.archive_path`
    fn retrieve(&self, spec: &DownloadSpec, progress: &mut dyn ProgressSink) -> PgdbResult<()>;
}

/// Streams archives over HTTP(S).
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpSource;

impl ArchiveSource for HttpSource {
    fn retrieve(&self, spec: &DownloadSpec, progress: &mut dyn ProgressSink) -> PgdbResult<()> {
        let download_err = |message: String| PgdbError::Download {
            url: spec.url.clone(),
            message,
        };

        let response = match ureq::get(&spec.url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(download_err(format!("HTTP {code}"))),
            Err(e) => return Err(download_err(e.to_string())),
        };

        let total = response
            .header("Content-Length")
            .and_then(|len| len.parse::<u64>().ok());
        progress.set_total(total);
        debug!(url = %spec.url, ?total, "download started");

        let mut reader = response.into_reader();
        let mut file = File::create(&spec.archive_path).map_err(|source| PgdbError::Write {
            path: spec.archive_path.clone(),
            source,
        })?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(download_err(e.to_string())),
            };
            file.write_all(&buf[..n])
                .map_err(|source| PgdbError::Write {
                    path: spec.archive_path.clone(),
                    source,
                })?;
            progress.advance(n as u64);
        }
        file.flush()?;
        Ok(())
    }
}

/// Result of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fresh distribution was downloaded and unpacked
    Installed(PathBuf),
    /// The component directory already existed and overwrite was not requested
    ExistingUsed(PathBuf),
}

/// Download and unpack `component` into `target_dir/<component>`.
pub fn fetch(
    ctx: &RuntimeContext,
    source: &dyn ArchiveSource,
    component: Component,
    version: &str,
    target_dir: &Path,
    overwrite: bool,
    progress: &mut dyn ProgressSink,
) -> PgdbResult<FetchOutcome> {
    let component_dir = ctx.component_dir(target_dir, component);
    if component_dir.exists() {
        if !overwrite {
            info!(%component, path = %component_dir.display(), "existing installation used");
            return Ok(FetchOutcome::ExistingUsed(component_dir));
        }
        fs::remove_dir_all(&component_dir)?;
    }

    fs::create_dir_all(&ctx.scratch_dir).map_err(|source| PgdbError::Write {
        path: ctx.scratch_dir.clone(),
        source,
    })?;
    fs::create_dir_all(target_dir).map_err(|source| PgdbError::Write {
        path: target_dir.to_path_buf(),
        source,
    })?;

    let spec = DownloadSpec::resolve(component, version, &ctx.platform, &ctx.scratch_dir, target_dir);
    info!(%component, url = %spec.url, "downloading");
    progress.start(&format!("Downloading {component}..."));
    let retrieved = source.retrieve(&spec, progress);
    progress.finish();
    retrieved?;

    extract_archive(&spec.archive_path, spec.format, target_dir)?;
    let installed = normalize_extracted(target_dir, component)?;
    info!(%component, path = %installed.display(), "installed");
    Ok(FetchOutcome::Installed(installed))
}

/// Unpack an archive into `out_dir`
pub fn extract_archive(archive: &Path, format: ArchiveFormat, out_dir: &Path) -> PgdbResult<()> {
    match format {
        ArchiveFormat::Zip => extract_zip(archive, out_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive, out_dir),
    }
}

fn extract_zip(archive_path: &Path, out_dir: &Path) -> PgdbResult<()> {
    let extraction_err = |message: String| PgdbError::Extraction {
        archive: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path).map_err(|e| extraction_err(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| extraction_err(e.to_string()))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| extraction_err(e.to_string()))?;
        let Some(name) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = entry.name(), "skipping archive entry outside target");
            continue;
        };
        let target = out_dir.join(name);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&target)?;
        io::copy(&mut entry, &mut outfile).map_err(|e| extraction_err(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    debug!(archive = %archive_path.display(), out = %out_dir.display(), "extracted zip");
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, out_dir: &Path) -> PgdbResult<()> {
    let extraction_err = |message: String| PgdbError::Extraction {
        archive: archive_path.to_path_buf(),
        message,
    };

    let tar = which::which("tar").map_err(|_| extraction_err("`tar` not found on PATH".into()))?;
    let output = Command::new(tar)
        .arg("-xzf")
        .arg(archive_path)
        .arg("-C")
        .arg(out_dir)
        .output()
        .map_err(|e| extraction_err(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(extraction_err(stderr.trim().to_string()));
    }
    debug!(archive = %archive_path.display(), out = %out_dir.display(), "extracted tarball");
    Ok(())
}

/// Rename the extracted `<prefix>*` directory to the canonical component name
pub fn normalize_extracted(target_dir: &Path, component: Component) -> PgdbResult<PathBuf> {
    let canonical = target_dir.join(component.dir_name());
    let prefix = component.extracted_prefix();

    let mut candidates: Vec<PathBuf> = fs::read_dir(target_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .filter(|path| path != &canonical)
        .collect();
    candidates.sort();

    match candidates.first() {
        Some(extracted) => {
            fs::rename(extracted, &canonical)?;
            debug!(from = %extracted.display(), to = %canonical.display(), "normalized install dir");
            Ok(canonical)
        }
        None if canonical.is_dir() => Ok(canonical),
        None => Err(PgdbError::Rename {
            prefix: prefix.to_string(),
            directory: target_dir.to_path_buf(),
        }),
    }
}

/// Outcome of the optional post-install hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Nothing to do on this platform
    Skipped,
    /// The privileged service command ran
    Completed,
    /// Registration failed; installation continues
    Warning(String),
}

/// Register the component as a native OS service where the platform needs it
pub fn post_install(ctx: &RuntimeContext, component: Component, data_dir: &Path) -> HookOutcome {
    if !ctx.platform.requires_service_registration(component) {
        return HookOutcome::Skipped;
    }
    let exe = ctx.executable(data_dir, component);
    match supervisor::run_elevated(&exe, &["windows-service", "install"]) {
        Ok(()) => HookOutcome::Completed,
        Err(e) => {
            warn!(%component, error = %e, "service registration failed");
            HookOutcome::Warning(format!(
                "Could not register {component} as a service (elevation required): {e}"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use std::cell::Cell;
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn profile(platform: Platform) -> PlatformProfile {
        PlatformProfile::new(platform)
    }

    #[test]
    fn test_neo4j_urls() {
        assert_eq!(
            download_url(Component::Neo4j, "5.21.0", &profile(Platform::Windows)),
            "https://neo4j.com/artifact.php?name=neo4j-community-5.21.0-windows.zip"
        );
        for platform in [Platform::MacOs, Platform::Linux] {
            assert_eq!(
                download_url(Component::Neo4j, "5.21.0", &profile(platform)),
                "https://neo4j.com/artifact.php?name=neo4j-community-5.21.0-unix.tar.gz"
            );
        }
    }

    #[test]
    fn test_influxdb_urls() {
        let base = "https://dl.influxdata.com/influxdb/releases/influxdb-1.8.9_";
        assert_eq!(
            download_url(Component::InfluxDb, "1.8.9", &profile(Platform::Windows)),
            format!("{base}windows_amd64.zip")
        );
        assert_eq!(
            download_url(Component::InfluxDb, "1.8.9", &profile(Platform::MacOs)),
            format!("{base}darwin_amd64.tar.gz")
        );
        assert_eq!(
            download_url(Component::InfluxDb, "1.8.9", &profile(Platform::Linux)),
            format!("{base}linux_amd64.tar.gz")
        );
    }

    #[test]
    fn test_download_spec_paths() {
        let spec = DownloadSpec::resolve(
            Component::InfluxDb,
            "1.8.9",
            &profile(Platform::Linux),
            Path::new("/home/u/.pgdb/downloads"),
            Path::new("/srv/pg"),
        );
        assert_eq!(
            spec.archive_path,
            PathBuf::from("/home/u/.pgdb/downloads/influxdb.tar.gz")
        );
        assert_eq!(spec.format, ArchiveFormat::TarGz);
        assert_eq!(spec.target_dir, PathBuf::from("/srv/pg"));
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, contents) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_zip_and_normalize() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("neo4j.zip");
        write_zip(
            &archive,
            &[
                ("neo4j-community-5.21.0/bin/neo4j.bat", "@echo off"),
                ("neo4j-community-5.21.0/conf/neo4j.conf", "# stock"),
            ],
        );
        let target = tmp.path().join("data");
        fs::create_dir_all(&target).unwrap();

        extract_archive(&archive, ArchiveFormat::Zip, &target).unwrap();
        let installed = normalize_extracted(&target, Component::Neo4j).unwrap();

        assert_eq!(installed, target.join("neo4j"));
        assert!(installed.join("bin").join("neo4j.bat").exists());
        assert!(!target.join("neo4j-community-5.21.0").exists());
    }

    #[test]
    fn test_corrupt_zip_is_extraction_error() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_archive(&archive, ArchiveFormat::Zip, tmp.path()).unwrap_err();
        assert!(matches!(err, PgdbError::Extraction { .. }));
    }

    #[test]
    fn test_normalize_without_match_is_rename_error() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("something-else")).unwrap();

        let err = normalize_extracted(tmp.path(), Component::InfluxDb).unwrap_err();
        assert!(matches!(err, PgdbError::Rename { .. }));
    }

    #[test]
    fn test_normalize_leaves_other_components_alone() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("neo4j")).unwrap();
        fs::create_dir_all(tmp.path().join("influxdb-1.8.9-1")).unwrap();

        normalize_extracted(tmp.path(), Component::InfluxDb).unwrap();

        assert!(tmp.path().join("neo4j").is_dir());
        assert!(tmp.path().join("influxdb").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_tar_gz() {
        let tmp = tempdir().unwrap();
        let staging = tmp.path().join("staging");
        fs::create_dir_all(staging.join("influxdb-1.8.9-1/usr/bin")).unwrap();
        fs::write(staging.join("influxdb-1.8.9-1/usr/bin/influxd"), "#!/bin/sh\n").unwrap();
        let archive = tmp.path().join("influxdb.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(&staging)
            .arg("influxdb-1.8.9-1")
            .status()
            .unwrap();
        assert!(status.success());

        let target = tmp.path().join("data");
        fs::create_dir_all(&target).unwrap();
        extract_archive(&archive, ArchiveFormat::TarGz, &target).unwrap();
        normalize_extracted(&target, Component::InfluxDb).unwrap();

        assert!(target.join("influxdb/usr/bin/influxd").exists());
    }

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl ArchiveSource for CountingSource {
        fn retrieve(&self, _spec: &DownloadSpec, _progress: &mut dyn ProgressSink) -> PgdbResult<()> {
            self.calls.set(self.calls.get() + 1);
            Err(PgdbError::Download {
                url: "test://".into(),
                message: "offline".into(),
            })
        }
    }

    #[test]
    fn test_existing_install_is_reused_without_overwrite() {
        let tmp = tempdir().unwrap();
        let ctx = RuntimeContext::with_home(
            tmp.path().join("home"),
            tmp.path().to_path_buf(),
            profile(Platform::Linux),
        );
        let data = tmp.path().join("data");
        fs::create_dir_all(data.join("neo4j")).unwrap();
        let source = CountingSource { calls: Cell::new(0) };

        let outcome = fetch(&ctx, &source, Component::Neo4j, "5.21.0", &data, false, &mut NoProgress)
            .unwrap();

        assert_eq!(outcome, FetchOutcome::ExistingUsed(data.join("neo4j")));
        assert_eq!(source.calls.get(), 0);
    }

    #[test]
    fn test_download_failure_propagates() {
        let tmp = tempdir().unwrap();
        let ctx = RuntimeContext::with_home(
            tmp.path().join("home"),
            tmp.path().to_path_buf(),
            profile(Platform::Linux),
        );
        let data = tmp.path().join("data");
        fs::create_dir_all(data.join("neo4j")).unwrap();
        let source = CountingSource { calls: Cell::new(0) };

        let err = fetch(&ctx, &source, Component::Neo4j, "5.21.0", &data, true, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, PgdbError::Download { .. }));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_post_install_skipped_off_windows() {
        let ctx = RuntimeContext::with_home(
            PathBuf::from("/tmp/h"),
            PathBuf::from("/tmp/u"),
            profile(Platform::Linux),
        );
        assert_eq!(
            post_install(&ctx, Component::Neo4j, Path::new("/srv/pg")),
            HookOutcome::Skipped
        );
    }
}
