use crate::error::UpdaterError;
use crate::locator::registry::{ALL_HIVES, RegistryScope, RegistryView};
use crate::locator::{Probe, ProbeHost};
use crate::version::ProductVersion;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const APP_PATHS_ROOT: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths";

const UNINSTALL_ROOTS: [&str; 2] = [
    r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Explicit `Version` value below the vendor's own key.
pub struct RegistryVersionProbe {
    host: Arc<ProbeHost>,
}

impl RegistryVersionProbe {
    pub fn new(host: Arc<ProbeHost>) -> Self {
        Self { host }
    }
}

impl Probe for RegistryVersionProbe {
    fn name(&self) -> &'static str {
        "registry version"
    }

    fn probe(&self) -> Result<Option<ProductVersion>, UpdaterError> {
        let vendor = &self.host.profile.registry_key;
        let keys = [
            format!(r"SOFTWARE\{vendor}"),
            format!(r"SOFTWARE\WOW6432Node\{vendor}"),
        ];

        for (scope, view) in ALL_HIVES {
            for key in &keys {
                let value = match self.host.registry.read_string(scope, view, key, "Version") {
                    Ok(Some(v)) if !v.trim().is_empty() => v,
                    Ok(_) => continue,
                    Err(err) => {
                        tracing::debug!("Reading {:?}/{:?} {}: {}", scope, view, key, err);
                        continue;
                    }
                };

                match value.parse::<ProductVersion>() {
                    Ok(version) => return Ok(Some(version)),
                    Err(err) => tracing::debug!("Ignoring registry version in {}: {}", key, err),
                }
            }
        }

        Ok(None)
    }
}

/// Executable registered under "App Paths".
pub struct AppPathsProbe {
    host: Arc<ProbeHost>,
}

impl AppPathsProbe {
    pub fn new(host: Arc<ProbeHost>) -> Self {
        Self { host }
    }

    fn resolve(&self, scope: RegistryScope, view: RegistryView) -> Result<Option<PathBuf>, UpdaterError> {
        let executable = &self.host.profile.executable;
        let key = format!(r"{APP_PATHS_ROOT}\{executable}");
        let registry = &self.host.registry;

        if let Some(default) = registry.read_string(scope, view, &key, "")? {
            let candidate = PathBuf::from(strip_quotes(&default));
            if !default.trim().is_empty() && self.host.fs.is_file(&candidate) {
                return Ok(Some(candidate));
            }
        }

        if let Some(directory) = registry.read_string(scope, view, &key, "Path")? {
            let directory = strip_quotes(&directory);
            if !directory.is_empty() {
                let candidate = Path::new(directory).join(executable);
                if self.host.fs.is_file(&candidate) {
                    return Ok(Some(candidate));
                }
            }
        }

        Ok(None)
    }
}

impl Probe for AppPathsProbe {
    fn name(&self) -> &'static str {
        "app paths"
    }

    fn probe(&self) -> Result<Option<ProductVersion>, UpdaterError> {
        for (scope, view) in ALL_HIVES {
            match self.resolve(scope, view) {
                Ok(Some(path)) => return Ok(self.host.version_of(&path)),
                Ok(None) => {}
                Err(err) => tracing::debug!("App Paths lookup in {:?}/{:?}: {}", scope, view, err),
            }
        }

        Ok(None)
    }
}

/// Executable next to an entry of the installed programs list.
pub struct UninstallEntryProbe {
    host: Arc<ProbeHost>,
}

impl UninstallEntryProbe {
    pub fn new(host: Arc<ProbeHost>) -> Self {
        Self { host }
    }

    fn resolve_entry(
        &self,
        scope: RegistryScope,
        view: RegistryView,
        key: &str,
    ) -> Result<Option<PathBuf>, UpdaterError> {
        let registry = &self.host.registry;
        let profile = &self.host.profile;

        let Some(display_name) = registry.read_string(scope, view, key, "DisplayName")? else {
            return Ok(None);
        };

        if !display_name
            .to_lowercase()
            .contains(&profile.name.to_lowercase())
        {
            return Ok(None);
        }

        tracing::trace!("Found uninstall entry {:?} at {}", display_name, key);

        if let Some(location) = registry.read_string(scope, view, key, "InstallLocation")? {
            let location = strip_quotes(&location);
            if !location.is_empty() {
                let candidate = Path::new(location).join(&profile.executable);
                if self.host.fs.is_file(&candidate) {
                    return Ok(Some(candidate));
                }
            }
        }

        if let Some(icon) = registry.read_string(scope, view, key, "DisplayIcon")? {
            let cleaned = strip_quotes(strip_icon_index(&icon));
            if !cleaned.is_empty() {
                let candidate = PathBuf::from(cleaned);
                if self.host.fs.is_file(&candidate) {
                    return Ok(Some(candidate));
                }
            }
        }

        if let Some(uninstall) = registry.read_string(scope, view, key, "UninstallString")? {
            if let Some(directory) = parent_directory(command_path(&uninstall)) {
                let candidate = Path::new(directory).join(&profile.executable);
                if self.host.fs.is_file(&candidate) {
                    return Ok(Some(candidate));
                }
            }
        }

        Ok(None)
    }
}

impl Probe for UninstallEntryProbe {
    fn name(&self) -> &'static str {
        "uninstall entries"
    }

    fn probe(&self) -> Result<Option<ProductVersion>, UpdaterError> {
        for (scope, view) in ALL_HIVES {
            for root in UNINSTALL_ROOTS {
                let entries = match self.host.registry.subkeys(scope, view, root) {
                    Ok(v) => v,
                    Err(err) => {
                        tracing::debug!("Listing {:?}/{:?} {}: {}", scope, view, root, err);
                        continue;
                    }
                };

                for entry in entries {
                    let key = format!(r"{root}\{entry}");

                    match self.resolve_entry(scope, view, &key) {
                        Ok(Some(path)) => return Ok(self.host.version_of(&path)),
                        Ok(None) => {}
                        Err(err) => tracing::trace!("Skipping uninstall entry {}: {}", key, err),
                    }
                }
            }
        }

        Ok(None)
    }
}

/// Default install directories on every fixed drive.
pub struct DriveScanProbe {
    host: Arc<ProbeHost>,
}

impl DriveScanProbe {
    pub fn new(host: Arc<ProbeHost>) -> Self {
        Self { host }
    }
}

impl Probe for DriveScanProbe {
    fn name(&self) -> &'static str {
        "fixed drive scan"
    }

    fn probe(&self) -> Result<Option<ProductVersion>, UpdaterError> {
        let locations = self.host.profile.default_install_locations();

        for root in self.host.fs.fixed_drive_roots()? {
            for relative in &locations {
                let candidate = root.join(relative);
                if self.host.fs.is_file(&candidate) {
                    return Ok(self.host.version_of(&candidate));
                }
            }
        }

        Ok(None)
    }
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"')
}

/// `C:\app\app.exe,0` -> `C:\app\app.exe`
fn strip_icon_index(value: &str) -> &str {
    match value.find(',') {
        Some(idx) => &value[..idx],
        None => value,
    }
}

/// Program part of a command line: the quoted token, or everything before the
/// first switch when unquoted.
///
/// `"C:\app\uninst.exe" /S` -> `C:\app\uninst.exe`
fn command_path(command: &str) -> &str {
    let command = command.trim();

    if let Some(quoted) = command.strip_prefix('"') {
        return match quoted.find('"') {
            Some(end) => &quoted[..end],
            None => quoted,
        };
    }

    match command.find(" /") {
        Some(idx) => command[..idx].trim_end(),
        None => command,
    }
}

/// Directory part of a Windows style path, independent of the host's separator.
fn parent_directory(path: &str) -> Option<&str> {
    let idx = path.rfind(['\\', '/'])?;
    let directory = path[..idx].trim_end();

    if directory.is_empty() {
        None
    } else {
        Some(directory)
    }
}
