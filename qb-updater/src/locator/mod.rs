mod host;
mod probes;
mod registry;
mod resource;

pub use host::{HostFs, SystemFs};
pub use probes::{AppPathsProbe, DriveScanProbe, RegistryVersionProbe, UninstallEntryProbe};
pub use registry::{
    ALL_HIVES, EmptyRegistry, Registry, RegistryScope, RegistryView, host_registry,
};

use crate::error::UpdaterError;
use crate::product::ProductProfile;
use crate::version::ProductVersion;
use std::path::Path;
use std::sync::Arc;

/// One read-only attempt at finding the installed version.
///
/// `Ok(None)` means "not found here", an error means the probe could not
/// complete. Either way the cascade moves on.
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    fn probe(&self) -> Result<Option<ProductVersion>, UpdaterError>;
}

/// Host access shared by the built-in probes.
pub struct ProbeHost {
    pub profile: ProductProfile,
    pub registry: Arc<dyn Registry>,
    pub fs: Arc<dyn HostFs>,
}

impl ProbeHost {
    /// Embedded version of an executable; unreadable metadata is a non-match.
    pub fn version_of(&self, path: &Path) -> Option<ProductVersion> {
        match self.fs.file_version(path) {
            Ok(Some(version)) => Some(version),
            Ok(None) => {
                tracing::debug!("{} carries no version resource", path.display());
                None
            }
            Err(err) => {
                tracing::debug!("Failed to read version of {}: {}", path.display(), err);
                None
            }
        }
    }
}

/// Finds the installed version by running probes in order until one succeeds.
pub struct VersionLocator {
    probes: Vec<Box<dyn Probe>>,
}

impl VersionLocator {
    /// The standard cascade: registry version, App Paths, uninstall entries,
    /// then a scan of all fixed drives.
    pub fn new(
        profile: ProductProfile,
        registry: Arc<dyn Registry>,
        fs: Arc<dyn HostFs>,
    ) -> Self {
        let host = Arc::new(ProbeHost {
            profile,
            registry,
            fs,
        });

        Self::with_probes(vec![
            Box::new(RegistryVersionProbe::new(host.clone())),
            Box::new(AppPathsProbe::new(host.clone())),
            Box::new(UninstallEntryProbe::new(host.clone())),
            Box::new(DriveScanProbe::new(host)),
        ])
    }

    /// Locator probing the machine we are running on.
    pub fn for_host(profile: ProductProfile) -> Self {
        Self::new(profile, host_registry(), Arc::new(SystemFs))
    }

    pub fn with_probes(probes: Vec<Box<dyn Probe>>) -> Self {
        Self { probes }
    }

    #[tracing::instrument(skip(self))]
    pub fn locate(&self) -> Option<ProductVersion> {
        for probe in &self.probes {
            match probe.probe() {
                Ok(Some(version)) => {
                    tracing::debug!("Probe '{}' found version {}", probe.name(), version);
                    return Some(version);
                }
                Ok(None) => tracing::trace!("Probe '{}' found nothing", probe.name()),
                Err(err) => tracing::debug!("Probe '{}' failed: {}", probe.name(), err),
            }
        }

        None
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeFs, FakeRegistry};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        result: fn() -> Result<Option<ProductVersion>, UpdaterError>,
    }

    impl Probe for CountingProbe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn probe(&self) -> Result<Option<ProductVersion>, UpdaterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn counting(
        name: &'static str,
        result: fn() -> Result<Option<ProductVersion>, UpdaterError>,
    ) -> (Box<dyn Probe>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = CountingProbe {
            name,
            calls: calls.clone(),
            result,
        };

        (Box::new(probe), calls)
    }

    #[test]
    fn first_success_stops_the_cascade() {
        let (first, first_calls) = counting("first", || Ok(Some(ProductVersion::new(4, 6, 0))));
        let (second, second_calls) = counting("second", || Ok(Some(ProductVersion::new(1, 0, 0))));
        let (third, third_calls) = counting("third", || Ok(None));
        let (fourth, fourth_calls) = counting("fourth", || Ok(None));

        let locator = VersionLocator::with_probes(vec![first, second, third, fourth]);

        assert_eq!(locator.locate(), Some(ProductVersion::new(4, 6, 0)));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fourth_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_probes_do_not_abort_the_cascade() {
        let (failing, failing_calls) = counting("failing", || {
            Err(UpdaterError::GenericIo(std::io::Error::other("registry unavailable")))
        });
        let (empty, empty_calls) = counting("empty", || Ok(None));
        let (found, found_calls) = counting("found", || Ok(Some(ProductVersion::new(4, 6, 5))));

        let locator = VersionLocator::with_probes(vec![failing, empty, found]);

        assert_eq!(locator.locate(), Some(ProductVersion::new(4, 6, 5)));
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(empty_calls.load(Ordering::SeqCst), 1);
        assert_eq!(found_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nothing_found_is_none() {
        let locator = VersionLocator::new(
            crate::product::test_profile(),
            Arc::new(EmptyRegistry),
            Arc::new(FakeFs::default()),
        );

        assert_eq!(locator.locate(), None);
    }

    #[test]
    fn registry_version_wins_over_executables() {
        let registry = FakeRegistry::default().with_value(
            RegistryScope::Machine,
            RegistryView::Bits64,
            r"SOFTWARE\qBittorrent",
            "Version",
            "4.6.5",
        );
        let fs = FakeFs::default().with_drives(&["C:\\"]).with_executable(
            &Path::new("C:\\")
                .join("Program Files")
                .join("qBittorrent")
                .join("qbittorrent.exe"),
            ProductVersion::new(4, 0, 0),
        );

        let locator = VersionLocator::new(
            crate::product::test_profile(),
            Arc::new(registry),
            Arc::new(fs),
        );

        assert_eq!(locator.locate(), Some(ProductVersion::new(4, 6, 5)));
    }

    #[test]
    fn denied_hives_fall_through_to_drive_scan() {
        let mut registry = FakeRegistry::default();
        for (scope, view) in ALL_HIVES {
            registry = registry.deny(scope, view);
        }

        let fs = FakeFs::default().with_drives(&["C:\\"]).with_executable(
            &Path::new("C:\\")
                .join("Program Files")
                .join("qBittorrent")
                .join("qbittorrent.exe"),
            ProductVersion::new(4, 6, 1),
        );

        let locator = VersionLocator::new(
            crate::product::test_profile(),
            Arc::new(registry),
            Arc::new(fs),
        );

        assert_eq!(locator.locate(), Some(ProductVersion::new(4, 6, 1)));
    }
}
