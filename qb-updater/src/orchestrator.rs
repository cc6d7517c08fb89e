use crate::feed::ReleaseInfo;
use crate::locator::VersionLocator;
use crate::ui::UiHandle;
use crate::version::{self, ProductVersion};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

/// Source of the installed version.
pub trait Locate: Send + Sync + 'static {
    fn locate(&self) -> Option<ProductVersion>;
}

impl Locate for VersionLocator {
    fn locate(&self) -> Option<ProductVersion> {
        VersionLocator::locate(self)
    }
}

/// Source of the newest published release. Failures are reported by the
/// implementation itself and surface here as `None`.
pub trait ReleaseSource: Send + Sync {
    fn resolve_latest(&self) -> impl Future<Output = Option<ReleaseInfo>> + Send;
}

/// Downloads and launches an installer. Returns whether the installer was
/// launched; failures are reported by the implementation itself.
pub trait InstallBackend: Send + Sync {
    fn download_and_install(&self, release: &ReleaseInfo) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Idle,
    Checking,
}

/// How a check cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    AlreadyRunning,
    NotInstalled,
    ReleaseUnavailable,
    UpToDate(ProductVersion),
    Declined(ProductVersion),
    Installed(ProductVersion),
    InstallFailed(ProductVersion),
}

/// Runs check cycles: locate, resolve, compare and optionally install.
///
/// At most one cycle runs at a time; overlapping requests return
/// [`CycleOutcome::AlreadyRunning`] without doing anything.
pub struct UpdateOrchestrator<L, R, I> {
    product: String,
    locator: Arc<L>,
    releases: R,
    installer: I,
    ui: UiHandle,
    state: Mutex<CheckState>,
}

impl<L, R, I> UpdateOrchestrator<L, R, I>
where
    L: Locate,
    R: ReleaseSource,
    I: InstallBackend,
{
    pub fn new(product: impl Into<String>, locator: L, releases: R, installer: I, ui: UiHandle) -> Self {
        Self {
            product: product.into(),
            locator: Arc::new(locator),
            releases,
            installer,
            ui,
            state: Mutex::new(CheckState::Idle),
        }
    }

    pub fn state(&self) -> CheckState {
        *lock(&self.state)
    }

    #[tracing::instrument(skip(self))]
    pub async fn run_check_cycle(&self) -> CycleOutcome {
        let Some(_guard) = CycleGuard::acquire(&self.state) else {
            tracing::debug!("A check is already in progress");
            return CycleOutcome::AlreadyRunning;
        };

        tracing::info!("Checking for {} updates...", self.product);

        let Some(installed) = self.locate_installed().await else {
            tracing::warn!("No {} installation found", self.product);
            self.ui
                .show_error(format!("Could not detect {} installation.", self.product));
            return CycleOutcome::NotInstalled;
        };

        tracing::info!("Installed version: {}", installed);

        let Some(latest) = self.releases.resolve_latest().await else {
            return CycleOutcome::ReleaseUnavailable;
        };

        if version::compare(&latest.version, &installed) != Ordering::Greater {
            tracing::info!("{} {} is up to date", self.product, installed);
            self.ui
                .show_info("No Updates", format!("{} is up to date!", self.product));
            return CycleOutcome::UpToDate(installed);
        }

        let confirmed = self
            .ui
            .confirm(
                "Update Available",
                format!(
                    "A new version of {} ({}) is available. Would you like to download and install it?",
                    self.product, latest.version
                ),
            )
            .await;

        if !confirmed {
            tracing::info!("Update to {} declined", latest.version);
            return CycleOutcome::Declined(latest.version);
        }

        if self.installer.download_and_install(&latest).await {
            CycleOutcome::Installed(latest.version)
        } else {
            CycleOutcome::InstallFailed(latest.version)
        }
    }

    async fn locate_installed(&self) -> Option<ProductVersion> {
        let locator = self.locator.clone();

        match tokio::task::spawn_blocking(move || locator.locate()).await {
            Ok(v) => v,
            Err(err) => {
                tracing::error!("Version probing failed: {}", err);
                None
            }
        }
    }
}

/// Holds the orchestrator in [`CheckState::Checking`] and resets it to idle
/// when dropped, however the cycle ends.
struct CycleGuard<'a> {
    state: &'a Mutex<CheckState>,
}

impl<'a> CycleGuard<'a> {
    fn acquire(state: &'a Mutex<CheckState>) -> Option<Self> {
        let mut current = lock(state);
        if *current == CheckState::Checking {
            return None;
        }

        *current = CheckState::Checking;
        Some(Self { state })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = CheckState::Idle;
    }
}

fn lock(state: &Mutex<CheckState>) -> MutexGuard<'_, CheckState> {
    // The state is a plain enum, a poisoned lock still holds a valid value.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
