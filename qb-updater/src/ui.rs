use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Byte counters of one running download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_read: u64,

    /// Zero when the server did not announce a content length.
    pub total_bytes: u64,
}

impl DownloadProgress {
    /// Completion in percent, or `None` when the total size is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total_bytes == 0 {
            return None;
        }

        let percent = (self.bytes_read.saturating_mul(100) / self.total_bytes).min(100);
        Some(percent as u8)
    }
}

/// Everything the core asks the user interface to display or decide.
#[derive(Debug)]
pub enum UiEvent {
    Info {
        title: String,
        message: String,
    },
    Error {
        message: String,
    },
    DownloadStarted {
        total_bytes: u64,
    },
    Progress(DownloadProgress),
    DownloadFinished,
    ConfirmationRequested {
        title: String,
        message: String,
        reply: oneshot::Sender<bool>,
    },
}

pub type UiReceiver = UnboundedReceiver<UiEvent>;

/// Manual "check now" trigger sent by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckRequest;

/// Cloneable handle the core uses to talk to whatever UI subscribed.
///
/// A host that went away is not an error: events are dropped and
/// confirmations count as declined.
#[derive(Debug, Clone)]
pub struct UiHandle {
    sender: UnboundedSender<UiEvent>,
}

impl UiHandle {
    pub fn channel() -> (Self, UiReceiver) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn show_info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.send(UiEvent::Info {
            title: title.into(),
            message: message.into(),
        });
    }

    pub fn show_error(&self, message: impl Into<String>) {
        self.send(UiEvent::Error {
            message: message.into(),
        });
    }

    pub fn download_started(&self, total_bytes: u64) {
        self.send(UiEvent::DownloadStarted { total_bytes });
    }

    pub fn show_progress(&self, bytes_read: u64, total_bytes: u64) {
        self.send(UiEvent::Progress(DownloadProgress {
            bytes_read,
            total_bytes,
        }));
    }

    pub fn download_finished(&self) {
        self.send(UiEvent::DownloadFinished);
    }

    pub async fn confirm(&self, title: impl Into<String>, message: impl Into<String>) -> bool {
        let (reply, answer) = oneshot::channel();

        self.send(UiEvent::ConfirmationRequested {
            title: title.into(),
            message: message.into(),
            reply,
        });

        answer.await.unwrap_or(false)
    }

    fn send(&self, event: UiEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("UI receiver is gone, dropping event");
        }
    }
}
