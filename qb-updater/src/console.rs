use crate::ui::{CheckRequest, DownloadProgress, UiEvent, UiReceiver};
use indicatif::ProgressStyle;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt as _;
use tracing_indicatif::suspend_tracing_indicatif;

const BAR_TEMPLATE: &str =
    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} {bytes_per_sec}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Answer(bool),
    CheckNow,
    Quit,
    Help,
    Unknown,
}

fn interpret(line: &str, question_pending: bool) -> ConsoleCommand {
    let line = line.trim().to_lowercase();

    if question_pending {
        return ConsoleCommand::Answer(matches!(line.as_str(), "y" | "yes"));
    }

    match line.as_str() {
        "" | "check" | "c" => ConsoleCommand::CheckNow,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        "help" | "?" => ConsoleCommand::Help,
        _ => ConsoleCommand::Unknown,
    }
}

/// Terminal front end: renders core events and turns stdin lines into
/// answers and "check now" requests.
pub struct ConsoleHost {
    events: UiReceiver,
    check_requests: UnboundedSender<CheckRequest>,
    shutdown: CancellationToken,
    assume_yes: bool,
    pending: Option<oneshot::Sender<bool>>,
    /// Span carrying the download bar of the log layer.
    progress: Option<Span>,
    input_closed: bool,
}

impl ConsoleHost {
    pub fn new(
        events: UiReceiver,
        check_requests: UnboundedSender<CheckRequest>,
        shutdown: CancellationToken,
        assume_yes: bool,
    ) -> Self {
        Self {
            events,
            check_requests,
            shutdown,
            assume_yes,
            pending: None,
            progress: None,
            input_closed: false,
        }
    }

    /// Run until shutdown is requested or the core goes away.
    pub async fn run(self) {
        let (line_sender, lines) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut stdin = BufReader::new(tokio::io::stdin()).lines();

            loop {
                match stdin.next_line().await {
                    Ok(Some(line)) => {
                        if line_sender.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!("Failed to read from stdin: {}", err);
                        break;
                    }
                }
            }
        });

        self.run_with_lines(lines).await;
    }

    async fn run_with_lines(mut self, mut lines: UnboundedReceiver<String>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                line = lines.recv(), if !self.input_closed => match line {
                    Some(line) => self.handle_line(&line),
                    None => {
                        tracing::debug!("stdin closed, no more commands");
                        self.input_closed = true;
                        self.answer(false);
                    }
                },
            }
        }

        // Show whatever the core managed to report before it went away.
        while let Ok(event) = self.events.try_recv() {
            if let UiEvent::ConfirmationRequested { reply, .. } = event {
                let _ = reply.send(false);
            } else {
                self.handle_event(event);
            }
        }

        self.clear_progress();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Info { title, message } => {
                tracing::info!("{}: {}", title, message);
            }
            UiEvent::Error { message } => {
                self.clear_progress();
                tracing::error!("{}", message);
            }
            UiEvent::DownloadStarted { total_bytes } => {
                self.clear_progress();
                self.progress = Some(download_span(total_bytes));
            }
            UiEvent::Progress(progress) => self.show_progress(progress),
            UiEvent::DownloadFinished => {
                if self.progress.take().is_some() {
                    tracing::info!("Download finished");
                }
            }
            UiEvent::ConfirmationRequested {
                title,
                message,
                reply,
            } => {
                if self.assume_yes {
                    tracing::info!("{}: {} -> yes", title, message);
                    let _ = reply.send(true);
                    return;
                }

                if self.input_closed {
                    tracing::warn!("{}: {} -> no (stdin is closed, use --assume-yes)", title, message);
                    let _ = reply.send(false);
                    return;
                }

                // Only one question is ever outstanding; a stale one is declined.
                self.answer(false);
                suspend_tracing_indicatif(|| println!("{}: {} [y/N]", title, message));
                self.pending = Some(reply);
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        match interpret(line, self.pending.is_some()) {
            ConsoleCommand::Answer(answer) => self.answer(answer),
            ConsoleCommand::CheckNow => {
                let _ = self.check_requests.send(CheckRequest);
            }
            ConsoleCommand::Quit => self.shutdown.cancel(),
            ConsoleCommand::Help => {
                suspend_tracing_indicatif(|| {
                    println!("Commands: <enter> or 'check' to check for updates, 'quit' to exit")
                });
            }
            ConsoleCommand::Unknown => {
                tracing::warn!("Unknown command {:?}, type 'help' for a list", line.trim());
            }
        }
    }

    fn answer(&mut self, answer: bool) {
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(answer);
        }
    }

    fn show_progress(&mut self, progress: DownloadProgress) {
        let span = self
            .progress
            .get_or_insert_with(|| download_span(progress.total_bytes));

        span.pb_set_position(progress.bytes_read);
        if progress.percent().is_none() {
            span.pb_tick();
        }
    }

    fn clear_progress(&mut self) {
        // Closing the span removes its bar.
        self.progress = None;
    }
}

/// Download progress is drawn by the indicatif log layer, so log lines
/// written meanwhile suspend the bar instead of tearing it.
fn download_span(total_bytes: u64) -> Span {
    let span = tracing::info_span!("download");

    let style = if total_bytes > 0 {
        ProgressStyle::with_template(BAR_TEMPLATE).map(|style| style.progress_chars("=> "))
    } else {
        ProgressStyle::with_template(SPINNER_TEMPLATE)
    };
    span.pb_set_style(&style.unwrap_or_else(|_| ProgressStyle::default_bar()));

    if total_bytes > 0 {
        span.pb_set_length(total_bytes);
    }
    span.pb_set_message("Downloading update");
    span.pb_start();

    span
}
