use crate::error::UpdaterError;
use crate::ui::UiHandle;
use reqwest::{Client, Url};
use sha2::Digest as _;
use std::path::Path;
use tokio::io::{AsyncWriteExt as _, BufWriter};

const WRITE_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub bytes_written: u64,
    pub total_bytes: u64,
    pub sha256: String,
}

/// Stream `url` into `destination`, reporting progress after every chunk.
///
/// An existing file is overwritten. On failure whatever was written so far
/// stays on disk.
#[tracing::instrument(skip_all, fields(url = url.as_str(), destination = %destination.display()))]
pub async fn download_to(
    client: &Client,
    url: &Url,
    destination: &Path,
    ui: &UiHandle,
) -> Result<DownloadSummary, UpdaterError> {
    let mut response = client.get(url.clone()).send().await?.error_for_status()?;

    let total_bytes = response.content_length().unwrap_or(0);
    tracing::debug!("Downloading {} bytes", total_bytes);
    ui.download_started(total_bytes);

    let file = tokio::fs::File::create(destination).await?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let mut hasher = sha2::Sha256::new();
    let mut bytes_read = 0u64;

    while let Some(chunk) = response.chunk().await? {
        writer.write_all(&chunk).await?;
        hasher.update(&chunk);

        bytes_read += chunk.len() as u64;
        ui.show_progress(bytes_read, total_bytes);
    }

    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    let sha256 = hasher
        .finalize()
        .into_iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let (high, low) = byte_to_hex(byte);

            acc.push(high);
            acc.push(low);
            acc
        });

    Ok(DownloadSummary {
        bytes_written: bytes_read,
        total_bytes,
        sha256,
    })
}

fn byte_to_hex(byte: u8) -> (char, char) {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    (
        DIGITS[(byte >> 4) as usize] as char,
        DIGITS[(byte & 0xF) as usize] as char,
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use reqwest::{Client, Url};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Client that talks to local test servers directly, whatever proxy the
    /// environment configures.
    pub fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    /// Serve `body` once over plain HTTP, optionally without a content length.
    pub async fn serve_file(body: Vec<u8>, with_length: bool) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let mut head = String::from("HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n");
            if with_length {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
            head.push_str("Connection: close\r\n\r\n");

            // The client may hang up early, which is fine for these tests.
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in body.chunks(4096) {
                if socket.write_all(chunk).await.is_err() {
                    return;
                }
            }
            let _ = socket.shutdown().await;
        });

        Url::parse(&format!("http://{}/qbittorrent_4.6.5_x64_setup.exe", addr)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{local_client, serve_file};
    use super::*;
    use crate::ui::{DownloadProgress, UiEvent};
    use sha2::Digest as _;

    fn payload() -> Vec<u8> {
        (0..100_000u32).map(|v| (v % 251) as u8).collect()
    }

    fn progress_events(events: &mut crate::ui::UiReceiver) -> (Option<u64>, Vec<DownloadProgress>) {
        let mut started = None;
        let mut progress = Vec::new();

        while let Ok(event) = events.try_recv() {
            match event {
                UiEvent::DownloadStarted { total_bytes } => started = Some(total_bytes),
                UiEvent::Progress(p) => progress.push(p),
                other => panic!("unexpected event: {other:?}"),
            }
        }

        (started, progress)
    }

    #[tokio::test]
    async fn streams_body_to_destination() {
        let body = payload();
        let url = serve_file(body.clone(), true).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("setup.exe");
        std::fs::write(&destination, b"stale content that must be replaced").unwrap();

        let (ui, mut events) = UiHandle::channel();
        let summary = download_to(&local_client(), &url, &destination, &ui)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), body);
        assert_eq!(summary.bytes_written, body.len() as u64);
        assert_eq!(summary.total_bytes, body.len() as u64);

        let expected = sha2::Sha256::digest(&body)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        assert_eq!(summary.sha256, expected);

        let (started, progress) = progress_events(&mut events);
        assert_eq!(started, Some(body.len() as u64));
        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|w| w[0].bytes_read <= w[1].bytes_read));

        let last = progress.last().unwrap();
        assert_eq!(last.bytes_read, body.len() as u64);
        assert_eq!(last.percent(), Some(100));
    }

    #[tokio::test]
    async fn unknown_length_reports_indeterminate_progress() {
        let body = payload();
        let url = serve_file(body.clone(), false).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("setup.exe");

        let (ui, mut events) = UiHandle::channel();
        let summary = download_to(&local_client(), &url, &destination, &ui)
            .await
            .unwrap();

        assert_eq!(summary.bytes_written, body.len() as u64);
        assert_eq!(summary.total_bytes, 0);

        let (started, progress) = progress_events(&mut events);
        assert_eq!(started, Some(0));
        assert!(progress.iter().all(|p| p.total_bytes == 0 && p.percent().is_none()));
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let url = serve_file(payload(), true).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("missing").join("setup.exe");

        let (ui, _events) = UiHandle::channel();
        let result = download_to(&local_client(), &url, &destination, &ui).await;

        assert!(matches!(result, Err(UpdaterError::GenericIo(_))));
    }

    #[test]
    fn hex_digits() {
        assert_eq!(byte_to_hex(0x00), ('0', '0'));
        assert_eq!(byte_to_hex(0xa7), ('a', '7'));
        assert_eq!(byte_to_hex(0xff), ('f', 'f'));
    }
}
