//! Streaming artifact downloads with console progress.
//!
//! Bodies stream to a `.part` staging file renamed into place only at
//! normal completion, so a cancelled or failed transfer is never mistaken
//! for a finished one. Presence of the final file is the only
//! "already downloaded" signal; no checksums.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::TryStreamExt;
use snafu::ResultExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MODEL_EXTENSION;
use crate::error::{
    AbortedSnafu, ClientSnafu, DownloadError, InvalidNameSnafu, IoSnafu, StreamSnafu,
    TransportSnafu, UnknownArtifactSnafu,
};
use crate::manifest::Manifest;

/// Bytes copied per read; also the granularity of progress updates.
pub const CHUNK_BYTES: usize = 8 * 1024;

const PROGRESS_BAR_WIDTH: usize = 20;

/// Model transfers are tens of gigabytes on slow links.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Destination already present; no request was made.
    AlreadyPresent(PathBuf),
    Completed { path: PathBuf, bytes: u64 },
}

pub struct ModelDownloader {
    client: reqwest::Client,
    manifest_path: PathBuf,
    models_dir: PathBuf,
}

impl ModelDownloader {
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        models_dir: impl Into<PathBuf>,
    ) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .context(ClientSnafu)?;
        Ok(Self {
            client,
            manifest_path: manifest_path.into(),
            models_dir: models_dir.into(),
        })
    }

    /// Resolve `name` through the manifest and stream it to
    /// `<models_dir>/<name>.gguf`. Idempotent by file presence.
    pub async fn download(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadStatus, DownloadError> {
        let name = name.trim();
        if name.is_empty() {
            return InvalidNameSnafu.fail();
        }

        let manifest = Manifest::load(&self.manifest_path)?;

        let destination = self.models_dir.join(format!("{name}.{MODEL_EXTENSION}"));
        if destination.exists() {
            println!(
                "Model '{name}' already exists at {}. Skipping download...",
                self.models_dir.display()
            );
            return Ok(DownloadStatus::AlreadyPresent(destination));
        }

        let Some(url) = manifest.resolve(name) else {
            return UnknownArtifactSnafu { name }.fail();
        };

        println!("Downloading model: {name} from {url}");
        let bytes = fetch_to_file(&self.client, url, &destination, cancel).await?;
        Ok(DownloadStatus::Completed {
            path: destination,
            bytes,
        })
    }
}

/// Stream `url` into `destination` via its `.part` staging file, rendering
/// progress on one overwritten console line.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .context(TransportSnafu { url })?
        .error_for_status()
        .context(TransportSnafu { url })?;
    let total = response.content_length();
    debug!(url, ?total, "download stream opened");

    let staging = staging_path(destination);
    if let Some(parent) = staging.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context(IoSnafu { path: parent })?;
    }
    let mut file = tokio::fs::File::create(&staging)
        .await
        .context(IoSnafu { path: &staging })?;

    let stream = response.bytes_stream().map_err(std::io::Error::other);
    let mut reader = StreamReader::new(stream);
    let mut progress = DownloadProgress::new(total);
    let mut buffer = [0u8; CHUNK_BYTES];
    let started = Instant::now();

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buffer) => read.context(StreamSnafu { url })?,
            () = cancel.cancelled() => {
                // Only the staging file is left behind; a later run
                // starts the download over.
                println!();
                return AbortedSnafu { name: display_name(destination) }.fail();
            }
        };
        if read == 0 {
            break;
        }

        file.write_all(&buffer[..read])
            .await
            .context(IoSnafu { path: &staging })?;
        progress.record(read as u64);

        print!("\r{}     ", progress.snapshot(started.elapsed()).render());
        let _ = std::io::stdout().flush();
    }

    file.flush().await.context(IoSnafu { path: &staging })?;
    drop(file);
    println!();

    tokio::fs::rename(&staging, destination)
        .await
        .context(IoSnafu { path: destination })?;
    Ok(progress.transferred())
}

/// Running totals for one transfer; never persisted.
#[derive(Debug)]
pub struct DownloadProgress {
    transferred: u64,
    total: Option<u64>,
}

impl DownloadProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            transferred: 0,
            total,
        }
    }

    pub fn record(&mut self, bytes: u64) {
        self.transferred += bytes;
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Derived figures for one rendered frame. Speed is 0 before any time
    /// has elapsed and ETA is 0 before any throughput exists; neither ever
    /// divides by zero.
    pub fn snapshot(&self, elapsed: Duration) -> ProgressSnapshot {
        let elapsed_secs = elapsed.as_secs_f64();
        let speed_mbps = if elapsed_secs > 0.0 {
            round2(to_mb(self.transferred) / elapsed_secs)
        } else {
            0.0
        };

        let (percent, eta_seconds) = match self.total {
            Some(total) if total > 0 => {
                let raw = (self.transferred as f64 / total as f64) * 100.0;
                let percent = raw.round().min(100.0) as u8;
                let remaining = total.saturating_sub(self.transferred);
                let eta = if speed_mbps > 0.0 {
                    (to_mb(remaining) / speed_mbps).round() as u64
                } else {
                    0
                };
                (Some(percent), eta)
            }
            _ => (None, 0),
        };

        ProgressSnapshot {
            percent,
            transferred_mb: round2(to_mb(self.transferred)),
            total_mb: self.total.map(to_mb).map(round2),
            speed_mbps,
            eta_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Absent when the server did not declare a content length; the bar
    /// and ETA are suppressed with it.
    pub percent: Option<u8>,
    pub transferred_mb: f64,
    pub total_mb: Option<f64>,
    pub speed_mbps: f64,
    pub eta_seconds: u64,
}

impl ProgressSnapshot {
    /// One terminal line; the caller overwrites it in place with `\r`.
    pub fn render(&self) -> String {
        match (self.percent, self.total_mb) {
            (Some(percent), Some(total_mb)) => format!(
                "{} {percent}% ({:.2} MB / {total_mb:.2} MB) {:.2} MB/s ETA: {}",
                render_bar(percent),
                self.transferred_mb,
                self.speed_mbps,
                format_eta(self.eta_seconds),
            ),
            _ => format!(
                "{:.2} MB downloaded {:.2} MB/s",
                self.transferred_mb, self.speed_mbps
            ),
        }
    }
}

pub(crate) fn render_bar(percent: u8) -> String {
    let filled = ((f64::from(percent) * PROGRESS_BAR_WIDTH as f64 / 100.0).round() as usize)
        .min(PROGRESS_BAR_WIDTH);
    format!(
        "[{}{}]",
        "#".repeat(filled),
        " ".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

pub(crate) fn format_eta(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub(crate) fn staging_path(destination: &Path) -> PathBuf {
    let mut staged = destination.as_os_str().to_owned();
    staged.push(".part");
    PathBuf::from(staged)
}

fn display_name(destination: &Path) -> String {
    destination
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| destination.display().to_string())
}

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transferred_bytes_accumulate_monotonically() {
        let mut progress = DownloadProgress::new(Some(100_000));
        let mut last = 0;
        for _ in 0..12 {
            progress.record(CHUNK_BYTES as u64);
            assert!(progress.transferred() >= last);
            last = progress.transferred();
        }
        assert_eq!(progress.transferred(), 12 * CHUNK_BYTES as u64);
    }

    #[test]
    fn speed_is_zero_before_time_elapses() {
        let mut progress = DownloadProgress::new(Some(1024));
        progress.record(512);
        let snapshot = progress.snapshot(Duration::ZERO);
        assert_eq!(snapshot.speed_mbps, 0.0);
        assert_eq!(snapshot.eta_seconds, 0);
    }

    #[test]
    fn eta_is_zero_before_any_throughput() {
        let progress = DownloadProgress::new(Some(10 * 1024 * 1024));
        let snapshot = progress.snapshot(Duration::from_secs(5));
        assert_eq!(snapshot.speed_mbps, 0.0);
        assert_eq!(snapshot.eta_seconds, 0);
    }

    #[test]
    fn percentage_is_rounded() {
        let mut progress = DownloadProgress::new(Some(1000));
        progress.record(333);
        let snapshot = progress.snapshot(Duration::from_secs(1));
        assert_eq!(snapshot.percent, Some(33));

        progress.record(2);
        let snapshot = progress.snapshot(Duration::from_secs(1));
        assert_eq!(snapshot.percent, Some(34));
    }

    #[test]
    fn percentage_reaches_exactly_one_hundred() {
        let mut progress = DownloadProgress::new(Some(4096));
        progress.record(4096);
        let snapshot = progress.snapshot(Duration::from_secs(1));
        assert_eq!(snapshot.percent, Some(100));
    }

    #[test]
    fn unknown_total_suppresses_percentage_and_bar() {
        let mut progress = DownloadProgress::new(None);
        progress.record(3 * 1024 * 1024);
        let snapshot = progress.snapshot(Duration::from_secs(2));
        assert_eq!(snapshot.percent, None);
        assert_eq!(snapshot.total_mb, None);
        let line = snapshot.render();
        assert!(!line.contains('%'));
        assert!(!line.contains('['));
        assert!(line.contains("MB downloaded"));
    }

    #[test]
    fn bar_is_always_twenty_characters_wide() {
        for percent in [0u8, 1, 33, 50, 99, 100] {
            let bar = render_bar(percent);
            assert_eq!(bar.len(), PROGRESS_BAR_WIDTH + 2, "percent {percent}");
        }
        assert_eq!(render_bar(0), "[                    ]");
        assert_eq!(render_bar(50), "[##########          ]");
        assert_eq!(render_bar(100), "[####################]");
    }

    #[test]
    fn eta_formats_as_hh_mm_ss() {
        assert_eq!(format_eta(0), "00:00:00");
        assert_eq!(format_eta(59), "00:00:59");
        assert_eq!(format_eta(61), "00:01:01");
        assert_eq!(format_eta(3661), "01:01:01");
        assert_eq!(format_eta(25 * 3600), "25:00:00");
    }

    #[test]
    fn throughput_matches_transferred_over_elapsed() {
        let mut progress = DownloadProgress::new(Some(20 * 1024 * 1024));
        progress.record(10 * 1024 * 1024);
        let snapshot = progress.snapshot(Duration::from_secs(5));
        assert_eq!(snapshot.speed_mbps, 2.0);
        // 10 MB remaining at 2 MB/s.
        assert_eq!(snapshot.eta_seconds, 5);
    }

    #[test]
    fn staging_path_appends_part_suffix() {
        let staged = staging_path(Path::new("/models/gemma2-2b.gguf"));
        assert_eq!(staged, PathBuf::from("/models/gemma2-2b.gguf.part"));
    }
}
