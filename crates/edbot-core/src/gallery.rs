//! Gallery channel archiver.
//!
//! Image attachments posted in the gallery channel are saved to
//! `gallery_folder` as `{author}-{YYYY-MM-DDTHH.MM.SS}{.ext}`, stamped with
//! the message time rather than the download time.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    domain::UserId,
    errors::Error,
    messaging::types::{Attachment, IncomingMessage},
    Result,
};

const FILENAME_TIME_FORMAT: &str = "%Y-%m-%dT%H.%M.%S";

/// Downloads attachment bytes.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `AttachmentFetcher` over HTTP GET, reading the body chunk by chunk.
#[derive(Clone)]
pub struct HttpAttachmentFetcher {
    client: reqwest::Client,
}

impl HttpAttachmentFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut resp = self.client.get(url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(Error::External(format!(
                "attachment download returned HTTP {}",
                resp.status()
            )));
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

/// What happened to one message's attachments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub saved: Vec<PathBuf>,
    /// Attachments that are not images.
    pub skipped: Vec<String>,
    /// Images that could not be downloaded or written.
    pub failed: Vec<String>,
}

pub struct GalleryArchiver {
    fetcher: Arc<dyn AttachmentFetcher>,
    bot_user: OnceLock<UserId>,
}

impl GalleryArchiver {
    pub fn new(fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        Self {
            fetcher,
            bot_user: OnceLock::new(),
        }
    }

    /// Remember the bot's own user id so its messages are ignored.
    pub fn set_bot_user(&self, id: UserId) {
        let _ = self.bot_user.set(id);
    }

    fn should_archive(&self, msg: &IncomingMessage, cfg: &Config) -> bool {
        cfg.scrape_gallery
            && self.bot_user.get() != Some(&msg.author_id)
            && cfg.gallery_channel_id == Some(msg.channel_id)
            && !msg.attachments.is_empty()
    }

    pub async fn on_message(&self, msg: &IncomingMessage, cfg: &Config) -> ArchiveReport {
        let mut report = ArchiveReport::default();
        if !self.should_archive(msg, cfg) {
            return report;
        }

        info!(author = %msg.author_name, "new gallery post");
        let folder = &cfg.gallery_folder;
        if let Err(e) = tokio::fs::create_dir_all(folder).await {
            error!(folder = %folder.display(), "cannot create gallery folder: {e}");
            report.failed = msg.attachments.iter().map(|a| a.filename.clone()).collect();
            return report;
        }

        for attachment in &msg.attachments {
            if !is_image(&attachment.filename) {
                report.skipped.push(attachment.filename.clone());
                continue;
            }
            info!(url = %attachment.url, "image url");

            match self.archive_one(msg, attachment, folder).await {
                Ok(path) => {
                    info!(path = %path.display(), "saved gallery image");
                    report.saved.push(path);
                }
                Err(e) => {
                    warn!(attachment = %attachment.filename, "failed to archive attachment: {e}");
                    report.failed.push(attachment.filename.clone());
                }
            }
        }

        report
    }

    async fn archive_one(
        &self,
        msg: &IncomingMessage,
        attachment: &Attachment,
        folder: &Path,
    ) -> Result<PathBuf> {
        let bytes = self.fetcher.fetch(&attachment.url).await?;
        let name = gallery_filename(&msg.author_name, msg.timestamp, &attachment.filename);
        let path = unique_path(folder, &name).await;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Content category comes from the declared filename only.
pub fn is_image(filename: &str) -> bool {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false)
}

/// `{author}-{YYYY-MM-DDTHH.MM.SS}{.ext}`, extension case preserved.
pub fn gallery_filename(author: &str, timestamp: DateTime<Utc>, original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "{}-{}{}",
        sanitize_component(author),
        timestamp.format(FILENAME_TIME_FORMAT),
        ext
    )
}

// Author names are user-controlled; keep them from escaping the gallery folder.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "_".to_string(),
        rest => rest.to_string(),
    }
}

/// Two images of the same type in one message share a timestamp; number the later ones.
async fn unique_path(folder: &Path, name: &str) -> PathBuf {
    let candidate = folder.join(name);
    if !exists(&candidate).await {
        return candidate;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };
    let mut n = 1usize;
    loop {
        let candidate = folder.join(format!("{stem}-{n}{ext}"));
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChannelId;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(bodies: &[(&str, &[u8])]) -> Arc<Self> {
            Arc::new(Self {
                bodies: bodies
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_vec()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttachmentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.requested.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| Error::External(format!("404 for {url}")))
        }
    }

    fn config(folder: &Path) -> Config {
        let mut cfg = Config::from_ini_str(
            "[discord]\nauth_token = t\ngallery_channel_id = 99\n[general]\nscrape_gallery = true\n",
        )
        .unwrap();
        cfg.gallery_folder = folder.to_path_buf();
        cfg
    }

    fn message(attachments: &[(&str, &str)]) -> IncomingMessage {
        IncomingMessage {
            author_id: UserId(5),
            author_name: "Cmdr".to_string(),
            channel_id: ChannelId(99),
            timestamp: Utc.with_ymd_and_hms(2020, 5, 4, 10, 20, 30).unwrap(),
            attachments: attachments
                .iter()
                .map(|(url, filename)| Attachment {
                    url: url.to_string(),
                    filename: filename.to_string(),
                })
                .collect(),
        }
    }

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(response: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}/a.png")
    }

    fn http_fetcher() -> HttpAttachmentFetcher {
        HttpAttachmentFetcher::new(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn http_fetcher_reads_body() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nimage",
        )
        .await;
        assert_eq!(http_fetcher().fetch(&url).await.unwrap(), b"image");
    }

    #[tokio::test]
    async fn http_fetcher_rejects_non_ok_status() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(http_fetcher().fetch(&url).await.is_err());
    }

    #[tokio::test]
    async fn http_fetcher_ignores_bogus_content_length() {
        // Claims a terabyte, sends three bytes and hangs up.
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 1099511627776\r\nConnection: close\r\n\r\nabc",
        )
        .await;
        assert!(http_fetcher().fetch(&url).await.is_err());
    }

    #[test]
    fn filename_uses_message_time_and_keeps_extension_case() {
        let ts = Utc.with_ymd_and_hms(2020, 5, 4, 10, 20, 30).unwrap();
        assert_eq!(
            gallery_filename("Cmdr", ts, "photo.PNG"),
            "Cmdr-2020-05-04T10.20.30.PNG"
        );
        assert_eq!(gallery_filename("Cmdr", ts, "noext"), "Cmdr-2020-05-04T10.20.30");
    }

    #[test]
    fn filename_neutralizes_path_separators() {
        let ts = Utc.with_ymd_and_hms(2020, 5, 4, 10, 20, 30).unwrap();
        assert_eq!(
            gallery_filename("../evil/name", ts, "a.jpg"),
            "_evil_name-2020-05-04T10.20.30.jpg"
        );
    }

    #[test]
    fn image_detection_by_extension() {
        assert!(is_image("photo.PNG"));
        assert!(is_image("shot.jpeg"));
        assert!(is_image("anim.gif"));
        assert!(!is_image("notes.txt"));
        assert!(!is_image("clip.mp4"));
        assert!(!is_image("no_extension"));
    }

    #[tokio::test]
    async fn saves_images_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[
            ("https://cdn/a.png", b"png-bytes"),
            ("https://cdn/b.txt", b"text"),
        ]);
        let archiver = GalleryArchiver::new(fetcher.clone());

        let msg = message(&[("https://cdn/a.png", "photo.PNG"), ("https://cdn/b.txt", "notes.txt")]);
        let report = archiver.on_message(&msg, &config(dir.path())).await;

        let expected = dir.path().join("Cmdr-2020-05-04T10.20.30.PNG");
        assert_eq!(report.saved, vec![expected.clone()]);
        assert_eq!(report.skipped, vec!["notes.txt".to_string()]);
        assert_eq!(std::fs::read(expected).unwrap(), b"png-bytes");
        assert_eq!(fetcher.requested(), vec!["https://cdn/a.png".to_string()]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn failed_download_does_not_stop_remaining_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("https://cdn/ok.jpg", b"jpg")]);
        let archiver = GalleryArchiver::new(fetcher);

        let msg = message(&[("https://cdn/missing.png", "a.png"), ("https://cdn/ok.jpg", "b.jpg")]);
        let report = archiver.on_message(&msg, &config(dir.path())).await;

        assert_eq!(report.failed, vec!["a.png".to_string()]);
        assert_eq!(report.saved, vec![dir.path().join("Cmdr-2020-05-04T10.20.30.jpg")]);
    }

    #[tokio::test]
    async fn same_second_images_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("https://cdn/1.png", b"1"), ("https://cdn/2.png", b"2")]);
        let archiver = GalleryArchiver::new(fetcher);

        let msg = message(&[("https://cdn/1.png", "one.png"), ("https://cdn/2.png", "two.png")]);
        let report = archiver.on_message(&msg, &config(dir.path())).await;

        assert_eq!(
            report.saved,
            vec![
                dir.path().join("Cmdr-2020-05-04T10.20.30.png"),
                dir.path().join("Cmdr-2020-05-04T10.20.30-1.png"),
            ]
        );
    }

    #[tokio::test]
    async fn ignores_unqualified_messages() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::with(&[("https://cdn/a.png", b"x")]);
        let archiver = GalleryArchiver::new(fetcher.clone());
        let cfg = config(dir.path());
        let msg = message(&[("https://cdn/a.png", "a.png")]);

        let mut disabled = cfg.clone();
        disabled.scrape_gallery = false;
        assert_eq!(archiver.on_message(&msg, &disabled).await, ArchiveReport::default());

        let mut other_channel = msg.clone();
        other_channel.channel_id = ChannelId(1);
        assert_eq!(archiver.on_message(&other_channel, &cfg).await, ArchiveReport::default());

        let mut no_attachments = msg.clone();
        no_attachments.attachments.clear();
        assert_eq!(archiver.on_message(&no_attachments, &cfg).await, ArchiveReport::default());

        archiver.set_bot_user(UserId(5));
        assert_eq!(archiver.on_message(&msg, &cfg).await, ArchiveReport::default());

        assert!(fetcher.requested().is_empty());
    }
}
