// HTTP video transport - Streamed PUT uploads with byte-level progress
use crate::application::upload_ports::{UploadError, VideoTransport};
use crate::infrastructure::config::VideoSettings;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 64 * 1024;
const PROGRESS_STEP: u8 = 10;

pub struct HttpVideoTransport {
    client: reqwest::Client,
    base_url: String,
    remote_dir: String,
    api_key: Option<String>,
}

/// Turns byte counts into percentages, emitting only on whole 10 % steps
#[derive(Debug)]
struct ProgressSteps {
    size: u64,
    last: Option<u8>,
}

impl ProgressSteps {
    fn new(size: u64) -> Self {
        Self { size, last: None }
    }

    fn advance(&mut self, sent: u64) -> Option<u8> {
        let percent = if self.size == 0 {
            100
        } else {
            (sent.min(self.size) * 100 / self.size) as u8
        };
        let step = percent / PROGRESS_STEP * PROGRESS_STEP;
        if self.last.is_some_and(|last| step <= last) {
            return None;
        }
        self.last = Some(step);
        Some(step)
    }
}

impl HttpVideoTransport {
    pub fn new(settings: &VideoSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            remote_dir: settings.remote_dir.trim_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    fn remote_path(&self, user_id: &str, file_name: &str) -> String {
        format!("{}/{}/{}", self.remote_dir, user_id, file_name)
    }

    fn object_url(&self, user_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.remote_dir,
            urlencoding::encode(user_id),
            urlencoding::encode(file_name)
        )
    }
}

#[async_trait]
impl VideoTransport for HttpVideoTransport {
    async fn upload_file(
        &self,
        user_id: &str,
        local_path: &Path,
        file_name: &str,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, UploadError> {
        let mut file = match tokio::fs::File::open(local_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::MissingFile(file_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel::<u64>();
        let body = async_stream::stream! {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let mut sent = 0u64;
            loop {
                match file.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        sent += n as u64;
                        let _ = sent_tx.send(sent);
                        yield Ok::<Bytes, std::io::Error>(Bytes::copy_from_slice(&buf[..n]));
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        let mut request = self
            .client
            .put(self.object_url(user_id, file_name))
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(body));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!("PUT {} ({} bytes)", file_name, size);
        let mut steps = ProgressSteps::new(size);
        let send = request.send();
        tokio::pin!(send);
        let response = loop {
            tokio::select! {
                result = &mut send => break result?,
                Some(sent) = sent_rx.recv() => {
                    if let Some(percent) = steps.advance(sent) {
                        progress(percent);
                    }
                }
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status, body });
        }
        if let Some(percent) = steps.advance(size) {
            progress(percent);
        }
        Ok(self.remote_path(user_id, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn transport() -> HttpVideoTransport {
        HttpVideoTransport::new(&VideoSettings {
            base_url: "https://files.example.com/".to_string(),
            remote_dir: "/videos/".to_string(),
            video_dir: PathBuf::from("data/videos"),
            api_key: None,
            retry_interval_minutes: 15,
            max_attempts: 5,
        })
    }

    #[test]
    fn test_paths() {
        let t = transport();
        assert_eq!(t.remote_path("guest", "a b.mp4"), "videos/guest/a b.mp4");
        assert_eq!(
            t.object_url("guest", "a b.mp4"),
            "https://files.example.com/videos/guest/a%20b.mp4"
        );
    }

    #[test]
    fn test_progress_reports_whole_steps_once() {
        let mut steps = ProgressSteps::new(1000);
        let reported: Vec<u8> = [0, 50, 99, 100, 250, 260, 999, 1000]
            .into_iter()
            .filter_map(|sent| steps.advance(sent))
            .collect();
        assert_eq!(reported, vec![0, 10, 20, 90, 100]);

        let mut empty = ProgressSteps::new(0);
        assert_eq!(empty.advance(0), Some(100));
        assert_eq!(empty.advance(0), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_before_any_request() {
        let result = transport()
            .upload_file("guest", Path::new("/nonexistent/clip.mp4"), "clip.mp4", &|_: u8| {})
            .await;
        assert!(matches!(result, Err(UploadError::MissingFile(name)) if name == "clip.mp4"));
    }
}
