use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::Client;

use crate::client::session::{SessionError, SessionStore, ENHANCED_IMAGE_KEY};
use crate::services::poller::{PollError, PollOutcome};

/// What the presenter did with a finished capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    Displayed { url: String },
    Downloaded { url: String, path: PathBuf, bytes: usize },
    Failed { message: String },
}

impl Presentation {
    pub fn is_success(&self) -> bool {
        !matches!(self, Presentation::Failed { .. })
    }
}

/// Hands a terminal poll result to the user: records the enhanced image URL
/// in the session, prints it, and optionally saves the image.
pub struct ResultPresenter<S, W> {
    session: S,
    out: W,
    http: Client,
}

impl<S: SessionStore, W: Write> ResultPresenter<S, W> {
    pub fn new(session: S, out: W) -> Self {
        Self {
            session,
            out,
            http: Client::new(),
        }
    }

    pub fn into_parts(self) -> (S, W) {
        (self.session, self.out)
    }

    pub async fn present(
        &mut self,
        outcome: Result<PollOutcome, PollError>,
        download_to: Option<&Path>,
    ) -> Result<Presentation, PresentError> {
        let url = match outcome {
            Ok(PollOutcome::Succeeded(url)) => url,
            Ok(PollOutcome::Failed(message)) => return self.fail(&message),
            Err(PollError::TimedOut { .. }) => {
                return self.fail("Enhancement timed out. The service may be busy, please try again")
            }
            Err(e) => return self.fail(&e.to_string()),
        };

        self.session.set(ENHANCED_IMAGE_KEY, &url)?;
        writeln!(self.out, "Enhanced photo: {url}")?;

        let Some(path) = download_to else {
            return Ok(Presentation::Displayed { url });
        };

        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(PresentError::Download)?
            .bytes()
            .await
            .map_err(PresentError::Download)?;
        tokio::fs::write(path, &bytes).await?;

        writeln!(self.out, "Saved to {}", path.display())?;
        tracing::info!(url = %url, path = %path.display(), bytes = bytes.len(), "Downloaded enhanced photo");

        Ok(Presentation::Downloaded {
            url,
            path: path.to_path_buf(),
            bytes: bytes.len(),
        })
    }

    fn fail(&mut self, message: &str) -> Result<Presentation, PresentError> {
        self.session.remove(ENHANCED_IMAGE_KEY)?;
        writeln!(self.out, "Enhancement failed: {message}")?;
        writeln!(self.out, "Take a new photo to try again.")?;
        Ok(Presentation::Failed {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to download image: {0}")]
    Download(reqwest::Error),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::MemorySession;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn output(presenter: ResultPresenter<MemorySession, Vec<u8>>) -> (MemorySession, String) {
        let (session, out) = presenter.into_parts();
        (session, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_success_is_stored_and_printed() {
        let mut presenter = ResultPresenter::new(MemorySession::default(), Vec::new());
        let shown = presenter
            .present(Ok(PollOutcome::Succeeded("https://replicate.delivery/out.png".into())), None)
            .await
            .unwrap();

        assert!(shown.is_success());
        let (session, text) = output(presenter);
        assert_eq!(
            session.get(ENHANCED_IMAGE_KEY).as_deref(),
            Some("https://replicate.delivery/out.png")
        );
        assert!(text.contains("https://replicate.delivery/out.png"));
    }

    #[tokio::test]
    async fn test_timeout_clears_previous_result() {
        let mut session = MemorySession::default();
        session.set(ENHANCED_IMAGE_KEY, "https://old/out.png").unwrap();
        let mut presenter = ResultPresenter::new(session, Vec::new());

        let shown = presenter
            .present(
                Err(PollError::TimedOut {
                    elapsed: Duration::from_secs(120),
                }),
                None,
            )
            .await
            .unwrap();

        assert!(!shown.is_success());
        let (session, text) = output(presenter);
        assert!(session.get(ENHANCED_IMAGE_KEY).is_none());
        assert!(text.contains("timed out"));
        assert!(text.contains("try again"));
    }

    #[tokio::test]
    async fn test_provider_failure_message_is_shown() {
        let mut presenter = ResultPresenter::new(MemorySession::default(), Vec::new());
        let shown = presenter
            .present(Ok(PollOutcome::Failed("NSFW content detected".into())), None)
            .await
            .unwrap();

        assert_eq!(
            shown,
            Presentation::Failed {
                message: "NSFW content detected".into()
            }
        );
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("enhanced-photo.png");
        let url = format!("{}/out.png", server.uri());

        let mut presenter = ResultPresenter::new(MemorySession::default(), Vec::new());
        let shown = presenter
            .present(Ok(PollOutcome::Succeeded(url.clone())), Some(&target))
            .await
            .unwrap();

        assert_eq!(
            shown,
            Presentation::Downloaded {
                url,
                path: target.clone(),
                bytes: 4
            }
        );
        assert_eq!(std::fs::read(&target).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }
}
