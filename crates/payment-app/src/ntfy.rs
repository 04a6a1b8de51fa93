use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("error sending http request: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status={0}")]
    Status(u16),
}

/// ntfy's JSON publish body. Posted to the server root so the title may
/// carry non-ASCII text, which plain `Title:` headers cannot.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct Publish<'a> {
    topic: &'a str,
    title: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

pub struct Notifier {
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn send(
        &self,
        server: &str,
        topic: &str,
        title: &str,
        message: &str,
        tags: &[String],
    ) -> Result<(), NotifyError> {
        let body = Publish {
            topic,
            title,
            message,
            tags,
        };
        let response = self.http.post(server).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
