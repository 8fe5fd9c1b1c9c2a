//! Full-content retrieval for newly discovered releases.
//!
//! Downloads a release page, archives the raw HTML to disk, extracts a
//! readable text rendition (Markdown via `htmd` over the main content
//! container), and saves that alongside the HTML. The storage linkage is the
//! caller's job — this crate only produces files.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use presswatch_shared::{PressWatchError, Result};

/// User-Agent string for all PressWatch requests.
pub const USER_AGENT: &str = concat!("PressWatch/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by listing fetches and content downloads.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| PressWatchError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Archived content produced by one download.
#[derive(Debug, Clone)]
pub struct RetrievedContent {
    /// Where the raw HTML landed.
    pub html_path: PathBuf,
    /// Where the extracted text landed, absent when extraction produced nothing.
    pub text_path: Option<PathBuf>,
    /// The extracted text itself, for immediate summarization.
    pub text: Option<String>,
}

/// Downloads release pages into an archive directory.
pub struct Retriever {
    client: Client,
    download_dir: PathBuf,
}

impl Retriever {
    /// Create a retriever writing into `download_dir`.
    pub fn new(download_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            download_dir: download_dir.into(),
        })
    }

    /// Download one page, archive it, and extract its readable text.
    #[instrument(skip(self))]
    pub async fn download(&self, link: &str) -> Result<RetrievedContent> {
        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| PressWatchError::io(&self.download_dir, e))?;

        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| PressWatchError::Network(format!("{link}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PressWatchError::Network(format!("{link}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PressWatchError::Network(format!("{link}: body read failed: {e}")))?;

        let stem = archive_stem(link, Utc::now());
        let html_path = self.download_dir.join(format!("{stem}.html"));
        std::fs::write(&html_path, &body).map_err(|e| PressWatchError::io(&html_path, e))?;

        let text = extract_text(&body);
        let text_path = match &text {
            Some(text) => {
                let path = self.download_dir.join(format!("{stem}.txt"));
                std::fs::write(&path, text).map_err(|e| PressWatchError::io(&path, e))?;
                Some(path)
            }
            None => None,
        };

        debug!(
            html_path = %html_path.display(),
            extracted = text.is_some(),
            "page archived"
        );

        Ok(RetrievedContent {
            html_path,
            text_path,
            text,
        })
    }
}

// ---------------------------------------------------------------------------
// Text extraction
// ---------------------------------------------------------------------------

/// Extract the readable text of a page as Markdown.
///
/// Finds the main content container (readability-style: `main`, `article`,
/// `[role=main]`, `.content`, falling back to `body`) and converts it with
/// `htmd`, skipping script/style/navigation chrome. Returns `None` when the
/// page yields no usable text.
pub fn extract_text(html: &str) -> Option<String> {
    let content_html = {
        let doc = Html::parse_document(html);

        let selectors = ["main", "article", r#"[role="main"]"#, ".content", "body"];
        let mut content = None;
        for sel_str in selectors {
            let sel = Selector::parse(sel_str).unwrap();
            if let Some(el) = doc.select(&sel).next() {
                content = Some(el.inner_html());
                break;
            }
        }
        content?
    };

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg",
        ])
        .build();

    let text = converter.convert(&content_html).ok()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Archive file stem: the page's domain plus a download timestamp,
/// e.g. `www_example_com_20240320_133005`.
fn archive_stem(link: &str, now: DateTime<Utc>) -> String {
    let domain = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.replace('.', "_")))
        .unwrap_or_else(|| "page".to_string());
    format!("{domain}_{}", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pw_retrieve_{}", Uuid::now_v7()))
    }

    #[test]
    fn archive_stem_uses_domain_and_timestamp() {
        let now = DateTime::parse_from_rfc3339("2024-03-20T13:30:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            archive_stem("https://www.example.com/news/1", now),
            "www_example_com_20240320_133005"
        );
        assert_eq!(archive_stem("not a url", now), "page_20240320_133005");
    }

    #[test]
    fn extract_text_prefers_main_content() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <main><h1>Release</h1><p>The important announcement.</p></main>
            <footer>Copyright</footer>
        </body></html>"#;

        let text = extract_text(html).expect("text");
        assert!(text.contains("The important announcement."));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn extract_text_falls_back_to_body() {
        let html = "<html><body><p>Bare body text.</p></body></html>";
        let text = extract_text(html).expect("text");
        assert!(text.contains("Bare body text."));
    }

    #[test]
    fn extract_text_empty_page_is_none() {
        assert!(extract_text("<html><body></body></html>").is_none());
    }

    #[tokio::test]
    async fn download_archives_html_and_text() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/news/1"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                "<html><body><main><h1>Release</h1><p>Body text.</p></main></body></html>",
            ))
            .mount(&server)
            .await;

        let dir = test_dir();
        let retriever = Retriever::new(&dir, Duration::from_secs(5)).unwrap();
        let content = retriever
            .download(&format!("{}/news/1", server.uri()))
            .await
            .expect("download");

        assert!(content.html_path.exists());
        let text_path = content.text_path.expect("text path");
        assert!(text_path.exists());
        assert!(content.text.unwrap().contains("Body text."));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn download_propagates_http_errors() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = test_dir();
        let retriever = Retriever::new(&dir, Duration::from_secs(5)).unwrap();
        let result = retriever.download(&format!("{}/gone", server.uri())).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("404"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
