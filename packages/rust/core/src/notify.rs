//! Notification collaborator.
//!
//! A cycle with new releases produces one [`Digest`] covering all of them.
//! Delivery goes through the [`Notifier`] trait; the production
//! implementation sends a plain-text email over SMTP. Sources without an
//! `[email]` config section simply get no notifier, and the notification
//! stage is skipped.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use presswatch_shared::{EmailConfig, PressWatchError, Result, resolve_smtp_password};

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// The notification payload for one cycle's new releases.
#[derive(Debug, Clone)]
pub struct Digest {
    pub source_name: String,
    pub entries: Vec<DigestEntry>,
}

/// One release in a digest. `summary` holds the generated summary when one
/// exists, else the raw extracted teaser.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub title: String,
    pub date: String,
    pub link: String,
    pub summary: String,
}

/// Render a digest as an email subject and plain-text body.
pub fn render_digest(digest: &Digest) -> (String, String) {
    let subject = format!(
        "[Press Release Alert] {} New Press Releases",
        digest.entries.len()
    );

    let mut body = format!("New press releases detected for {}:\n\n", digest.source_name);
    for (idx, entry) in digest.entries.iter().enumerate() {
        body.push_str(&format!("{}. {}\n", idx + 1, entry.title));
        body.push_str(&format!("   Date: {}\n", entry.date));
        body.push_str(&format!("   Link: {}\n", entry.link));
        if !entry.summary.is_empty() {
            body.push_str(&format!("   Summary: {}\n", entry.summary));
        }
        body.push('\n');
    }

    (subject, body)
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Contract for digest delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one digest.
    async fn notify(&self, digest: &Digest) -> Result<()>;
}

/// SMTP notifier sending the digest as a plain-text email.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// Build a notifier from the `[email]` config section. The password is
    /// read from the configured env var at startup so a missing secret
    /// surfaces before the first cycle, not during delivery.
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let password = resolve_smtp_password(config)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
            .map_err(|e| PressWatchError::Notify(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username.clone(), password))
            .build();

        let from: Mailbox = config.from.parse().map_err(|e| {
            PressWatchError::config(format!("invalid from address '{}': {e}", config.from))
        })?;
        let to: Mailbox = config.to.parse().map_err(|e| {
            PressWatchError::config(format!("invalid to address '{}': {e}", config.to))
        })?;

        Ok(Self { mailer, from, to })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    #[instrument(skip_all, fields(source = %digest.source_name, releases = digest.entries.len()))]
    async fn notify(&self, digest: &Digest) -> Result<()> {
        let (subject, body) = render_digest(digest);

        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| PressWatchError::Notify(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| PressWatchError::Notify(e.to_string()))?;

        info!("digest email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_digest() -> Digest {
        Digest {
            source_name: "Acme Corp".into(),
            entries: vec![
                DigestEntry {
                    title: "Pipeline Upgrade Announced".into(),
                    date: "2024-03-20".into(),
                    link: "https://example.com/news/1".into(),
                    summary: "- work begins in April".into(),
                },
                DigestEntry {
                    title: "Results Published".into(),
                    date: "2024-03-21".into(),
                    link: "https://example.com/news/2".into(),
                    summary: String::new(),
                },
            ],
        }
    }

    #[test]
    fn digest_subject_counts_releases() {
        let (subject, _) = render_digest(&sample_digest());
        assert_eq!(subject, "[Press Release Alert] 2 New Press Releases");
    }

    #[test]
    fn digest_body_lists_entries() {
        let (_, body) = render_digest(&sample_digest());
        assert!(body.starts_with("New press releases detected for Acme Corp:"));
        assert!(body.contains("1. Pipeline Upgrade Announced"));
        assert!(body.contains("   Link: https://example.com/news/1"));
        assert!(body.contains("   Summary: - work begins in April"));
        assert!(body.contains("2. Results Published"));
    }

    #[test]
    fn digest_body_omits_empty_summaries() {
        let (_, body) = render_digest(&sample_digest());
        let second = body.split("2. Results Published").nth(1).expect("entry 2");
        assert!(!second.contains("Summary:"));
    }
}
