//! Account e-mails.
//!
//! [`Mailer`] renders account notifications and hands the result to a
//! pluggable [`MailTransport`]. Delivery itself lives outside this crate;
//! [`LogTransport`] only records each message through `tracing`.

use std::sync::Arc;

use tracing::info;

use crate::error::MailError;

/// A rendered e-mail ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers rendered messages.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    /// Human-readable transport name (e.g. `log`).
    fn name(&self) -> &str;

    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Transport`] if the message could not be handed off.
    async fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// Transport that logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait::async_trait]
impl MailTransport for LogTransport {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &Message) -> Result<(), MailError> {
        info!(
            transport = self.name(),
            to = %message.to,
            subject = %message.subject,
            "mail queued"
        );
        Ok(())
    }
}

/// Renders account e-mails for one site.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    domain: String,
    from: String,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("transport", &self.transport.name())
            .field("domain", &self.domain)
            .field("from", &self.from)
            .finish()
    }
}

impl Mailer {
    /// `domain` is the public base URL of the site; a trailing slash is
    /// dropped.
    #[must_use]
    pub fn new(
        transport: Arc<dyn MailTransport>,
        domain: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        let domain: String = domain.into();
        Self {
            transport,
            domain: domain.trim_end_matches('/').to_owned(),
            from: from.into(),
        }
    }

    /// Tell the recipient their account was activated or deactivated.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if the transport fails.
    pub async fn send_account_status_email(&self, to: &str, active: bool) -> Result<(), MailError> {
        let status = if active { "active" } else { "inactive" };
        let html = format!(
            "<b>Hey there!</b><br> Your account on <a href='{}'>{}</a> has become {status}",
            self.domain, self.domain
        );
        self.send(to, "NodePress, Change in your account", html)
            .await
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), MailError> {
        let message = Message {
            from: self.from.clone(),
            to: to.to_owned(),
            subject: subject.to_owned(),
            html,
        };
        self.transport.send(&message).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Message>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MailTransport for Recorder {
        #[allow(clippy::unnecessary_literal_bound)]
        fn name(&self) -> &str {
            "recorder"
        }

        async fn send(&self, message: &Message) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport {
                    to: message.to.clone(),
                    reason: "refused".to_owned(),
                });
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn mailer(recorder: &Arc<Recorder>) -> Mailer {
        Mailer::new(
            Arc::clone(recorder) as Arc<dyn MailTransport>,
            "https://blog.example/",
            "NodePress <no-reply@blog.example>",
        )
    }

    #[tokio::test]
    async fn account_status_names_the_state() {
        let recorder = Arc::new(Recorder::default());
        mailer(&recorder)
            .send_account_status_email("ada@x.io", false)
            .await
            .unwrap();
        let sent = recorder.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "NodePress <no-reply@blog.example>");
        assert_eq!(sent[0].subject, "NodePress, Change in your account");
        assert!(sent[0].html.contains("href='https://blog.example'"));
        assert!(sent[0].html.ends_with("become inactive"));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let err = mailer(&recorder)
            .send_account_status_email("ada@x.io", true)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Transport { ref to, .. } if to == "ada@x.io"));
    }

    #[tokio::test]
    async fn log_transport_accepts_everything() {
        let mailer = Mailer::new(Arc::new(LogTransport), "http://localhost:3000", "np@localhost");
        mailer.send_account_status_email("a@b.c", true).await.unwrap();
    }
}
