use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpSettings;

pub const DEV_MESSAGE_ID: &str = "mock-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Sends an email and returns the transport's message id.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<String>;
}

/// Development mailer: writes the email to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<String> {
        info!(
            to = %email.to,
            subject = %email.subject,
            text = %email.text,
            "[dev mode] mock email sent"
        );
        Ok(DEV_MESSAGE_ID.to_string())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, settings: &SmtpSettings) -> anyhow::Result<Self> {
        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .with_context(|| format!("failed to configure SMTP relay '{host}'"))?;

        let mut builder = builder.port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.user, &settings.pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = settings
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address '{}'", settings.from))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<String> {
        let to = email
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient address '{}'", email.to))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject);

        let message = match email.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(email.text, html))?,
            None => builder.header(ContentType::TEXT_PLAIN).body(email.text)?,
        };

        let response = self
            .transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        let message_id = response.first_line().unwrap_or_default().to_string();
        info!(%message_id, "message sent");
        Ok(message_id)
    }
}

pub fn build_mailer(settings: &SmtpSettings) -> anyhow::Result<Arc<dyn Mailer>> {
    match settings.host.as_deref() {
        Some(host) => Ok(Arc::new(SmtpMailer::new(host, settings)?)),
        None => {
            info!("no SMTP host configured; newsletter emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub fn welcome_email(to: &str) -> OutgoingEmail {
    let text = "Hi there!\n\n\
        Thanks for subscribing to our newsletter. Get ready for a weekly dose of fresh recipes, \
        cooking tips, and culinary inspiration delivered straight to your inbox.\n\n\
        Happy Cooking!\n\
        The CookFlow Team"
        .to_string();

    let html = r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #eee; border-radius: 10px;">
  <h1 style="color: #333;">Welcome to CookFlow Fresh Inspiration!</h1>
  <p style="color: #555; font-size: 16px; line-height: 1.6;">Hi there!</p>
  <p style="color: #555; font-size: 16px; line-height: 1.6;">
    Thanks for subscribing to our newsletter. Get ready for a weekly dose of fresh recipes, cooking tips, and culinary inspiration delivered straight to your inbox.
  </p>
  <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;" />
  <p style="color: #888; font-size: 14px;">Happy Cooking!<br>The CookFlow Team</p>
</div>"#
        .to_string();

    OutgoingEmail {
        to: to.to_string(),
        subject: "Welcome to CookFlow Fresh Inspiration!".to_string(),
        text,
        html: Some(html),
    }
}
