//! Email service for invitations.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// HTML template for the invitation email.
#[derive(Template)]
#[template(path = "email/invitation.html")]
struct InvitationEmailHtml<'a> {
    name: &'a str,
    organization: &'a str,
    link: &'a str,
    expires_in_days: i64,
}

/// Plain text template for the invitation email.
#[derive(Template)]
#[template(path = "email/invitation.txt")]
struct InvitationEmailText<'a> {
    name: &'a str,
    organization: &'a str,
    link: &'a str,
    expires_in_days: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send an invitation with the signup link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_invitation(
        &self,
        to: &str,
        name: &str,
        organization: &str,
        link: &str,
        expires_in_days: i64,
    ) -> Result<(), EmailError> {
        let (text, html) = render_invitation(name, organization, link, expires_in_days)?;
        let subject = format!("You're invited to {organization} on Worktally");

        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Render the plain text and HTML bodies of an invitation.
fn render_invitation(
    name: &str,
    organization: &str,
    link: &str,
    expires_in_days: i64,
) -> Result<(String, String), EmailError> {
    let text = InvitationEmailText {
        name,
        organization,
        link,
        expires_in_days,
    }
    .render()?;
    let html = InvitationEmailHtml {
        name,
        organization,
        link,
        expires_in_days,
    }
    .render()?;
    Ok((text, html))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_invitation_contains_link() {
        let link = "https://worktally.example.org/auth/jira/signup?token=abc";
        let (text, html) = render_invitation("Grace", "Ops Team", link, 7).unwrap();

        assert!(text.contains("Hi Grace,"));
        assert!(text.contains("Ops Team"));
        assert!(text.contains(link));
        assert!(text.contains("7 days"));
        assert!(html.contains("Accept invitation"));
        assert!(html.contains("token=abc"));
    }

    #[test]
    fn test_render_invitation_escapes_html() {
        let (_, html) = render_invitation("<b>Eve</b>", "Ops", "https://x.test", 7).unwrap();
        assert!(!html.contains("<b>Eve</b>"));
        assert!(html.contains("Eve"));
    }
}
