use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// A fully rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ServiceError>;
}

/// SMTP delivery via lettre. Construction succeeds without credentials; the
/// missing configuration only surfaces when a send is attempted.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: Option<String>,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let transport = match &config.smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?
                    .port(config.smtp_port);

                if let (Some(username), Some(password)) =
                    (&config.smtp_username, &config.smtp_password)
                {
                    builder =
                        builder.credentials(Credentials::new(username.clone(), password.clone()));
                }

                Some(builder.build())
            }
            None => None,
        };

        Ok(Self {
            transport,
            from_address: config.smtp_from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), ServiceError> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            ServiceError::ExternalServiceError("outbound mail is not configured".to_string())
        })?;
        let from_address = self.from_address.as_ref().ok_or_else(|| {
            ServiceError::ExternalServiceError("outbound mail sender is not configured".to_string())
        })?;

        let message = Message::builder()
            .from(from_address.parse().map_err(|_| {
                ServiceError::ValidationError(format!("invalid sender address: {}", from_address))
            })?)
            .to(email.to.parse().map_err(|_| {
                ServiceError::ValidationError(format!("invalid recipient address: {}", email.to))
            })?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        transport
            .send(message)
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        info!("Email sent successfully");
        Ok(())
    }
}
