//! Email service for password-reset codes and payment receipts.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use kec_core::{Email, money, otp};

use crate::config::EmailConfig;
use crate::models::Order;

/// HTML template for the password-reset code email.
#[derive(Template)]
#[template(path = "email/password_reset_code.html")]
struct PasswordResetCodeHtml<'a> {
    store_name: &'a str,
    code: &'a str,
    validity_minutes: i64,
}

/// Plain text template for the password-reset code email.
#[derive(Template)]
#[template(path = "email/password_reset_code.txt")]
struct PasswordResetCodeText<'a> {
    store_name: &'a str,
    code: &'a str,
    validity_minutes: i64,
}

struct ReceiptLine<'a> {
    name: &'a str,
    quantity: u32,
    price: String,
    subtotal: String,
}

#[derive(Template)]
#[template(path = "email/receipt.html")]
struct ReceiptHtml<'a> {
    store_name: &'a str,
    order: &'a Order,
    lines: Vec<ReceiptLine<'a>>,
    total: String,
    payment_id: &'a str,
}

#[derive(Template)]
#[template(path = "email/receipt.txt")]
struct ReceiptText<'a> {
    store_name: &'a str,
    order: &'a Order,
    total: String,
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

    /// Attachment could not be built.
    #[error("Invalid attachment: {0}")]
    Attachment(String),
}

/// Outbound transactional mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a password-reset passcode.
    async fn send_password_reset_code(&self, to: &Email, code: &str) -> Result<(), EmailError>;

    /// Send a payment receipt with the PDF attached.
    async fn send_receipt(&self, order: &Order, pdf: Vec<u8>) -> Result<(), EmailError>;
}

/// SMTP-backed [`Mailer`].
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    store_name: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if SMTP connection fails.
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
            store_name: config.store_name.clone(),
        })
    }

    fn alternative(text_body: String, html_body: String) -> MultiPart {
        MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(text_body),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html_body),
            )
    }

    async fn send(&self, to: &Email, subject: &str, body: MultiPart) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(body)?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_password_reset_code(&self, to: &Email, code: &str) -> Result<(), EmailError> {
        let store_name = self.store_name.as_str();
        let validity_minutes = otp::OTP_VALIDITY_MINUTES;
        let html = PasswordResetCodeHtml {
            store_name,
            code,
            validity_minutes,
        }
        .render()?;
        let text = PasswordResetCodeText {
            store_name,
            code,
            validity_minutes,
        }
        .render()?;

        let subject = format!("{store_name} - Password Reset Code");
        self.send(to, &subject, Self::alternative(text, html)).await
    }

    async fn send_receipt(&self, order: &Order, pdf: Vec<u8>) -> Result<(), EmailError> {
        let store_name = self.store_name.as_str();
        let total = money::format_amount(order.total());
        let lines = order
            .items
            .iter()
            .map(|item| ReceiptLine {
                name: &item.product_name,
                quantity: item.quantity,
                price: money::format_amount(item.price),
                subtotal: money::format_amount(item.subtotal()),
            })
            .collect();

        let html = ReceiptHtml {
            store_name,
            order,
            lines,
            total: total.clone(),
            payment_id: order.payment_id().unwrap_or("-"),
        }
        .render()?;
        let text = ReceiptText {
            store_name,
            order,
            total,
        }
        .render()?;

        let attachment = Attachment::new(format!("KEC_Receipt_Order_{}.pdf", order.id))
            .body(
                pdf,
                ContentType::parse("application/pdf")
                    .map_err(|e| EmailError::Attachment(e.to_string()))?,
            );

        let body = MultiPart::mixed()
            .multipart(Self::alternative(text, html))
            .singlepart(attachment);

        let subject = format!("{store_name} - Payment Receipt (Order #{})", order.id);
        self.send(&order.contact.email, &subject, body).await
    }
}

/// Generate a 6-digit passcode.
#[must_use]
pub fn generate_verification_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}
