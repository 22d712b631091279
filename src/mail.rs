//! One-time passwords by email.

use std::time::Duration;

use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};

use crate::config::EmailSettings;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("unsupported SMTP port {0}")]
    UnsupportedPort(u16),
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    /// STARTTLS on port 587, implicit TLS on 465.
    pub fn new(settings: &EmailSettings) -> Result<Self, MailError> {
        let builder = match settings.port {
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?,
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
            port => return Err(MailError::UnsupportedPort(port)),
        };

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(settings.address.clone(), settings.password.clone()))
            .build();

        Ok(Self { transport, from: settings.address.parse()? })
    }

    pub async fn send_otp(&self, to: &str, code: &str, valid_for: Duration) -> Result<(), MailError> {
        let message = otp_message(self.from.clone(), to.parse()?, code, valid_for)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn otp_message(from: Mailbox, to: Mailbox, code: &str, valid_for: Duration) -> Result<Message, MailError> {
    let minutes = valid_for.as_secs().div_ceil(60);
    let message = Message::builder()
        .from(from)
        .to(to)
        .subject("SoulTalk OTP Verification")
        .body(format!(
            "Your One-Time Password (OTP) for SoulTalk is: {code}\n\n\
             This OTP is valid for {minutes} minutes.\n\
             If you did not request this, please ignore this email.\n"
        ))?;
    Ok(message)
}
