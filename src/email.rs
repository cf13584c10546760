use async_trait::async_trait;
use log::warn;
use rand::{thread_rng, Rng};
use serde_json::json;
use thiserror::Error;

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";
const SENDER_ADDRESS: &str = "noreply@quiznight.example";
const SENDER_NAME: &str = "QuizNight";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Email rejected with status {0}")]
    Rejected(u16),
}

/// Represents a type that can deliver account emails to users.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(
        &self,
        address: &str,
        code: &str,
        username: &str,
    ) -> Result<(), MailError>;

    async fn send_password_recovery(&self, address: &str, secret: &str) -> Result<(), MailError>;
}

/// Generates the six digit code a new user has to echo back.
pub fn generate_code() -> String {
    format!("{:06}", thread_rng().gen_range(0..1_000_000))
}

/// Delivers emails through the Mailjet API.
pub struct MailjetMailer {
    client: reqwest::Client,
    api_key: String,
    secret_key: String,
}

impl MailjetMailer {
    /// Builds a mailer from `MAILJET_APIKEY` and `MAILJET_SECRETKEY`,
    /// returning [None] when either is missing.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("MAILJET_APIKEY").ok()?;
        let secret_key = std::env::var("MAILJET_SECRETKEY").ok()?;

        Some(Self {
            client: reqwest::Client::new(),
            api_key,
            secret_key,
        })
    }

    async fn send(&self, address: &str, subject: &str, body: String) -> Result<(), MailError> {
        let payload = json!({
            "Messages": [{
                "From": { "Email": SENDER_ADDRESS, "Name": SENDER_NAME },
                "To": [{ "Email": address }],
                "Subject": subject,
                "HTMLPart": body,
            }]
        });

        let response = self
            .client
            .post(MAILJET_SEND_URL)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send_verification(
        &self,
        address: &str,
        code: &str,
        username: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "<h2>Email Verification</h2>\
             <p>Hello, {}!</p>\
             <p>To finish signing up to QuizNight, enter this code:</p>\
             <h1>{}</h1>\
             <p>If you did not request this code, you can ignore this email.</p>",
            username, code
        );

        self.send(address, "Verify your QuizNight account", body).await
    }

    async fn send_password_recovery(&self, address: &str, secret: &str) -> Result<(), MailError> {
        let body = format!(
            "<h2>Password Recovery</h2>\
             <p>A temporary password was issued for your account:</p>\
             <h1>{}</h1>\
             <p>Use it to log in, then change it from your profile.</p>",
            secret
        );

        self.send(address, "Your QuizNight password", body).await
    }
}

/// Stands in when no Mailjet credentials are configured: logs what would have
/// been sent so a development server is still usable end to end.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_verification(
        &self,
        address: &str,
        code: &str,
        username: &str,
    ) -> Result<(), MailError> {
        warn!(
            "Email delivery is disabled, verification code for '{}' <{}> is {}",
            username, address, code
        );

        Ok(())
    }

    async fn send_password_recovery(&self, address: &str, secret: &str) -> Result<(), MailError> {
        warn!(
            "Email delivery is disabled, recovery secret for <{}> is {}",
            address, secret
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();

            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
