use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AlertDispatcher, AlertError};

/// Longest SMS body the provider accepts
const MAX_MESSAGE_LENGTH: usize = 1600;

/// Length of a local phone number; the `+1` prefix is added on send
const PHONE_LENGTH: usize = 10;

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Sends alerts as SMS through the Twilio messages API
pub struct TwilioSms {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

/// Check the phone number and message before anything goes over the wire
fn validate_sms(phone: &str, message: &str) -> Result<(String, String), AlertError> {
    let phone = phone.trim();
    if phone.chars().count() != PHONE_LENGTH {
        return Err(AlertError::InvalidParameters(format!(
            "phone number must be {PHONE_LENGTH} characters"
        )));
    }

    let message = message.trim();
    if message.is_empty() || message.chars().count() >= MAX_MESSAGE_LENGTH {
        return Err(AlertError::InvalidParameters(format!(
            "message must be between 1 and {} characters",
            MAX_MESSAGE_LENGTH - 1
        )));
    }

    Ok((phone.to_string(), message.to_string()))
}

#[async_trait]
impl AlertDispatcher for TwilioSms {
    async fn send(&self, contact: &str, message: &str) -> Result<(), AlertError> {
        let (phone, body) = validate_sms(contact, message)?;
        let to = format!("+1{phone}");

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("From", self.config.from_phone.as_str()), ("To", to.as_str()), ("Body", body.as_str())])
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 200 || status == 201 {
            tracing::debug!(to = %to, "SMS alert accepted by provider");
            Ok(())
        } else {
            Err(AlertError::Rejected(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sms() {
        assert!(validate_sms("5551234567", "Alert: it is down").is_ok());
        assert!(validate_sms(" 5551234567 ", "trimmed").is_ok());

        assert!(matches!(validate_sms("555123", "msg"), Err(AlertError::InvalidParameters(_))));
        assert!(matches!(validate_sms("5551234567", "   "), Err(AlertError::InvalidParameters(_))));
        let long = "x".repeat(MAX_MESSAGE_LENGTH);
        assert!(matches!(validate_sms("5551234567", &long), Err(AlertError::InvalidParameters(_))));
    }

    #[test]
    fn test_messages_url() {
        let sms = TwilioSms::new(TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_phone: "+15005550006".to_string(),
            api_base: "https://api.twilio.com/".to_string(),
        })
        .unwrap();

        assert_eq!(sms.messages_url(), "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json");
    }

    #[tokio::test]
    async fn test_invalid_contact_is_rejected_without_network() {
        let sms = TwilioSms::new(TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_phone: "+15005550006".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
        })
        .unwrap();

        let result = sms.send("12", "Alert").await;
        assert!(matches!(result, Err(AlertError::InvalidParameters(_))));
    }
}
