use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{DeliveryChannel, DeliveryError, VerificationStatus};

/// Email delivery over a REST API with a verified-recipient model: an address
/// must confirm a verification mail before the service will accept sends to
/// it.
pub struct HttpEmailChannel {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    sender: String,
}

#[derive(Serialize)]
struct VerificationRequest<'a> {
    address: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct AddressStatus {
    status: String,
}

impl HttpEmailChannel {
    pub fn new(
        base_url: impl Into<String>,
        api_token: SecretString,
        sender: impl Into<String>,
        call_timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            sender: sender.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DeliveryChannel for HttpEmailChannel {
    async fn verification_status(
        &self,
        address: &str,
    ) -> Result<VerificationStatus, DeliveryError> {
        let response = self
            .client
            .get(self.endpoint(&format!("v1/addresses/{address}")))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(VerificationStatus::Pending);
        }
        let response = response
            .error_for_status()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        let status: AddressStatus = response
            .json()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        if status.status.eq_ignore_ascii_case("verified") {
            Ok(VerificationStatus::Verified)
        } else {
            Ok(VerificationStatus::Pending)
        }
    }

    async fn request_verification(&self, address: &str) -> Result<(), DeliveryError> {
        debug!(address, "requesting address verification");
        self.client
            .post(self.endpoint("v1/addresses"))
            .bearer_auth(self.api_token.expose_secret())
            .json(&VerificationRequest { address })
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?
            .error_for_status()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        Ok(())
    }

    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.endpoint("v1/messages"))
            .bearer_auth(self.api_token.expose_secret())
            .json(&SendRequest { from: &self.sender, to: address, subject, body })
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                address: address.to_string(),
                reason: format!("{status}: {detail}"),
            });
        }

        debug!(address, "suggestion email accepted by the delivery service");
        Ok(())
    }
}
