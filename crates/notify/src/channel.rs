use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Verified,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery transport error: {0}")]
    Transport(String),
    #[error("delivery to `{address}` was rejected: {reason}")]
    Rejected { address: String, reason: String },
    #[error("`{address}` was not verified within {waited_secs}s")]
    VerificationTimeout { address: String, waited_secs: u64 },
}

/// Outbound channel for composed suggestion messages. Recipients must be
/// verified before the first send; verification is asynchronous and driven by
/// the recipient, so callers poll `verification_status`.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn verification_status(&self, address: &str)
        -> Result<VerificationStatus, DeliveryError>;

    /// Kicks off verification for a new recipient. Idempotent.
    async fn request_verification(&self, address: &str) -> Result<(), DeliveryError>;

    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Polls until the address is verified. Unknown addresses get one verification
/// request up front; the recipient confirming is what flips the status.
pub async fn ensure_verified(
    channel: &dyn DeliveryChannel,
    address: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), DeliveryError> {
    let started = Instant::now();

    if channel.verification_status(address).await? == VerificationStatus::Verified {
        return Ok(());
    }

    debug!(address, "requesting recipient verification");
    channel.request_verification(address).await?;

    loop {
        if started.elapsed() >= timeout {
            return Err(DeliveryError::VerificationTimeout {
                address: address.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
        tokio::time::sleep(poll_interval).await;

        if channel.verification_status(address).await? == VerificationStatus::Verified {
            return Ok(());
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
struct ChannelState {
    verified: HashSet<String>,
    polls_until_verified: HashMap<String, u32>,
    verification_requests: Vec<String>,
    failing_addresses: HashSet<String>,
    sent: Vec<SentMessage>,
}

/// Scriptable fake for worker tests: addresses can be pre-verified, verified
/// after N status polls, or made to fail every send.
#[derive(Default)]
pub struct InMemoryDeliveryChannel {
    state: Mutex<ChannelState>,
}

impl InMemoryDeliveryChannel {
    fn state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn verify_immediately(&self, address: &str) {
        self.state().verified.insert(address.to_string());
    }

    pub fn verify_after_polls(&self, address: &str, polls: u32) {
        self.state().polls_until_verified.insert(address.to_string(), polls);
    }

    pub fn fail_sends_to(&self, address: &str) {
        self.state().failing_addresses.insert(address.to_string());
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn verification_requests(&self) -> Vec<String> {
        self.state().verification_requests.clone()
    }
}

#[async_trait]
impl DeliveryChannel for InMemoryDeliveryChannel {
    async fn verification_status(
        &self,
        address: &str,
    ) -> Result<VerificationStatus, DeliveryError> {
        let mut state = self.state();
        if state.verified.contains(address) {
            return Ok(VerificationStatus::Verified);
        }

        if let Some(remaining) = state.polls_until_verified.get_mut(address) {
            if *remaining <= 1 {
                state.polls_until_verified.remove(address);
                state.verified.insert(address.to_string());
                return Ok(VerificationStatus::Verified);
            }
            *remaining -= 1;
        }

        Ok(VerificationStatus::Pending)
    }

    async fn request_verification(&self, address: &str) -> Result<(), DeliveryError> {
        self.state().verification_requests.push(address.to_string());
        Ok(())
    }

    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let mut state = self.state();

        if state.failing_addresses.contains(address) {
            return Err(DeliveryError::Transport(format!("injected failure for `{address}`")));
        }
        if !state.verified.contains(address) {
            return Err(DeliveryError::Rejected {
                address: address.to_string(),
                reason: "recipient is not verified".to_string(),
            });
        }

        state.sent.push(SentMessage {
            address: address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ensure_verified, DeliveryChannel, DeliveryError, InMemoryDeliveryChannel};

    #[tokio::test]
    async fn already_verified_addresses_skip_the_verification_request() {
        let channel = InMemoryDeliveryChannel::default();
        channel.verify_immediately("a@b.com");

        ensure_verified(&channel, "a@b.com", Duration::from_millis(50), Duration::from_millis(5))
            .await
            .expect("verified address");

        assert!(channel.verification_requests().is_empty());
    }

    #[tokio::test]
    async fn pending_addresses_are_polled_until_verified() {
        let channel = InMemoryDeliveryChannel::default();
        channel.verify_after_polls("new@b.com", 3);

        ensure_verified(&channel, "new@b.com", Duration::from_secs(1), Duration::from_millis(5))
            .await
            .expect("verification completes within the window");

        assert_eq!(channel.verification_requests(), vec!["new@b.com".to_string()]);
        channel.send("new@b.com", "subject", "body").await.expect("send after verification");
        assert_eq!(channel.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn verification_that_never_completes_times_out() {
        let channel = InMemoryDeliveryChannel::default();

        let error = ensure_verified(
            &channel,
            "never@b.com",
            Duration::from_millis(30),
            Duration::from_millis(5),
        )
        .await
        .expect_err("no one confirms this address");

        assert!(matches!(error, DeliveryError::VerificationTimeout { ref address, .. } if address == "never@b.com"));
        assert_eq!(channel.sent_messages().len(), 0);
    }

    #[tokio::test]
    async fn sends_to_unverified_addresses_are_rejected() {
        let channel = InMemoryDeliveryChannel::default();

        let error = channel
            .send("stranger@b.com", "subject", "body")
            .await
            .expect_err("unverified recipient");
        assert!(matches!(error, DeliveryError::Rejected { .. }));
    }
}
