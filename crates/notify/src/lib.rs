pub mod channel;
pub mod email;

pub use channel::{
    ensure_verified, DeliveryChannel, DeliveryError, InMemoryDeliveryChannel, SentMessage,
    VerificationStatus,
};
pub use email::HttpEmailChannel;
