pub mod intent;
pub mod request;
pub mod restaurant;
pub mod session;
