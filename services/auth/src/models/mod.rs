//! Authentication service models

pub mod device;
pub mod user;

// Re-export for convenience
pub use device::{DeviceStatus, TrustedDevice};
pub use user::{NewUser, User};
