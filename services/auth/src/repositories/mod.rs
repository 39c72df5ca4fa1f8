//! Repositories for database operations

pub mod attempt;
pub mod device;
pub mod user;

pub use attempt::AttemptRepository;
pub use device::DeviceRepository;
pub use user::UserRepository;
