//! Repositories for database operations

pub mod announcements;
pub mod audit;
pub mod releases;
pub mod settings;
pub mod usage;
pub mod users;

pub use announcements::AnnouncementRepository;
pub use audit::AuditRepository;
pub use releases::ReleaseRepository;
pub use settings::SettingsRepository;
pub use usage::UsageRepository;
pub use users::UserDirectory;
