//! Repository traits for ledger operations.

pub mod comments;
pub mod engagements;
pub mod notifications;
pub mod posts;
pub mod users;

pub use comments::CommentRepo;
pub use engagements::EngagementRepo;
pub use notifications::NotificationRepo;
pub use posts::PostRepo;
pub use users::UserRepo;
