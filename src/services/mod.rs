// Business services, one per backend collection, plus the thread facade.
// Public methods are fail-soft: any store error is logged and collapsed
// to an empty/None/false result, so callers never see a structured
// failure reason. The internal try_* methods carry AppResult.

pub mod comments;
pub mod likes;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod threads;
pub mod users;

pub use comments::{CommentService, NewComment};
pub use likes::LikeService;
pub use messages::{MessageService, NewMessage};
pub use notifications::{NewNotification, NotificationService};
pub use posts::{NewPost, PostService, PostUpdate};
pub use threads::{PostThread, ThreadService};
pub use users::{NewUser, UserService, UserUpdate};
