pub mod api;
pub mod overlay;
pub mod prefs;
pub mod session;

pub use api::{ClientError, CommentsApi, HttpApi, DEFAULT_TIMEOUT};
pub use prefs::LocalPrefs;
pub use session::CommentsSession;
