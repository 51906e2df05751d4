pub mod config;
pub mod http;
pub mod state;

pub use http::router::build_router;
pub use state::AppState;
