pub mod app;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod state;
pub mod sync_source;

pub use app::build_router;
