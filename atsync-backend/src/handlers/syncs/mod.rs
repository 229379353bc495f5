pub mod abort;
pub mod trigger;

pub use abort::abort_sync;
pub use trigger::trigger_sync;
