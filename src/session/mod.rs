/// Session module
///
/// Server-side session records in an expiring key-value store, plus the
/// random identifier generation for session ids and refresh jtis.

mod memory;
mod store;

pub use memory::InMemorySessionStore;
pub use store::generate_refresh_jti;
pub use store::generate_session_id;
pub use store::RotateOutcome;
pub use store::SessionRecord;
pub use store::SessionStore;
pub use store::STORE_CALL_TIMEOUT;
