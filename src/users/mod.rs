/// User directory module
///
/// Persistent lookup/creation of user identity and credential records,
/// behind a trait so the auth engine takes an injected handle instead of an
/// ambient connection.

mod directory;
mod memory;
mod postgres;

pub use directory::NewUser;
pub use directory::User;
pub use directory::UserDirectory;
pub use directory::UserProfile;
pub use memory::InMemoryUserDirectory;
pub use postgres::PostgresUserDirectory;
