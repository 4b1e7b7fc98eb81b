//! Authentication: JWT token service, session revocation, middleware

mod extractor;
mod middleware;
mod revocation;
mod token;

pub use extractor::CurrentUser;
pub use middleware::{require_auth, require_permission};
pub use revocation::{MemoryRevocationStore, RevocationStore};
pub use token::{Claims, TokenService};
