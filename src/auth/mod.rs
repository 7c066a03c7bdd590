// Public API
pub use token::{JwtTokenVerifier, TokenVerifier};
pub use types::{AuthClaims, AuthenticatedUser};

// Internal modules
mod token;
mod types;
