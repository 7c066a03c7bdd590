use serde::{Deserialize, Serialize};

/// JWT claims as issued by the account service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthClaims {
    pub sub: String, // User id (standard JWT subject claim)
    pub exp: usize,  // Expiration timestamp (standard JWT claim)
    pub iat: usize,  // Issued at timestamp (standard JWT claim)
}

/// Identity resolved from a verified handshake token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}
