mod credential;
mod reset;
mod token;

pub use credential::{CredentialManager, normalize_answer};
pub use reset::{
    MemoryResetTokenStore, RedisResetTokenStore, ResetTokenRecord, ResetTokenStore,
    generate_reset_token, reset_token_digest,
};
pub use token::{Claims, IssuedToken, TOKEN_TTL_HOURS, TokenService};
