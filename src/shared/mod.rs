pub mod identity_token;
pub mod names;
