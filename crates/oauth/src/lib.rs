pub mod callback_server;
pub mod defaults;
pub mod error;
pub mod flow;
pub mod lifecycle;
pub mod state;
pub mod storage;
pub mod types;

pub use {
    callback_server::{CallbackCode, CallbackServer},
    defaults::{account_namespace, builtin_provider, tool_namespace},
    error::{AuthError, Result},
    flow::{OAuthFlow, parse_redirect},
    lifecycle::{TokenState, TokenStatus},
    storage::TokenStore,
    types::{OAuth2Credentials, OAuthConfig, OAuthTokens, serialize_secret},
};
