//! Username/password login for a provider with no public OAuth2 surface.
//!
//! The flow replays the provider's mobile-app sign-in: an SSO web session
//! yields a ticket, the ticket is traded for a long-lived OAuth1 token, and the
//! OAuth1 token is exchanged (and re-exchanged) for short-lived OAuth2 tokens.

pub mod cookies;
pub mod endpoints;
pub mod flow;
pub mod oauth1;
pub mod profile;
pub mod scrape;
pub mod tokens;

pub use {
    endpoints::SsoEndpoints,
    flow::{SSO_NAMESPACE, SsoLoginFlow},
    oauth1::{Consumer, OAuth1Token, Signer},
    profile::Profile,
    scrape::LoginOutcome,
    tokens::SsoTokens,
};
