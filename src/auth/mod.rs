pub mod broker;
pub mod capability;
pub mod jwt;

pub use broker::TokenBroker;
pub use capability::{
    AccessCapability, AccessTokenRequest, AccessTokenResponse, IdentityCapability, PromptEvent, PromptMode,
    StaticAccess, StaticIdentity,
};
