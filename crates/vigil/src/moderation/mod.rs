//! Inbound moderation webhooks.
//!
//! The classification service calls back into the site to approve, mark as
//! spam, or delete content it classified earlier. A call passes four gates
//! in order, stopping at the first failure:
//!
//! ```text
//! action valid → entity resolved → request authenticated → hook dispatched
//!     400              410                 401                  200
//! ```

mod authenticator;
mod dispatcher;
mod hooks;

pub use authenticator::{InboundRequest, RequestAuthenticator};
pub use dispatcher::ModerationDispatcher;
pub use hooks::HookRegistry;

#[cfg(test)]
pub(crate) use authenticator::tests as authenticator_tests;
#[cfg(test)]
pub(crate) use hooks::tests as hooks_tests;
