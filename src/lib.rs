//! # spdg
//!
//! Layered, capability-gated encrypted data container.
//!
//! A value is never held in the clear. Each write seals caller data into a
//! new layer under a fresh keypair and hands the private half back as a
//! `Capability`; reading peels the outermost layer and needs exactly that
//! capability. Authorization is per layer, not per connection. A layer can
//! also be sealed destructively: its capability is discarded on the spot, so
//! the layer stays present and counted but can never be opened again.
//!
//! Three tiers, bottom-up:
//! - [`Layer`]: one encrypted envelope.
//! - [`Onion`]: a stack of layers; only the top is addressable.
//! - [`Facade`]: the handle callers hold; enforces a [`Policy`] and lets one
//!   operation run at a time.
//!
//! No operation throws for an expected result. Every call reports an
//! [`Outcome`], a `(Status, Reason)` pair:
//!
//! ```
//! use spdg::{Facade, Outcome, Policy, Reason};
//!
//! let facade = Facade::new(Policy::Worm);
//! let sealed = facade.poke(b"ledger entry");
//! assert_eq!(sealed.outcome, Outcome::ok(Reason::Key));
//!
//! // WORM: the second write is refused.
//! assert_eq!(facade.poke(b"rewrite").outcome, Outcome::no(Reason::Worm));
//!
//! let capability = sealed.capability.unwrap();
//! assert_eq!(facade.peek(&capability).plaintext, b"ledger entry");
//! ```

pub mod audit;
pub mod config;
pub(crate) mod crypto;
pub mod error;
pub mod facade;
pub mod keys;
pub mod layer;
pub mod onion;
pub mod policy;
pub mod status;

pub use config::FacadeConfig;
pub use error::SpdgError;
pub use facade::Facade;
pub use keys::{Capability, LayerKey};
pub use layer::Layer;
pub use onion::Onion;
pub use policy::Policy;
pub use status::{Outcome, Peeled, Reason, Sealed, State, Status};
