//! # fwends-engine: Pack Resource Lifecycle
//!
//! Keeps the pack catalog, the blob store and each pack's content hash
//! consistent under concurrent writers, with no transaction spanning the two
//! stores.
//!
//! - [`upload`]: marker row, blob write, then a serializable slot swap;
//!   uncommitted uploads and replaced resources go to the prune queue.
//! - [`delete`]: pack, role and pair deletes in one serializable
//!   transaction each; removed resources go to the prune queue.
//! - [`prune`]: the background queue that reclaims marker rows and blobs.
//! - [`retry`]: backoff and attempt cap for serialization failures.
//! - [`lifecycle`]: the per-resource state machine.
//! - [`session`] and [`identity`]: session tokens and the identity-provider
//!   seam.
//!
//! Store-mutating sections run on spawned tasks, so a caller that goes away
//! mid-request never abandons a transaction halfway.

pub mod delete;
pub mod engine;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod packs;
pub mod prune;
pub mod retry;
pub mod session;
pub mod upload;

pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use identity::{
    Authenticator, IdentityError, IdentityProvider, StaticIdentityProvider,
};
pub use lifecycle::{ResourceLifecycle, ResourceState};
pub use packs::{CreatedPack, PackView, RoleView, StringView};
pub use prune::Pruner;
pub use retry::RetryPolicy;
pub use session::{Session, SessionConfig, SessionManager};
