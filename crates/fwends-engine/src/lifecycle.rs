//! # Resource Lifecycle
//!
//! The marker-table lifecycle of one resource id:
//!
//! ```text
//! Unmarked ──▶ Recorded ──▶ BlobWritten ──▶ Committed ──▶ Pruned
//!                 │              │
//!                 └──────────────┴──▶ Abandoned ──▶ Pruned
//! ```
//!
//! `Recorded` means a row exists in `resources`, written before any
//! irreversible object-store action. `Committed` means a slot points at the
//! resource. `Abandoned` means the slot transaction never committed; the
//! resource must be pruned. A committed resource becomes prunable again once
//! a later upload replaces it or a delete removes its slot.

use std::fmt;

use fwends_core::ResourceId;

/// Lifecycle state of a single resource id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Id minted, nothing written anywhere.
    Unmarked,
    /// Row present in the `resources` marker table.
    Recorded,
    /// Payload written to the blob store.
    BlobWritten,
    /// A slot references the resource.
    Committed,
    /// The slot transaction failed; awaiting pruning.
    Abandoned,
    /// Marker rows and blob are gone. Terminal.
    Pruned,
}

impl ResourceState {
    /// Lowercase state name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmarked => "unmarked",
            Self::Recorded => "recorded",
            Self::BlobWritten => "blob-written",
            Self::Committed => "committed",
            Self::Abandoned => "abandoned",
            Self::Pruned => "pruned",
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Pruned)
    }

    /// Whether a resource in this state must be handed to the pruner when
    /// its owner lets go of it.
    pub fn needs_prune(&self) -> bool {
        matches!(self, Self::Recorded | Self::BlobWritten | Self::Abandoned)
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [ResourceState] {
        match self {
            Self::Unmarked => &[Self::Recorded],
            Self::Recorded => &[Self::BlobWritten, Self::Abandoned],
            Self::BlobWritten => &[Self::Committed, Self::Abandoned],
            Self::Committed => &[Self::Pruned],
            Self::Abandoned => &[Self::Pruned],
            Self::Pruned => &[],
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resource {id}: invalid transition {from} -> {to}")]
pub struct TransitionError {
    /// Resource being advanced.
    pub id: ResourceId,
    /// State before the attempted transition.
    pub from: ResourceState,
    /// Requested state.
    pub to: ResourceState,
}

/// A resource id together with its current lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLifecycle {
    id: ResourceId,
    state: ResourceState,
}

impl ResourceLifecycle {
    /// Start tracking a freshly minted id.
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            state: ResourceState::Unmarked,
        }
    }

    /// Track a resource that a slot currently references.
    pub fn committed(id: ResourceId) -> Self {
        Self {
            id,
            state: ResourceState::Committed,
        }
    }

    /// Track a resource known to be unreferenced, such as one found in the
    /// pruned marker table at startup.
    pub fn abandoned(id: ResourceId) -> Self {
        Self {
            id,
            state: ResourceState::Abandoned,
        }
    }

    /// The tracked id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The current state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Move to `to` if it is a valid successor of the current state.
    pub fn advance(&mut self, to: ResourceState) -> Result<(), TransitionError> {
        if !self.state.valid_transitions().contains(&to) {
            return Err(TransitionError {
                id: self.id,
                from: self.state,
                to,
            });
        }
        tracing::trace!(resource_id = %self.id, from = %self.state, to = %to, "resource transition");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> ResourceLifecycle {
        ResourceLifecycle::new(ResourceId::new(99).unwrap())
    }

    #[test]
    fn happy_path_reaches_committed() {
        let mut lc = lifecycle();
        lc.advance(ResourceState::Recorded).unwrap();
        lc.advance(ResourceState::BlobWritten).unwrap();
        lc.advance(ResourceState::Committed).unwrap();
        assert!(!lc.state().needs_prune());
        lc.advance(ResourceState::Pruned).unwrap();
        assert!(lc.state().is_terminal());
    }

    #[test]
    fn abandonment_from_either_pre_commit_state() {
        for steps in [
            &[ResourceState::Recorded][..],
            &[ResourceState::Recorded, ResourceState::BlobWritten][..],
        ] {
            let mut lc = lifecycle();
            for s in steps {
                lc.advance(*s).unwrap();
            }
            assert!(lc.state().needs_prune());
            lc.advance(ResourceState::Abandoned).unwrap();
            lc.advance(ResourceState::Pruned).unwrap();
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut lc = lifecycle();
        let err = lc.advance(ResourceState::Committed).unwrap_err();
        assert_eq!(err.from, ResourceState::Unmarked);
        assert_eq!(err.to, ResourceState::Committed);
        assert_eq!(lc.state(), ResourceState::Unmarked);
    }

    #[test]
    fn pruned_is_terminal() {
        let mut lc = ResourceLifecycle::committed(ResourceId::new(1).unwrap());
        lc.advance(ResourceState::Pruned).unwrap();
        assert!(ResourceState::Pruned.valid_transitions().is_empty());
        assert!(lc.advance(ResourceState::Recorded).is_err());
    }

    #[test]
    fn unmarked_needs_no_prune() {
        assert!(!ResourceState::Unmarked.needs_prune());
        assert!(!ResourceState::Committed.needs_prune());
        assert!(!ResourceState::Pruned.needs_prune());
    }
}
