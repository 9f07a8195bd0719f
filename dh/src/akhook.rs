//! AK maintenance callback (`spec.md` §6, §9): invoked after a write or
//! delete commits, with no DH lock held, so secondary-index maintenance
//! never nests inside this engine's own locking.
//!
//! Index subfile contents and the AK subroutine dispatch that would
//! consume this hook are out of scope (`spec.md` §1); this module only
//! defines the seam.

/// Which change triggered the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AkMode {
    Add,
    Mod,
    Del,
}

/// Implemented by callers that maintain secondary indexes alongside a
/// DH file. `dh::handle::Handle` holds an `Option<Arc<dyn AkHook>>` and
/// calls this after each write/delete commits.
pub trait AkHook: Send + Sync {
    fn on_change(&self, mode: AkMode, id: &[u8], old: Option<&[u8]>, new: Option<&[u8]>);
}
