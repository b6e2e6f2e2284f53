//! Torrent reconciliation: actor, handle, and the state machine it drives.
//!
//! The reconciler owns the mapping between persisted torrent entries and
//! whatever the engine currently reports, polling on a fixed cadence and
//! serializing every mutation on one task.

mod actor;
mod commands;
mod core;
mod handle;
#[cfg(test)]
pub(crate) mod test_mocks;

pub use actor::spawn_reconciler;
pub use commands::{AddedTorrent, ReconcileError, ReconcilerCommand};
pub use core::{CATEGORY_TIER_ORDER, CategoryTier, Reconciler};
pub use handle::ReconcilerHandle;
