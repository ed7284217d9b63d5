use shared::{domain::LayerId, error::Failure};
use thiserror::Error;

/// Errors surfaced by the reconciler and session, above the gateway.
///
/// Local bookkeeping errors (unknown/locked layer) stay distinct from
/// remote failures so callers can report them differently.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerId),

    #[error("layer {0:?} is locked")]
    LockedLayer(LayerId),

    #[error(transparent)]
    Gateway(#[from] Failure),
}
