use axum::extract::State;
use axum::Json;
use serde::Serialize;

use ledgerql_core::ExpandLimits;

use super::SharedState;

// ==============================================================================
// Hard Ceilings for Nested Expansion
// ==============================================================================
//
// These caps protect the node and the server regardless of CLI configuration.

pub(crate) const HARD_MAX_EXPAND_DEPTH: usize = 8;
pub(crate) const HARD_MAX_EXPAND_FIELDS: usize = 256;

#[derive(Serialize)]
pub(super) struct LimitsResponse {
    hard_max_depth: usize,
    configured_max_depth: usize,
    effective_max_depth: usize,
    hard_max_fields: usize,
    configured_max_fields: usize,
    effective_max_fields: usize,
    block_queries_enabled: bool,
}

/// Configured limits clamped to the hard ceilings.
pub(super) fn effective_limits(configured: &ExpandLimits) -> ExpandLimits {
    ExpandLimits {
        max_depth: configured.max_depth.min(HARD_MAX_EXPAND_DEPTH),
        max_fields: configured.max_fields.min(HARD_MAX_EXPAND_FIELDS),
    }
}

pub(super) async fn get_limits(State(state): State<SharedState>) -> Json<LimitsResponse> {
    let configured = state.expand_limits;
    let effective = effective_limits(&configured);

    Json(LimitsResponse {
        hard_max_depth: HARD_MAX_EXPAND_DEPTH,
        configured_max_depth: configured.max_depth,
        effective_max_depth: effective.max_depth,
        hard_max_fields: HARD_MAX_EXPAND_FIELDS,
        configured_max_fields: configured.max_fields,
        effective_max_fields: effective.max_fields,
        block_queries_enabled: state.enable_block_queries,
    })
}
