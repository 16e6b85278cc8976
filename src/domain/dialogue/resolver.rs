//! Parameter resolver.
//!
//! Walks a flow's linked parameter chain and finds the next parameter that
//! still needs to be collected.

use crate::domain::catalog::Flow;
use crate::domain::errors::EngineError;
use crate::domain::session::SessionState;

/// Finds the next unsatisfied parameter of `flow`, or `None` when the chain
/// is exhausted.
///
/// A node is satisfied when its name, or its name suffixed with `_id`, is
/// marked collected (an object-valued extraction stores a display name and
/// an identifier under two distinct keys; either marks the parameter done).
///
/// Traversal is capped at the flow's parameter count; exceeding the cap
/// means the chain is cyclic, which is a fatal configuration error rather
/// than a silent retry.
pub fn next_parameter<'a>(
    flow: &'a Flow,
    state: &SessionState,
) -> Result<Option<&'a str>, EngineError> {
    let mut cursor = flow.initial_parameter.as_deref();
    let mut hops = 0usize;

    while let Some(name) = cursor {
        if hops >= flow.parameter_count() {
            return Err(EngineError::CyclicChain(flow.name.clone()));
        }
        hops += 1;

        let param = flow
            .parameter(name)
            .ok_or_else(|| EngineError::not_found("parameter", name))?;

        if !state.is_collected(name) {
            return Ok(Some(&param.name));
        }
        cursor = param.next_parameter.as_deref();
    }

    Ok(None)
}
