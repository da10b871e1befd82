//! Invocation pipeline (C5) — the hot path.
//!
//! Given `(ctx, tool, caller-input, claims-map, verified-auth-services)`:
//!
//! 1. parameter parse (authentication-bound parameters are resolved from
//!    claims here too, per the parameter model),
//! 2. authorization,
//! 3-5. template resolution, backend call, and result shaping — delegated
//!    to the tool's backend-specific [`ToolInvoker`][crate::tool::ToolInvoker],
//! 6. error mapping — left to the dispatcher, since this module returns the
//!    tagged [`Error`] unmodified.
//!
//! The pipeline never recovers from a backend error on the caller's behalf.

use serde_json::{Map, Value};

use crate::auth;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::param::{ClaimsMap, ParamValues};
use crate::tool::{InvokeResult, Tool};

/// Run one invocation of `tool`.
///
/// `verified_auth_services` are the auth-service names the boundary has
/// already verified the caller presents (e.g. because a corresponding
/// `<service>_token` header validated).
pub async fn invoke(
    ctx: &Context,
    tool: &Tool,
    input: &Map<String, Value>,
    claims: &ClaimsMap,
    verified_auth_services: &[String],
) -> Result<InvokeResult> {
    let combined = tool.combined_parameters();
    let parsed = ParamValues::parse(&combined, input, claims)?;

    if !auth::authorized(&tool.auth_required, verified_auth_services) {
        return Err(Error::AuthRequired(tool.auth_required.clone()));
    }

    tool.dispatch(ctx, &parsed).await
}
