//! Read-only session operations

use crate::session::prepare;
use crate::{GraphReport, IdentityReport, NodeIdentity, OpsCtx, SessionRequest};
use kiln_errors::Error;
use kiln_resolver::ResolvedNode;

/// Resolved graph with final options and identities; runs no step
///
/// # Errors
///
/// Returns recipe, resolution and option errors.
pub async fn graph(ctx: &OpsCtx, request: &SessionRequest) -> Result<GraphReport, Error> {
    let prepared = prepare(ctx, request).await?;
    Ok(GraphReport::new(
        &prepared.graph,
        &prepared.plan,
        prepared.restarts,
    ))
}

/// Package identity of every node, root first
///
/// # Errors
///
/// Returns recipe, resolution and option errors.
pub async fn identity(ctx: &OpsCtx, request: &SessionRequest) -> Result<IdentityReport, Error> {
    let prepared = prepare(ctx, request).await?;
    let nodes: Vec<NodeIdentity> = prepared.graph.nodes().map(node_identity).collect();

    Ok(IdentityReport {
        root: node_identity(prepared.graph.root()),
        nodes,
    })
}

fn node_identity(node: &ResolvedNode) -> NodeIdentity {
    NodeIdentity {
        package: node.to_string(),
        identity: node.identity.map(|h| h.to_hex()).unwrap_or_default(),
    }
}
