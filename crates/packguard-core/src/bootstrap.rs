//! Application of resolved init stages against a repository handle.
//!
//! Every directive failure is recoverable: it is reported to the error
//! listener, the in-flight uncommitted change is discarded, and processing
//! continues with the next directive.

use packguard_domain::InitStage;
use packguard_types::NodeTypeSet;

use crate::listener::ErrorListener;
use crate::repo::RepoHandle;

/// Unordered node type sources are retried across passes because their
/// inter-definition dependency order is not guaranteed; the final pass
/// registers what it can and reports the remainder.
pub const MAX_NODE_TYPE_PASSES: usize = 5;

/// Apply every stage's directives in registration order.
pub fn apply_init_stages(
    handle: &mut dyn RepoHandle,
    stages: &[InitStage],
    listener: &mut dyn ErrorListener,
) {
    for stage in stages {
        apply_stage(handle, stage, listener);
    }
}

fn apply_stage(handle: &mut dyn RepoHandle, stage: &InitStage, listener: &mut dyn ErrorListener) {
    register_unordered_sources(handle, stage.unordered_sources(), listener);
    register_ordered_sources(handle, stage.ordered_sources(), listener);

    for (uri, prefix) in stage.namespaces() {
        if let Err(error) = handle.register_namespace(prefix, uri) {
            listener.on_namespace_error(&error, prefix, uri);
            handle.discard();
        }
    }

    for privilege in stage.privileges() {
        if let Err(error) = handle.register_privilege(privilege) {
            listener.on_privilege_error(&error, privilege);
            handle.discard();
        }
    }

    // ancestors before descendants
    for root in stage.forced_roots_in_creation_order() {
        match handle.create_root(root).and_then(|()| handle.commit()) {
            Ok(()) => {}
            Err(error) => {
                listener.on_forced_root_error(&error, root);
                handle.discard();
            }
        }
    }
}

fn register_unordered_sources(
    handle: &mut dyn RepoHandle,
    sources: &[NodeTypeSet],
    listener: &mut dyn ErrorListener,
) {
    let mut remaining: Vec<&NodeTypeSet> = sources.iter().collect();
    for pass in 1..=MAX_NODE_TYPE_PASSES {
        if remaining.is_empty() {
            break;
        }
        let final_pass = pass == MAX_NODE_TYPE_PASSES;
        let mut unresolved = Vec::new();
        for source in remaining {
            match handle.register_node_types(&source.defs, final_pass) {
                Ok(()) => {}
                Err(error) if final_pass => listener.on_node_type_error(&error, &source.name),
                Err(_) => unresolved.push(source),
            }
        }
        remaining = unresolved;
    }
}

fn register_ordered_sources(
    handle: &mut dyn RepoHandle,
    sources: &[NodeTypeSet],
    listener: &mut dyn ErrorListener,
) {
    for source in sources {
        if let Err(error) = handle.register_node_types(&source.defs, true) {
            listener.on_node_type_error(&error, &source.name);
        }
    }
}
