//! The `get-owner-info` probe action: resolves a namespace's CI-assigned
//! author into an addressable owner.
//!
//! Namespaces in this fleet are created by CI/CD pipelines, which stamp
//! the creating user's GitLab handle onto a label and their email onto
//! an annotation at creation time, alongside the team/project/pipeline
//! metadata the metrics gauge labels by. The author/email pair isn't
//! directly usable by the Notifier, so this probe exchanges it for a
//! `{name, slack_id}` pair via the People directory and encodes that pair
//! as the base64 `owner` address the rest of the system treats as opaque;
//! the rest of the CI-stamped metadata is copied straight across onto our
//! own annotation namespace, since `NamespaceLabels` only ever reads our
//! prefix.

use std::collections::BTreeMap;

use base64::Engine;
use tracing::info;

use crate::error::{Error, Result};
use crate::probe::ProbeContext;
use crate::types::annotation;

const LABEL_AUTHOR: &str = "cicd.skao.int/author";
const ANNOTATION_AUTHOR_EMAIL: &str = "cicd.skao.int/authorEmail";
const LABEL_TEAM: &str = "cicd.skao.int/team";
const LABEL_PROJECT: &str = "cicd.skao.int/project";
const LABEL_ENVIRONMENT: &str = "cicd.skao.int/environment";
const ANNOTATION_PIPELINE_ID: &str = "cicd.skao.int/pipelineId";
const ANNOTATION_PROJECT_ID: &str = "cicd.skao.int/projectId";

/// Encodes a resolved person as the `"name::slack_id"` address the core
/// treats as an opaque owner handle.
pub fn encode_owner_address(name: &str, slack_id: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{name}::{slack_id}"))
}

/// Decodes an owner address back into `(name, slack_id)`, if it is
/// well-formed. Used by the action controller to label notifications;
/// not needed by the probe itself, which only ever encodes.
pub fn decode_owner_address(address: &str) -> Option<(String, String)> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(address).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (name, slack_id) = text.split_once("::")?;
    Some((name.to_string(), slack_id.to_string()))
}

/// Copies the CI-stamped team/project/pipeline/environment metadata from
/// its `cicd.skao.int/*` source label or annotation onto our own
/// annotation namespace, skipping any key the pipeline didn't stamp.
fn ci_metadata_annotations(
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(v) = labels.get(LABEL_TEAM) {
        out.insert(annotation::team(), v.clone());
    }
    if let Some(v) = labels.get(LABEL_PROJECT) {
        out.insert(annotation::project(), v.clone());
    }
    if let Some(v) = labels.get(LABEL_ENVIRONMENT) {
        out.insert(annotation::environment(), v.clone());
    }
    if let Some(v) = annotations.get(ANNOTATION_PIPELINE_ID) {
        out.insert(annotation::pipeline_id(), v.clone());
    }
    if let Some(v) = annotations.get(ANNOTATION_PROJECT_ID) {
        out.insert(annotation::project_id(), v.clone());
    }
    out
}

pub async fn run(ctx: &ProbeContext, namespace: &str) -> Result<()> {
    let ns = ctx
        .adapter
        .get_namespace(namespace)
        .await
        .ok_or_else(|| Error::NamespaceGone(namespace.to_string()))?;

    let mut annotations = ci_metadata_annotations(&ns.labels, &ns.annotations);

    match ns.labels.get(LABEL_AUTHOR) {
        None => info!(namespace, "namespace has no author label, owner left unresolved"),
        Some(author) => {
            let author_email = ns.annotations.get(ANNOTATION_AUTHOR_EMAIL).map(String::as_str);
            match ctx.people.get_person(author, author_email).await {
                Some(person) => {
                    annotations.insert(
                        annotation::owner(),
                        encode_owner_address(&person.name, &person.slack_id),
                    );
                }
                None => info!(namespace, author, "person lookup returned nothing"),
            }
        }
    }

    if annotations.is_empty() {
        return Ok(());
    }

    ctx.adapter
        .patch_namespace(namespace, &BTreeMap::new(), &annotations)
        .await
        .map_err(|e| Error::ExternalDependency(format!("failed to patch namespace owner info: {e}")))?;

    info!(namespace, "owner info updated");
    Ok(())
}

#[cfg(test)]
#[path = "get_owner_info_test.rs"]
mod tests;
