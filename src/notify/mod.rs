//! Notification delivery.
//!
//! `Notifier` is the seam the action controller calls through: a
//! fire-and-forget sink from the caller's perspective, swappable without
//! touching the controller logic. The concrete implementation here posts
//! a rendered Slack message to an incoming webhook.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tera::Tera;
use tracing::warn;

use crate::config::NotifierConfig;
use crate::probe::get_owner_info::decode_owner_address;
use crate::state::Status;

/// What the action controller passes to [`Notifier::notify`]: everything
/// a template needs, and nothing the controller had to construct itself.
/// `owner_address` is the opaque base64 `owner` annotation value as read
/// straight off the namespace — the core never decodes it, it just
/// forwards it to whichever notifier implementation needs a recipient.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationContext {
    pub namespace: String,
    pub status: String,
    pub reason: String,
    pub owner_address: Option<String>,
}

impl NotificationContext {
    pub fn new(namespace: &str, status: Status, reason: &str, owner_address: Option<&str>) -> Self {
        Self {
            namespace: namespace.to_string(),
            status: status.as_str().to_string(),
            reason: reason.to_string(),
            owner_address: owner_address.map(str::to_string),
        }
    }

    /// Decodes `owner_address` back into a display name, if it is a
    /// well-formed `"name::slack_id"` address. Used only by notifier
    /// implementations that want a human name for the message body — the
    /// core itself never needs this.
    pub fn recipient_name(&self) -> Option<String> {
        self.owner_address
            .as_deref()
            .and_then(decode_owner_address)
            .map(|(name, _)| name)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ctx: &NotificationContext) -> anyhow::Result<()>;
}

/// Notifier backed by a Slack incoming webhook. The message body is
/// rendered from a Tera template so operators can restyle notifications
/// without a code change.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
    token: String,
    renderer: Tera,
}

const DEFAULT_TEMPLATE_NAME: &str = "status_change.tera";
const DEFAULT_TEMPLATE: &str = "\
:warning: Namespace `{{ namespace }}` is now *{{ status }}* ({{ reason }}){% if recipient_name %}, cc {{ recipient_name }}{% endif %}.";

impl SlackNotifier {
    pub fn new(config: &NotifierConfig) -> anyhow::Result<Self> {
        let mut renderer = Tera::default();
        renderer.add_raw_template(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE)?;

        Ok(Self {
            http: reqwest::Client::new(),
            webhook_url: config.webhook_url.clone(),
            token: config.token.clone(),
            renderer,
        })
    }

    /// Loads notification templates from a directory glob, replacing the
    /// built-in renderer when the directory defines a `status_change.tera`.
    pub fn with_template_dir(mut self, glob: &str) -> anyhow::Result<Self> {
        let loaded = Tera::new(glob)?;
        if loaded.get_template_names().any(|n| n == DEFAULT_TEMPLATE_NAME) {
            self.renderer = loaded;
        }
        Ok(self)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, ctx: &NotificationContext) -> anyhow::Result<()> {
        if self.webhook_url.is_empty() {
            warn!(namespace = %ctx.namespace, "notifier has no webhook configured, dropping notification");
            return Ok(());
        }

        let mut tera_ctx = tera::Context::new();
        tera_ctx.insert("namespace", &ctx.namespace);
        tera_ctx.insert("status", &ctx.status);
        tera_ctx.insert("reason", &ctx.reason);
        tera_ctx.insert("recipient_name", &ctx.recipient_name());

        let text = self.renderer.render(DEFAULT_TEMPLATE_NAME, &tera_ctx)?;

        let mut body = BTreeMap::new();
        body.insert("text", text);

        let mut request = self.http.post(&self.webhook_url).json(&body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook returned status {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
