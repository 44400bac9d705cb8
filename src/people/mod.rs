//! Client for the organization's People directory API.
//!
//! Used by the `get-owner-info` probe to turn a GitLab handle and email
//! into the {name, slack_id} pair encoded into a namespace's `owner`
//! annotation. Like the Kubernetes adapter, failures here degrade
//! gracefully: a namespace just stays without a resolvable owner for
//! another tick rather than failing the probe outright.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::PeopleApiConfig;
use crate::tls::load_root_certificate;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub name: String,
    pub slack_id: String,
}

#[derive(Clone)]
pub struct PeopleClient {
    http: reqwest::Client,
    base_url: String,
}

impl PeopleClient {
    pub fn new(config: &PeopleApiConfig) -> Self {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_path) = &config.ca {
            match load_root_certificate(ca_path) {
                Ok(cert) => builder = builder.add_root_certificate(cert),
                Err(e) => warn!(path = %ca_path, error = %e, "failed to load people API CA certificate"),
            }
        }
        let http = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: config.url.clone(),
        }
    }

    /// Looks up a person by GitLab handle and/or email via
    /// `GET {url}/api/people?gitlab_handle=…&email=…`. Returns `None` on
    /// any failure (unreachable API, non-2xx, malformed body) rather than
    /// propagating an error.
    pub async fn get_person(&self, gitlab_handle: &str, email: Option<&str>) -> Option<Person> {
        if self.base_url.is_empty() {
            return None;
        }

        let url = format!("{}/api/people", self.base_url.trim_end_matches('/'));
        let mut query = vec![("gitlab_handle", gitlab_handle)];
        if let Some(email) = email {
            query.push(("email", email));
        }

        match self.http.get(&url).query(&query).send().await {
            Ok(response) if response.status().is_success() => match response.json::<Person>().await {
                Ok(person) => Some(person),
                Err(e) => {
                    warn!(gitlab_handle, error = %e, "failed to parse people API response");
                    None
                }
            },
            Ok(response) => {
                warn!(gitlab_handle, status = %response.status(), "people API returned an error status");
                None
            }
            Err(e) => {
                warn!(gitlab_handle, error = %e, "failed to reach people API");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
