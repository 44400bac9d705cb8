//! Shared helper for loading an operator-supplied CA certificate onto an
//! outbound `reqwest` client — used by the People API and Prometheus
//! clients, both of which accept an optional `ca` config path alongside
//! `insecure`.

use reqwest::Certificate;

pub(crate) fn load_root_certificate(path: &str) -> std::io::Result<Certificate> {
    let pem = std::fs::read(path)?;
    Certificate::from_pem(&pem).map_err(std::io::Error::other)
}
