use super::*;

fn config(enabled: bool, url: &str) -> PrometheusConfig {
    PrometheusConfig {
        enabled,
        url: url.to_string(),
        ca: None,
        insecure: false,
        whitelisted_alerts: vec!["PodCrashLooping".to_string()],
        cronjob_delay: Duration::from_secs(0),
    }
}

#[test]
fn disabled_client_reports_not_enabled() {
    let client = PrometheusClient::new(&config(false, "http://prom.local"));
    assert!(!client.is_enabled());
}

#[test]
fn enabled_client_without_url_is_still_not_enabled() {
    let client = PrometheusClient::new(&config(true, ""));
    assert!(!client.is_enabled());
}

#[tokio::test]
async fn disabled_client_returns_none_without_making_a_request() {
    let client = PrometheusClient::new(&config(false, "http://127.0.0.1:1"));
    assert!(client.fetch_namespace_alerts("ci-1234").await.is_none());
}

#[tokio::test]
async fn unreachable_host_returns_none() {
    let client = PrometheusClient::new(&config(true, "http://127.0.0.1:1"));
    assert!(client.fetch_namespace_alerts("ci-1234").await.is_none());
}

fn alert(name: &str, severity: &str) -> Alert {
    let mut labels = std::collections::BTreeMap::new();
    labels.insert("alertname".to_string(), name.to_string());
    labels.insert("severity".to_string(), severity.to_string());
    Alert {
        labels,
        state: "firing".to_string(),
    }
}

#[test]
fn whitelisted_critical_alert_is_exempt() {
    let client = PrometheusClient::new(&config(true, "http://prom.local"));
    assert!(client.is_whitelisted(&alert("PodCrashLooping", "critical")));
    assert!(!client.is_whitelisted(&alert("OOMKilled", "critical")));
}

#[test]
fn whitelisting_never_promotes_non_critical_alerts() {
    let a = alert("PodCrashLooping", "warning");
    assert!(!a.is_critical());
}
