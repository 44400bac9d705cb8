use super::*;
use crate::probe::get_owner_info::encode_owner_address;

#[tokio::test]
async fn notify_is_a_no_op_without_a_configured_webhook() {
    let notifier = SlackNotifier::new(&NotifierConfig::default()).unwrap();
    let ctx = NotificationContext::new("ci-1234", Status::Failing, "status-change", None);
    assert!(notifier.notify(&ctx).await.is_ok());
}

#[test]
fn context_decodes_the_recipients_display_name_when_present() {
    let address = encode_owner_address("Alice Smith", "U999");
    let ctx = NotificationContext::new("ci-1234", Status::Stale, "ttl-expired", Some(&address));
    assert_eq!(ctx.recipient_name().as_deref(), Some("Alice Smith"));
}

#[test]
fn context_without_a_recipient_leaves_the_name_unset() {
    let ctx = NotificationContext::new("ci-1234", Status::Ok, "recovered", None);
    assert!(ctx.recipient_name().is_none());
}
