//! One-shot list administration helpers.

use tracing::warn;

use super::{ListMode, ListService};
use crate::constants::NOTIFICATION_SOURCE;
use crate::errors::ListError;
use crate::notify::NotificationSink;

/// Create a remote list and report the outcome to the operator.
///
/// A single request is issued; failures are reported once and never retried.
/// The result is returned so interactive callers can react to it, but the
/// notification has already been emitted either way.
pub async fn create_list(
    lists: &dyn ListService,
    notifier: &dyn NotificationSink,
    name: &str,
    mode: ListMode,
) -> Result<(), ListError> {
    let name = name.trim();
    if name.is_empty() {
        let err = ListError::MissingListName;
        notifier.notify(NOTIFICATION_SOURCE, &err.to_string());
        return Err(err);
    }

    match lists.create_list(name, mode).await {
        Ok(()) => {
            notifier.notify(
                NOTIFICATION_SOURCE,
                &format!("Created list {} ({})", name, mode),
            );
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, list.name = %name, "List creation failed");
            notifier.notify(NOTIFICATION_SOURCE, &e.to_string());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ListCall, RecordingNotificationSink, ScriptedListService};

    #[tokio::test]
    async fn test_create_list_success_notifies() {
        let lists = ScriptedListService::new();
        let sink = RecordingNotificationSink::new();

        create_list(&lists, &sink, "bots", ListMode::Private)
            .await
            .unwrap();

        assert_eq!(
            lists.calls(),
            vec![ListCall::CreateList("bots".to_string(), ListMode::Private)]
        );
        assert_eq!(sink.messages(), vec!["Created list bots (private)".to_string()]);
    }

    #[tokio::test]
    async fn test_create_list_failure_is_reported_once() {
        let lists = ScriptedListService::new();
        lists.fail_create_list(500);
        let sink = RecordingNotificationSink::new();

        let result = create_list(&lists, &sink, "bots", ListMode::Public).await;

        assert!(result.is_err());
        assert_eq!(lists.calls().len(), 1);
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("error-autolists-list-2"));
    }

    #[tokio::test]
    async fn test_create_list_requires_name() {
        let lists = ScriptedListService::new();
        let sink = RecordingNotificationSink::new();

        let result = create_list(&lists, &sink, "  ", ListMode::Public).await;

        assert!(matches!(result, Err(ListError::MissingListName)));
        assert!(lists.calls().is_empty());
        assert_eq!(sink.messages().len(), 1);
    }
}
