use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{binding::Binding, store::BindingStore};

/// Lightweight existence check against the external platform. The Telegram
/// adapter implements this with a `get_chat` call.
#[async_trait]
pub trait ChatProbe: Send + Sync {
    async fn probe_chat(&self, chat_id: &str) -> anyhow::Result<()>;
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub checked: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Background reconciliation of binding validity.
///
/// Only ever flips the soft `is_valid` flag — bindings are never deactivated
/// or deleted here; remediation is an operator decision. All failures are
/// logged and swallowed so a validation pass can never take down the host.
pub struct BindingValidator {
    store: Arc<BindingStore>,
    probe: Arc<dyn ChatProbe>,
}

impl BindingValidator {
    pub fn new(store: Arc<BindingStore>, probe: Arc<dyn ChatProbe>) -> Self {
        Self { store, probe }
    }

    /// Probe one binding's chat and record the result. Returns whether the
    /// chat is still reachable.
    pub async fn validate_binding(&self, binding: &Binding) -> bool {
        match self.probe.probe_chat(&binding.chat_id).await {
            Ok(()) => {
                debug!(chat_id = %binding.chat_id, room_id = %binding.room_id, "binding validated");
                if let Err(e) = self.store.set_validity(&binding.chat_id, true).await {
                    warn!(chat_id = %binding.chat_id, error = %e, "failed to record validity");
                }
                true
            },
            Err(e) => {
                warn!(
                    chat_id = %binding.chat_id,
                    room_id = %binding.room_id,
                    error = %e,
                    "binding failed validation, flagging invalid"
                );
                if let Err(e) = self.store.set_validity(&binding.chat_id, false).await {
                    warn!(chat_id = %binding.chat_id, error = %e, "failed to record invalidity");
                }
                false
            },
        }
    }

    /// Validate every durable binding, active or not. One binding's failure
    /// never aborts the rest.
    pub async fn validate_all(&self) -> ValidationSummary {
        let bindings = match self.store.list_all().await {
            Ok(bindings) => bindings,
            Err(e) => {
                warn!(error = %e, "could not list bindings for validation");
                return ValidationSummary::default();
            },
        };

        let mut summary = ValidationSummary::default();
        for binding in &bindings {
            summary.checked += 1;
            if self.validate_binding(binding).await {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
            }
        }
        summary
    }

    /// Run detached: once after `startup_delay` (letting the platform
    /// connection stabilize), then on `interval` if one is configured.
    /// Cancelling the token stops the schedule; a pass already underway
    /// finishes first.
    pub fn spawn(
        self: Arc<Self>,
        startup_delay: Duration,
        interval: Option<Duration>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(startup_delay) => {},
            }

            loop {
                let summary = self.validate_all().await;
                info!(
                    checked = summary.checked,
                    valid = summary.valid,
                    invalid = summary.invalid,
                    "binding validation pass complete"
                );

                let Some(every) = interval else { return };
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(every) => {},
                }
            }
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sqlx::SqlitePool;

    use {super::*, crate::sqlite::SqliteBindingRecords};

    /// Probe that rejects chat ids present in its deny list.
    struct FakeProbe {
        unreachable: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatProbe for FakeProbe {
        async fn probe_chat(&self, chat_id: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable.iter().any(|id| id == chat_id) {
                anyhow::bail!("chat not found: {chat_id}");
            }
            Ok(())
        }
    }

    async fn test_store() -> Arc<BindingStore> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteBindingRecords::init(&pool).await.unwrap();
        Arc::new(BindingStore::new(Arc::new(SqliteBindingRecords::new(pool))))
    }

    #[tokio::test]
    async fn unreachable_chat_is_flagged_not_removed() {
        let store = test_store().await;
        store.create("123", "room-a").await.unwrap();

        let validator = BindingValidator::new(
            Arc::clone(&store),
            Arc::new(FakeProbe {
                unreachable: vec!["123".into()],
                calls: AtomicUsize::new(0),
            }),
        );

        let binding = store.get("123").await.unwrap().unwrap();
        assert!(!validator.validate_binding(&binding).await);

        let row = store.get("123").await.unwrap().unwrap();
        assert!(!row.is_valid);
        assert!(row.is_active, "invalidity must never deactivate");
        assert!(row.last_validated_at.is_some());
        // Still resolvable: outbound sends are attempted while invalid.
        assert_eq!(
            store.resolve_room("123").await.unwrap().as_deref(),
            Some("room-a")
        );
    }

    #[tokio::test]
    async fn validation_restores_validity_when_chat_returns() {
        let store = test_store().await;
        store.create("123", "room-a").await.unwrap();
        store.set_validity("123", false).await.unwrap();

        let validator = BindingValidator::new(
            Arc::clone(&store),
            Arc::new(FakeProbe {
                unreachable: vec![],
                calls: AtomicUsize::new(0),
            }),
        );
        let binding = store.get("123").await.unwrap().unwrap();
        assert!(validator.validate_binding(&binding).await);
        assert!(store.get("123").await.unwrap().unwrap().is_valid);
    }

    #[tokio::test]
    async fn validate_all_continues_past_failures() {
        let store = test_store().await;
        store.create("1", "room-a").await.unwrap();
        store.create("2", "room-b").await.unwrap();
        store.create("3", "room-c").await.unwrap();
        // Inactive bindings are still reconciled.
        store.remove("3").await.unwrap();

        let probe = Arc::new(FakeProbe {
            unreachable: vec!["2".into()],
            calls: AtomicUsize::new(0),
        });
        let validator =
            BindingValidator::new(Arc::clone(&store), Arc::clone(&probe) as Arc<dyn ChatProbe>);

        let summary = validator.validate_all().await;
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.valid, 2);
        assert_eq!(summary.invalid, 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        assert!(store.get("1").await.unwrap().unwrap().is_valid);
        assert!(!store.get("2").await.unwrap().unwrap().is_valid);
        assert!(store.get("3").await.unwrap().unwrap().is_valid);
    }

    // Real sleeps: a paused clock auto-advances past sqlx's pool acquire
    // timeout and the queries inside the pass time out.
    #[tokio::test]
    async fn spawned_schedule_stops_on_cancel() {
        let store = test_store().await;
        store.create("1", "room-a").await.unwrap();

        let probe = Arc::new(FakeProbe {
            unreachable: vec![],
            calls: AtomicUsize::new(0),
        });
        let validator = Arc::new(BindingValidator::new(
            Arc::clone(&store),
            Arc::clone(&probe) as Arc<dyn ChatProbe>,
        ));

        let cancel = CancellationToken::new();
        let handle = validator.spawn(
            Duration::from_millis(10),
            Some(Duration::from_secs(60)),
            cancel.clone(),
        );

        // Let the startup pass run, then cancel before the next interval.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }
}
