//! Bulk receipt dispatch: fan out over validated recipients with a hard
//! concurrency cap, isolating per-recipient failures.
//!
//! The whole batch aborts only when the CSV itself is invalid. Once
//! recipients are validated, each one runs to its own outcome; a recipient
//! whose receipt cannot be assembled or rendered never blocks the others.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use paperslip_core::Email;

use crate::receipt::csv::{CsvError, parse_recipients};
use crate::receipt::document::{AssembleError, ReceiptStore, build_receipt};
use crate::receipt::render::{ReceiptRenderer, RenderError};
use crate::services::Mailer;

/// Upper bound on recipients processed at once.
pub const MAX_CONCURRENT_DISPATCHES: usize = 5;

/// Why one recipient's dispatch failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Receipt assembly failed; carries the original lookup message.
    #[error("{0}")]
    Assemble(#[from] AssembleError),

    /// PDF conversion failed.
    #[error("{0}")]
    Render(#[from] RenderError),

    /// The worker task itself failed rather than the work it ran.
    #[error("receipt worker failed: {0}")]
    Worker(String),
}

/// Per-recipient result, in the order the CSV listed them.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub email: Email,
    pub success: bool,
    /// Failure reason, present iff `success` is false.
    pub error: Option<String>,
}

/// Orchestrates validate → assemble → render → send for a whole upload.
pub struct Dispatcher<S, R, M> {
    store: Arc<S>,
    renderer: Arc<R>,
    mailer: Arc<M>,
    permits: Arc<Semaphore>,
}

impl<S, R, M> Dispatcher<S, R, M>
where
    S: ReceiptStore + 'static,
    R: ReceiptRenderer + 'static,
    M: Mailer + 'static,
{
    /// Create a dispatcher over the given pipeline stages.
    ///
    /// The concurrency cap is held by the dispatcher, so overlapping
    /// uploads share the same [`MAX_CONCURRENT_DISPATCHES`] budget.
    pub fn new(store: S, renderer: R, mailer: M) -> Self {
        Self {
            store: Arc::new(store),
            renderer: Arc::new(renderer),
            mailer: Arc::new(mailer),
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_DISPATCHES)),
        }
    }

    /// Dispatch receipts for every recipient in the uploaded CSV.
    ///
    /// Outcomes come back in CSV row order, one per recipient, and the
    /// call waits for every recipient to finish. Per-recipient failures
    /// are recorded in their outcome, never propagated.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError`] when the upload fails validation; nothing is
    /// dispatched in that case.
    pub async fn dispatch(&self, raw_csv: &[u8]) -> Result<Vec<DispatchOutcome>, CsvError> {
        let recipients = parse_recipients(raw_csv)?;

        let handles: Vec<(Email, JoinHandle<Result<(), DispatchError>>)> = recipients
            .into_iter()
            .map(|email| {
                let task = self.spawn_recipient(email.clone());
                (email, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (email, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    Err(DispatchError::Worker("worker panicked".to_string()))
                }
                Err(_) => Err(DispatchError::Worker("worker cancelled".to_string())),
            };

            outcomes.push(match result {
                Ok(()) => DispatchOutcome {
                    email,
                    success: true,
                    error: None,
                },
                Err(error) => DispatchOutcome {
                    email,
                    success: false,
                    error: Some(error.to_string()),
                },
            });
        }

        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|outcome| !outcome.success)
            .map(|outcome| outcome.email.as_str())
            .collect();
        if !failed.is_empty() {
            tracing::error!(
                failed = failed.join(", "),
                count = failed.len(),
                "failed to generate receipts for some recipients"
            );
        }

        Ok(outcomes)
    }

    fn spawn_recipient(&self, email: Email) -> JoinHandle<Result<(), DispatchError>> {
        let store = Arc::clone(&self.store);
        let renderer = Arc::clone(&self.renderer);
        let mailer = Arc::clone(&self.mailer);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::Worker("dispatch queue closed".to_string()))?;

            let document = build_receipt(store.as_ref(), &email).await?;
            let pdf = renderer.render(&document.html).await?;
            // Delivery failures are absorbed inside the mailer.
            mailer.send_receipt(&email, pdf).await;
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use paperslip_core::{ProductId, PurchaseId, UserId, Yen};

    use crate::db::RepositoryError;
    use crate::models::{Product, Purchase, User};

    use super::*;

    /// In-memory pipeline stages with instrumentation for the tests.
    #[derive(Default)]
    struct StubStore {
        users: HashMap<String, User>,
        purchases: HashMap<i32, Vec<Purchase>>,
        products: HashMap<i32, Product>,
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
    }

    impl StubStore {
        fn with_recipient(mut self, id: i32, email: &str) -> Self {
            self.users.insert(
                email.to_string(),
                User {
                    id: UserId::new(id),
                    name: format!("user {id}"),
                    email: Email::parse(email).unwrap(),
                },
            );
            self.products.entry(1).or_insert_with(|| Product {
                id: ProductId::new(1),
                name: "ワイヤレスマウス".to_string(),
                price: Yen::new(2500),
                description: String::new(),
            });
            self.purchases.entry(id).or_default().push(Purchase {
                id: PurchaseId::new(id),
                user_id: UserId::new(id),
                product_id: ProductId::new(1),
                quantity: 1,
                total_price: Yen::new(2500),
                purchased_at: Utc::now(),
            });
            self
        }
    }

    #[async_trait]
    impl ReceiptStore for StubStore {
        async fn find_user_by_email(
            &self,
            email: &Email,
        ) -> Result<Option<User>, RepositoryError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.users.get(email.as_str()).cloned())
        }

        async fn find_purchases_by_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<Purchase>, RepositoryError> {
            Ok(self
                .purchases
                .get(&user_id.as_i32())
                .cloned()
                .unwrap_or_default())
        }

        async fn find_product(
            &self,
            product_id: ProductId,
        ) -> Result<Option<Product>, RepositoryError> {
            Ok(self.products.get(&product_id.as_i32()).cloned())
        }
    }

    struct StubRenderer {
        fail: bool,
    }

    #[async_trait]
    impl ReceiptRenderer for StubRenderer {
        async fn render(&self, _html: &str) -> Result<Vec<u8>, RenderError> {
            if self.fail {
                Err(RenderError::Timeout(Duration::from_secs(6)))
            } else {
                Ok(b"%PDF-1.4".to_vec())
            }
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_receipt(&self, to: &Email, _pdf: Vec<u8>) {
            self.sent.lock().unwrap().push(to.as_str().to_string());
        }
    }

    fn csv_for(count: usize) -> Vec<u8> {
        let mut csv = b"email\n".to_vec();
        for i in 1..=count {
            csv.extend_from_slice(format!("user{i}@example.com\n").as_bytes());
        }
        csv
    }

    fn store_for(count: usize) -> StubStore {
        let mut store = StubStore::default();
        for i in 1..=count {
            store = store.with_recipient(
                i32::try_from(i).unwrap(),
                &format!("user{i}@example.com"),
            );
        }
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_cap() {
        let dispatcher = Dispatcher::new(
            store_for(12),
            StubRenderer { fail: false },
            RecordingMailer::default(),
        );

        let outcomes = dispatcher.dispatch(&csv_for(12)).await.unwrap();

        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.iter().all(|outcome| outcome.success));
        assert_eq!(
            dispatcher.store.high_water.load(Ordering::SeqCst),
            MAX_CONCURRENT_DISPATCHES
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_recipient_does_not_block_others() {
        // Row 2 has no user behind it.
        let store = store_for(3);
        let csv = b"email\nuser1@example.com\nghost@example.com\nuser3@example.com\n";
        let dispatcher = Dispatcher::new(
            store,
            StubRenderer { fail: false },
            RecordingMailer::default(),
        );

        let outcomes = dispatcher.dispatch(csv).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].error.as_deref(), Some("User not Found"));
        assert!(outcomes[2].success);

        let sent = dispatcher.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&"user1@example.com".to_string()));
        assert!(sent.contains(&"user3@example.com".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_preserve_csv_order() {
        let dispatcher = Dispatcher::new(
            store_for(6),
            StubRenderer { fail: false },
            RecordingMailer::default(),
        );

        let outcomes = dispatcher.dispatch(&csv_for(6)).await.unwrap();

        let emails: Vec<&str> = outcomes
            .iter()
            .map(|outcome| outcome.email.as_str())
            .collect();
        assert_eq!(
            emails,
            vec![
                "user1@example.com",
                "user2@example.com",
                "user3@example.com",
                "user4@example.com",
                "user5@example.com",
                "user6@example.com",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failure_is_isolated_and_unsent() {
        let dispatcher = Dispatcher::new(
            store_for(2),
            StubRenderer { fail: true },
            RecordingMailer::default(),
        );

        let outcomes = dispatcher.dispatch(&csv_for(2)).await.unwrap();

        assert!(outcomes.iter().all(|outcome| !outcome.success));
        assert!(
            outcomes[0]
                .error
                .as_deref()
                .unwrap()
                .contains("timed out")
        );
        assert!(dispatcher.mailer.sent.lock().unwrap().is_empty());
    }

    /// A mailer whose transport always fails still absorbs the failure,
    /// so the recipient's outcome reports success.
    struct BrokenMailer {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send_receipt(&self, _to: &Email, _pdf: Vec<u8>) {
            // Simulates a delivery that failed and was logged internally.
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_does_not_fail_outcome() {
        let dispatcher = Dispatcher::new(
            store_for(2),
            StubRenderer { fail: false },
            BrokenMailer {
                attempts: AtomicUsize::new(0),
            },
        );

        let outcomes = dispatcher.dispatch(&csv_for(2)).await.unwrap();

        assert!(outcomes.iter().all(|outcome| outcome.success));
        assert_eq!(dispatcher.mailer.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_csv_dispatches_nothing() {
        let dispatcher = Dispatcher::new(
            store_for(2),
            StubRenderer { fail: false },
            RecordingMailer::default(),
        );

        let csv = b"email\nuser1@example.com\nuser1@example.com\n";
        let result = dispatcher.dispatch(csv).await;

        assert!(matches!(result, Err(CsvError::Duplicate(_))));
        assert!(dispatcher.mailer.sent.lock().unwrap().is_empty());
    }
}
