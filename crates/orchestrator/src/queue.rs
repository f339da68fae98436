//! Strict-FIFO question queue.
//!
//! Serializes the questions of one conversational channel through a single
//! worker task, one turn in flight at a time, so conversation memory and
//! ledger operations for an interaction are never interleaved with another
//! in-flight turn from the same channel. Separate channels run their own
//! queues and may interleave freely.

use std::sync::Arc;

use assistant_core::AnswerOutcome;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;

/// Queue depth before senders start waiting.
const QUEUE_CAPACITY: usize = 64;

/// Anything that can answer a question for a user.
#[async_trait]
pub trait QuestionHandler: Send + Sync {
    /// Answer one question for one user.
    async fn answer_question(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<AnswerOutcome, OrchestratorError>;
}

#[async_trait]
impl QuestionHandler for Orchestrator {
    async fn answer_question(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<AnswerOutcome, OrchestratorError> {
        Orchestrator::answer_question(self, user_key, text).await
    }
}

struct Job {
    user_key: String,
    text: String,
    reply: oneshot::Sender<Result<AnswerOutcome, OrchestratorError>>,
}

/// Handle to a single-concurrency worker draining questions in order.
#[derive(Clone)]
pub struct QuestionQueue {
    tx: mpsc::Sender<Job>,
}

impl QuestionQueue {
    /// Spawn the worker task over a handler.
    pub fn spawn(handler: Arc<dyn QuestionHandler>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                debug!(user_key = %job.user_key, "processing queued question");
                let result = handler.answer_question(&job.user_key, &job.text).await;
                if job.reply.send(result).is_err() {
                    warn!(user_key = %job.user_key, "question reply receiver dropped");
                }
            }
            debug!("question queue drained, worker exiting");
        });

        Self { tx }
    }

    /// Enqueue a question and wait for its turn to complete.
    pub async fn ask(
        &self,
        user_key: &str,
        text: &str,
    ) -> Result<AnswerOutcome, OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            user_key: user_key.to_string(),
            text: text.to_string(),
            reply: reply_tx,
        };

        self.tx
            .send(job)
            .await
            .map_err(|_| OrchestratorError::QueueClosed)?;

        reply_rx.await.map_err(|_| OrchestratorError::QueueClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Handler that records processing order and detects overlap.
    struct RecordingHandler {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                order: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QuestionHandler for RecordingHandler {
        async fn answer_question(
            &self,
            _user_key: &str,
            text: &str,
        ) -> Result<AnswerOutcome, OrchestratorError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(10)).await;
            self.order.lock().await.push(text.to_string());

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(AnswerOutcome::text_only(format!("respuesta a {text}")))
        }
    }

    #[tokio::test]
    async fn test_questions_processed_in_fifo_order_one_at_a_time() {
        let handler = Arc::new(RecordingHandler::new());
        let queue = QuestionQueue::spawn(handler.clone());

        let mut tasks = Vec::new();
        for i in 0..5 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                queue.ask("+34600000001", &format!("pregunta {i}")).await
            }));
            // Stagger submissions so arrival order is deterministic.
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let order = handler.order.lock().await;
        let expected: Vec<String> = (0..5).map(|i| format!("pregunta {i}")).collect();
        assert_eq!(*order, expected);
        // Never more than one turn in flight.
        assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ask_returns_handler_outcome() {
        let handler = Arc::new(RecordingHandler::new());
        let queue = QuestionQueue::spawn(handler);

        let outcome = queue.ask("+34600000001", "hola").await.unwrap();
        assert_eq!(outcome.text, "respuesta a hola");
    }
}
