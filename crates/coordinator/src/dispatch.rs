//! Scatter-gather dispatch of modality adapters.
//!
//! Both disciplines continue past a failed modality and return only the
//! successful results, in fixed modality order. Every adapter call runs in
//! its own task, so a panicking adapter costs only its own modality.

use crate::adapter::ModalityAdapter;
use sizhen_common::{DiagnosisResult, DiagnosisType, ModalityPayload, Result, SizhenError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// One selected modality, ready to run.
#[derive(Clone)]
pub struct DispatchJob {
    pub modality: DiagnosisType,
    pub adapter: Arc<dyn ModalityAdapter>,
    pub payload: ModalityPayload,
}

/// Run adapters one at a time; adapter N+1 starts after adapter N returns.
pub async fn run_sequential(
    jobs: Vec<DispatchJob>,
    user_id: &str,
    session_id: &str,
) -> Vec<DiagnosisResult> {
    let mut results = Vec::with_capacity(jobs.len());

    for job in ordered(jobs) {
        debug!(modality = %job.modality, "Running modality");
        let (modality, outcome) = run_isolated(job, user_id, session_id).await;
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => warn!(modality = %modality, error = %e, "Modality dropped"),
        }
    }

    results
}

/// Run every adapter in its own task and collect until `deadline` elapses.
///
/// Tasks still pending at the deadline are aborted and their modality dropped.
pub async fn run_parallel(
    jobs: Vec<DispatchJob>,
    user_id: &str,
    session_id: &str,
    deadline: Duration,
) -> Vec<DiagnosisResult> {
    let mut set = JoinSet::new();
    let mut pending: BTreeSet<DiagnosisType> = BTreeSet::new();

    for job in jobs {
        pending.insert(job.modality);
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        set.spawn(async move { run_isolated(job, &user_id, &session_id).await });
    }

    let mut results = Vec::with_capacity(pending.len());
    // A deadline past the clock's range means no deadline.
    let until = tokio::time::Instant::now().checked_add(deadline);

    loop {
        let next = match until {
            Some(until) => tokio::time::timeout_at(until, set.join_next()).await,
            None => Ok(set.join_next().await),
        };
        match next {
            Ok(Some(Ok((modality, outcome)))) => {
                pending.remove(&modality);
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => warn!(modality = %modality, error = %e, "Modality dropped"),
                }
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Dispatch task aborted");
            }
            Ok(None) => break,
            Err(_) => {
                for modality in &pending {
                    warn!(
                        modality = %modality,
                        deadline_ms = deadline.as_millis() as u64,
                        "Modality still pending at dispatch deadline; dropped"
                    );
                }
                set.abort_all();
                break;
            }
        }
    }

    results.sort_by_key(|r| r.diagnosis_type);
    results
}

/// Run one adapter call in a task of its own.
///
/// A panic or cancellation of that task comes back as an internal error
/// tagged with the modality, like any other adapter failure. Dropping the
/// returned future aborts the adapter task.
async fn run_isolated(
    job: DispatchJob,
    user_id: &str,
    session_id: &str,
) -> (DiagnosisType, Result<DiagnosisResult>) {
    let modality = job.modality;
    let user_id = user_id.to_string();
    let session_id = session_id.to_string();
    let handle =
        tokio::spawn(async move { job.adapter.run(&user_id, &session_id, &job.payload).await });
    let _abort = AbortOnDrop(handle.abort_handle());

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(SizhenError::Internal(format!(
            "{modality} adapter panicked"
        ))),
        Err(e) => Err(SizhenError::Internal(format!(
            "{modality} adapter task cancelled: {e}"
        ))),
    };
    (modality, outcome)
}

/// Aborts the task when the waiting future is dropped.
pub(crate) struct AbortOnDrop(pub(crate) tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn ordered(mut jobs: Vec<DispatchJob>) -> Vec<DispatchJob> {
    jobs.sort_by_key(|job| job.modality);
    jobs
}
