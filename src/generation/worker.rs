//! The generation worker loop.
//!
//! Exactly one worker exists per queue: the model is an exclusive resource, so
//! tasks run strictly one after another in queue order.

use crate::error::ModelError;
use crate::generation::model::{GenerationModel, ModelStep};
use crate::generation::queue::{Job, QueueShared};
use crate::generation::task::{ProgressEvent, TaskOutcome};
use crate::metadata;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

pub(crate) async fn run(
    shared: Arc<QueueShared>,
    model: Arc<dyn GenerationModel>,
    application_version: String,
) {
    info!(model = model.model_name(), "Generation worker started");

    while shared.is_running() {
        let Some(job) = shared.begin_next() else {
            shared.wait_for_work().await;
            continue;
        };

        let task_id = job.request.task_id;
        let started = Instant::now();
        debug!(task_id = %task_id, "Dequeued generation task");

        // A panicking model fails its own task; the loop keeps serving the queue.
        let run = execute(&shared, model.as_ref(), &job, &application_version);
        let outcome = AssertUnwindSafe(run)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let reason = panic_reason(payload.as_ref());
                error!(task_id = %task_id, reason = %reason, "Generation model panicked");
                failed(ModelError::Generation(format!("model panicked: {}", reason)))
            });

        debug!(
            task_id = %task_id,
            status = outcome.status().as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Generation task finished"
        );
        shared.finish(task_id, outcome);
    }

    debug!("Generation worker exiting");
}

async fn execute(
    shared: &QueueShared,
    model: &dyn GenerationModel,
    job: &Job,
    application_version: &str,
) -> TaskOutcome {
    let cancelled = || job.cancel.load(Ordering::Acquire);
    if cancelled() {
        return TaskOutcome::Cancelled;
    }

    let mut steps = match model.generate(&job.request).await {
        Ok(steps) => steps,
        Err(e) => return failed(e),
    };

    while let Some(step) = steps.next().await {
        match step {
            Ok(ModelStep::Progress {
                phase,
                fraction,
                preview,
            }) => {
                shared.publish(ProgressEvent::new(
                    job.request.task_id,
                    phase,
                    fraction,
                    preview,
                ));
                if cancelled() {
                    // Dropping the stream aborts the model invocation.
                    return TaskOutcome::Cancelled;
                }
            }
            Ok(ModelStep::Completed(image)) => {
                if cancelled() {
                    return TaskOutcome::Cancelled;
                }
                let artifact = metadata::embed(
                    image,
                    &job.request.parameters,
                    job.request.preset.as_ref(),
                    application_version,
                );
                return TaskOutcome::Succeeded(artifact);
            }
            Err(e) => return failed(e),
        }
    }

    failed(ModelError::NoImage)
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn failed(error: ModelError) -> TaskOutcome {
    TaskOutcome::Failed {
        error: error.to_string(),
    }
}
