use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{tracing, Error, LambdaEvent};

use crate::config::FailurePolicy;
use crate::copier::{CopiedObject, ObjectCopier};
use crate::error::{CopyError, CopyFailures};
use crate::task::CopyTask;

/// Outcome of every record in one invocation, in record order.
#[derive(Debug, Default)]
pub(crate) struct CopyReport {
    outcomes: Vec<Result<CopiedObject, CopyError>>,
}

impl CopyReport {
    fn push(&mut self, outcome: Result<CopiedObject, CopyError>) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn copied(&self) -> impl Iterator<Item = &CopiedObject> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().ok())
    }

    pub(crate) fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Applies the failure policy. Under `Propagate` any failure fails the
    /// invocation; under `LogOnly` failures have already been logged and are dropped.
    pub(crate) fn into_result(self, policy: FailurePolicy) -> Result<(), CopyFailures> {
        let total = self.outcomes.len();
        let mut failures = self.outcomes.into_iter().filter_map(Result::err);
        let Some(first) = failures.next() else {
            return Ok(());
        };
        match policy {
            FailurePolicy::LogOnly => Ok(()),
            FailurePolicy::Propagate => Err(CopyFailures {
                failed: 1 + failures.count(),
                total,
                first,
            }),
        }
    }
}

async fn copy_records(
    copier: &ObjectCopier,
    event: &S3Event,
    request_id: &str,
) -> Result<CopyReport, CopyError> {
    let tasks = CopyTask::from_event(event, &copier.config().destination_bucket)?;
    let mut report = CopyReport::default();
    for task in tasks {
        let outcome = match task {
            Ok(task) => copier.copy(&task).await,
            Err(e) => Err(e),
        };
        match &outcome {
            Ok(copied) => tracing::info!(
                request_id,
                key = %copied.task.key,
                destination = %copied.task.destination_bucket,
                bytes = copied.bytes,
                mode = ?copied.mode,
                "successfully copied object to destination bucket"
            ),
            Err(e) => tracing::error!(
                request_id,
                kind = %e.kind(),
                error = %e,
                "error occurred while copying object"
            ),
        }
        report.push(outcome);
    }
    Ok(report)
}

pub(crate) async fn function_handler(
    event: LambdaEvent<S3Event>,
    copier: &ObjectCopier,
) -> Result<(), Error> {
    let payload = event.payload;
    let request_id = event.context.request_id.as_str();
    tracing::debug!(request_id, records = payload.records.len(), "event received");

    let report = copy_records(copier, &payload, request_id)
        .await
        .map_err(|e| {
            tracing::error!(request_id, error = %e, "rejecting event");
            e
        })?;
    let copied_bytes: u64 = report.copied().map(|copied| copied.bytes).sum();
    tracing::info!(
        request_id,
        copied = report.copied().count(),
        total = report.total(),
        "Total size of copied objects: {:.2} MB",
        copied_bytes as f64 / 1024.0 / 1024.0
    );
    report.into_result(copier.config().failure_policy)?;
    Ok(())
}
