//! Terminal transition once a batch is finished.

use crate::orchestrator::BatchReport;
use tracing::info;

/// Invoked exactly once per batch, after the completion delay.
///
/// Fire-and-forget: the orchestrator ignores anything the notifier does.
pub trait CompletionNotifier: Send + Sync {
    fn on_batch_done(&self, report: &BatchReport);
}

/// Logs a one-line batch summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn on_batch_done(&self, report: &BatchReport) {
        info!(
            "Batch done: {}/{} résumés analysed, {} skipped, {}ms",
            report.completed_count(),
            report.total,
            report.skipped.len(),
            report.duration_ms
        );
    }
}

/// Adapts a closure into a notifier.
pub struct FnNotifier<F>(pub F);

impl<F> CompletionNotifier for FnNotifier<F>
where
    F: Fn(&BatchReport) + Send + Sync,
{
    fn on_batch_done(&self, report: &BatchReport) {
        (self.0)(report)
    }
}
