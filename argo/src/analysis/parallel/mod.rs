//! Portfolio verification: several analyses race on the same program.

mod task;

pub use task::{AnalysisTask, FinishedAnalysis, TaskResult};

use crate::analysis::reached::AggregatedReachedSets;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::{AlgorithmStatus, Verdict};
use crate::config::thread_count;
use crate::{AnalysisContext, CpaError};
use rayon::ThreadPoolBuilder;
use std::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Default)]
struct PortfolioStatistics {
    started: usize,
    inconclusive: usize,
    ignored_failures: usize,
    winner: Option<String>,
}

/// How a portfolio ended.
#[derive(Debug)]
pub struct PortfolioOutcome {
    pub status: AlgorithmStatus,
    /// The winning member's result, absent if no member was conclusive.
    pub result: Option<TaskResult>,
}

impl PortfolioOutcome {
    pub fn verdict(&self) -> Verdict {
        self.result
            .as_ref()
            .map_or(Verdict::Unknown, TaskResult::verdict)
    }
}

/// Runs a set of analyses side by side on a bounded thread pool. Members are free to use
/// different abstract domains.
///
/// The first analysis to come back with a conclusive result wins: every other analysis is asked
/// to shut down and whatever it computed is dropped. Analyses failing for benign reasons
/// (interruption, resource limits, recursion) are ignored. Any other failure cancels the whole
/// portfolio and is returned once every member has stopped.
pub struct ParallelAlgorithm {
    context: AnalysisContext,
    tasks: Vec<AnalysisTask>,
    aggregated: Option<AggregatedReachedSets>,
    stats: PortfolioStatistics,
}

impl ParallelAlgorithm {
    pub fn new(context: &AnalysisContext) -> Self {
        Self {
            context: context.clone(),
            tasks: Vec::new(),
            aggregated: None,
            stats: PortfolioStatistics::default(),
        }
    }

    pub fn with_task(mut self, task: AnalysisTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn add_task(&mut self, task: AnalysisTask) {
        self.tasks.push(task);
    }

    /// Publish the summary of every member's result under the member's name.
    pub fn with_aggregation(mut self, sets: AggregatedReachedSets) -> Self {
        self.aggregated = Some(sets);
        self
    }

    pub fn winner(&self) -> Option<&str> {
        self.stats.winner.as_deref()
    }

    /// Race every added task. The tasks are consumed; a second run without new tasks is a
    /// configuration error.
    #[instrument(skip_all, name = "portfolio")]
    pub fn run(&mut self) -> Result<PortfolioOutcome, CpaError> {
        let tasks = std::mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return Err(CpaError::InvalidConfiguration(
                "a portfolio needs at least one analysis".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count(self.context.config.parallel.threads))
            .thread_name(|i| format!("portfolio-{i}"))
            .build()
            .map_err(|e| CpaError::ResourceExhausted(e.to_string()))?;

        // Cancelling the portfolio must not cancel whoever runs it.
        let cancel = self.context.shutdown.child();
        let (sender, receiver) = mpsc::channel();
        for task in tasks {
            let sender = sender.clone();
            let context = AnalysisContext {
                cfa: self.context.cfa.clone(),
                config: self.context.config.clone(),
                shutdown: cancel.child(),
            };
            self.stats.started += 1;
            pool.spawn(move || {
                info!(task = task.name, "analysis started");
                let result = (task.job)(context);
                // The receiver only goes away once every sender has reported.
                let _ = sender.send((task.name, result));
            });
        }
        drop(sender);

        let mut winner: Option<(String, TaskResult)> = None;
        let mut failure = None;
        for (name, result) in receiver {
            match result {
                Ok(result) => {
                    if let Some(sets) = &self.aggregated {
                        sets.publish(name.clone(), result.reached.summary(), result.status);
                    }
                    if winner.is_none() && failure.is_none() && result.is_conclusive() {
                        info!(task = name, status = %result.status, "analysis won the portfolio");
                        cancel.request_shutdown(format!("{name} finished first"));
                        winner = Some((name, result));
                    } else {
                        self.stats.inconclusive += 1;
                        debug!(task = name, status = %result.status, "result discarded");
                    }
                }
                Err(e) if e.is_benign() => {
                    self.stats.ignored_failures += 1;
                    warn!(task = name, error = %e, "analysis stopped");
                }
                Err(e) => {
                    error!(task = name, error = %e, "analysis failed, cancelling the portfolio");
                    cancel.request_shutdown(format!("{name} failed"));
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        match winner {
            Some((name, result)) => {
                self.stats.winner = Some(name);
                Ok(PortfolioOutcome {
                    status: result.status,
                    result: Some(result),
                })
            }
            None => {
                info!("no analysis produced a conclusive result");
                Ok(PortfolioOutcome {
                    status: AlgorithmStatus::UNSOUND_AND_IMPRECISE,
                    result: None,
                })
            }
        }
    }
}

impl StatisticsProvider for ParallelAlgorithm {
    fn statistics(&self) -> StatisticsReport {
        let report = StatisticsReport::new("portfolio")
            .count("analyses", self.stats.started)
            .count("inconclusive", self.stats.inconclusive)
            .count("ignored failures", self.stats.ignored_failures);
        match &self.stats.winner {
            Some(winner) => report.text("winner", winner),
            None => report,
        }
    }
}
