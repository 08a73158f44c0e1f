use crate::analysis::arg::StateId;
use crate::analysis::bam::cache::{BlockSummary, CacheLookup, ReachedSetId};
use crate::analysis::bam::dependencies::DependencyGraph;
use crate::analysis::bam::reducer::Reducer;
use crate::analysis::bam::BamCpa;
use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::algorithm::CpaAlgorithm;
use crate::analysis::cpa::state::BlockRequest;
use crate::analysis::reached::ReachedSet;
use crate::analysis::statistics::{StatisticsProvider, StatisticsReport};
use crate::analysis::{Algorithm, AlgorithmOutcome, AlgorithmStatus};
use crate::config::thread_count;
use crate::shutdown::ShutdownNotifier;
use crate::{AnalysisContext, CpaError};
use argo_cfa::BlockId;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use tracing::{debug, info, instrument, warn};

/// Runs sub-analysis jobs.
pub trait Scheduler: Send + Sync {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs jobs on a bounded rayon pool.
pub struct RayonScheduler {
    pool: ThreadPool,
}

impl RayonScheduler {
    pub fn new(threads: usize) -> Result<Self, CpaError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count(threads))
            .thread_name(|i| format!("bam-{i}"))
            .build()
            .map_err(|e| CpaError::ResourceExhausted(e.to_string()))?;
        Ok(Self { pool })
    }
}

impl Scheduler for RayonScheduler {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.pool.spawn(job);
    }
}

/// Runs each job to completion on the calling thread, in scheduling order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn spawn(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BamStatistics {
    runs: usize,
    sub_analyses: usize,
    scheduled: usize,
    resumed: usize,
    raced: usize,
}

struct JobDone<S, P> {
    id: ReachedSetId,
    reached: ReachedSet<S, P>,
    result: Result<AlgorithmOutcome<S, P>, CpaError>,
}

/// Bookkeeping of one [`BamAlgorithm::run`]. Only the coordinating thread touches it.
struct Coordination<S, P> {
    /// The block each reached set summarizes; `None` for the root
    blocks: BTreeMap<ReachedSetId, Option<BlockId>>,
    /// Reached sets that are neither running nor finished
    parked: BTreeMap<ReachedSetId, ReachedSet<S, P>>,
    root: Option<ReachedSet<S, P>>,
    dependencies: DependencyGraph,
    in_flight: usize,
    target_found: bool,
    status: AlgorithmStatus,
    failure: Option<CpaError>,
    cancel: ShutdownNotifier,
    sender: Sender<JobDone<S, P>>,
}

impl<S, P> Coordination<S, P> {
    fn fail(&mut self, error: CpaError) {
        warn!(%error, "block analysis failed, cancelling running sub-analyses");
        self.cancel.request_shutdown(error.to_string());
        self.failure.get_or_insert(error);
    }

    fn stopping(&self) -> bool {
        self.target_found || self.failure.is_some()
    }
}

/// Drives a [`BamCpa`]: explores the root reached set and every sub-analysis it asks for.
///
/// Each reached set is owned by exactly one party at a time: the worker exploring it, or the
/// coordinator while it waits for a block. A reached set stopping at a missing block is parked
/// and recorded as depending on the sub-analysis that computes the block. When that
/// sub-analysis finishes, its summary goes to the cache and every reached set waiting on it is
/// scheduled again, finding the summary this time.
///
/// Once any reached set contains a target state, no new sub-analyses are started. The target
/// is propagated to the waiting call states up to the root, and running sub-analyses are left
/// to finish.
pub struct BamAlgorithm<C: ConfigurableProgramAnalysis, R> {
    cpa: Arc<BamCpa<C, R>>,
    context: AnalysisContext,
    scheduler: Box<dyn Scheduler>,
    stats: BamStatistics,
}

impl<C, R> BamAlgorithm<C, R>
where
    C: ConfigurableProgramAnalysis + 'static,
    R: Reducer<C::State, C::Precision> + 'static,
{
    /// Uses the inline scheduler when the configuration asks for deterministic runs, and a
    /// rayon pool otherwise.
    pub fn new(cpa: Arc<BamCpa<C, R>>, context: &AnalysisContext) -> Result<Self, CpaError> {
        let options = &context.config.bam;
        let scheduler: Box<dyn Scheduler> = if options.deterministic {
            Box::new(InlineScheduler)
        } else {
            Box::new(RayonScheduler::new(options.threads)?)
        };
        Ok(Self::with_scheduler(cpa, context, scheduler))
    }

    pub fn with_scheduler(
        cpa: Arc<BamCpa<C, R>>,
        context: &AnalysisContext,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self {
            cpa,
            context: context.clone(),
            scheduler,
            stats: BamStatistics::default(),
        }
    }

    pub fn cpa(&self) -> &Arc<BamCpa<C, R>> {
        &self.cpa
    }

    /// Sub-analyses started over all runs.
    pub fn sub_analyses(&self) -> usize {
        self.stats.sub_analyses
    }

    fn schedule(
        &mut self,
        run: &mut Coordination<C::State, C::Precision>,
        id: ReachedSetId,
        reached: ReachedSet<C::State, C::Precision>,
    ) {
        run.in_flight += 1;
        self.stats.scheduled += 1;
        let cpa = self.cpa.clone();
        let context = AnalysisContext {
            cfa: self.context.cfa.clone(),
            config: self.context.config.clone(),
            shutdown: run.cancel.child(),
        };
        let sender = run.sender.clone();
        debug!(reached = %id, "scheduled");
        self.scheduler.spawn(Box::new(move || {
            let mut reached = reached;
            let result = CpaAlgorithm::new(cpa, &context).run(&mut reached);
            // The coordinator holds a sender itself, so it is still listening.
            let _ = sender.send(JobDone {
                id,
                reached,
                result,
            });
        }));
    }

    fn handle(
        &mut self,
        run: &mut Coordination<C::State, C::Precision>,
        done: JobDone<C::State, C::Precision>,
    ) {
        let JobDone {
            id,
            reached,
            result,
        } = done;
        match result {
            Err(error) => {
                run.parked.insert(id, reached);
                run.fail(error);
            }
            Ok(AlgorithmOutcome::MissingBlock {
                status,
                state,
                request,
            }) => {
                run.status = run.status.update(status);
                self.request_block(run, id, state, request, reached);
            }
            Ok(AlgorithmOutcome::Done(status)) => {
                run.status = run.status.update(status);
                if reached.has_waiting_state() && !reached.has_target_state() {
                    // Cut short by precision adjustment: the summary misses paths.
                    run.status = run.status.with_sound(false);
                }
                self.complete(run, id, reached);
            }
        }
    }

    fn request_block(
        &mut self,
        run: &mut Coordination<C::State, C::Precision>,
        parent: ReachedSetId,
        state: StateId,
        request: BlockRequest<C::State, C::Precision>,
        reached: ReachedSet<C::State, C::Precision>,
    ) {
        if run.failure.is_some() {
            run.parked.insert(parent, reached);
            return;
        }
        let mut callers = run.dependencies.ancestors(parent);
        callers.insert(parent);
        if callers
            .iter()
            .any(|c| run.blocks.get(c).copied().flatten() == Some(request.block))
        {
            run.parked.insert(parent, reached);
            run.fail(CpaError::Recursion(request.function.as_str().to_string()));
            return;
        }

        let BlockRequest {
            block,
            function,
            entry,
            precision,
        } = request;
        match self
            .cpa
            .cache()
            .register_or_get(block, entry.clone(), precision.clone())
        {
            CacheLookup::Finished(_) => {
                // Finished after the worker looked.
                self.stats.raced += 1;
                self.schedule(run, parent, reached);
            }
            CacheLookup::Pending(child) => {
                debug!(parent = %parent, child = %child, "waiting for running sub-analysis");
                run.dependencies.add(parent, state, child);
                run.parked.insert(parent, reached);
            }
            CacheLookup::New(child) => {
                run.blocks.insert(child, Some(block));
                run.dependencies.add(parent, state, child);
                run.parked.insert(parent, reached);
                if run.stopping() {
                    debug!(block = %block, "target found, not starting sub-analysis");
                    return;
                }
                info!(parent = %parent, child = %child, block = %block, function = function.as_str(), "sub-analysis started");
                let mut sub = ReachedSet::with_order(
                    self.context.config.traversal,
                    self.context.cfa.clone(),
                );
                sub.add_initial(entry, precision);
                self.stats.sub_analyses += 1;
                self.schedule(run, child, sub);
            }
        }
    }

    /// `id` will not be explored further: publish its summary and wake up or notify whoever
    /// waited for it.
    fn complete(
        &mut self,
        run: &mut Coordination<C::State, C::Precision>,
        id: ReachedSetId,
        reached: ReachedSet<C::State, C::Precision>,
    ) {
        let has_target = reached.has_target_state();
        if has_target && !run.target_found {
            info!(reached = %id, "target found, no further sub-analyses");
            run.target_found = true;
        }
        let block = run.blocks.get(&id).copied().flatten();
        let waiting = run.dependencies.remove_child(id);
        match block.and_then(|b| self.cpa.blocks().block(b)) {
            Some(block) => {
                let exits: Vec<_> = reached
                    .states_at(Some(block.exit))
                    .into_iter()
                    .filter_map(|s| reached.state(s).cloned())
                    .collect();
                debug!(reached = %id, block = %block.id, exits = exits.len(), has_target, "block summarized");
                self.cpa.cache().finish(id, BlockSummary { exits, has_target });
            }
            None => run.root = Some(reached),
        }

        for (parent, state) in waiting {
            let Some(mut parent_reached) = run.parked.remove(&parent) else {
                continue;
            };
            if has_target {
                let property = match block.and_then(|b| self.cpa.blocks().block(b)) {
                    Some(b) => format!("violation inside `{}`", b.function.as_str()),
                    None => "violation inside a block".to_string(),
                };
                if let Err(e) = parent_reached.mark_violation(state, property) {
                    run.parked.insert(parent, parent_reached);
                    run.fail(e.into());
                    continue;
                }
                self.complete(run, parent, parent_reached);
            } else if run.stopping() {
                run.parked.insert(parent, parent_reached);
            } else {
                self.stats.resumed += 1;
                self.schedule(run, parent, parent_reached);
            }
        }
    }
}

impl<C, R> Algorithm for BamAlgorithm<C, R>
where
    C: ConfigurableProgramAnalysis + 'static,
    R: Reducer<C::State, C::Precision> + 'static,
{
    type State = C::State;
    type Precision = C::Precision;

    #[instrument(skip_all, name = "bam")]
    fn run(
        &mut self,
        reached: &mut ReachedSet<C::State, C::Precision>,
    ) -> Result<AlgorithmOutcome<C::State, C::Precision>, CpaError> {
        self.stats.runs += 1;
        let (sender, receiver) = mpsc::channel();
        let mut run = Coordination {
            blocks: BTreeMap::from([(ReachedSetId::ROOT, None)]),
            parked: BTreeMap::new(),
            root: None,
            dependencies: DependencyGraph::new(),
            in_flight: 0,
            target_found: false,
            status: AlgorithmStatus::SOUND_AND_PRECISE,
            failure: None,
            cancel: self.context.shutdown.child(),
            sender,
        };
        self.schedule(&mut run, ReachedSetId::ROOT, std::mem::take(reached));

        while run.in_flight > 0 {
            let Ok(done) = receiver.recv() else {
                break;
            };
            run.in_flight -= 1;
            self.handle(&mut run, done);
        }

        let discarded = self.cpa.cache().discard_pending();
        if discarded > 0 {
            debug!(discarded, "dropped unfinished cache entries");
        }
        if let Some(root) = run.root.take().or_else(|| run.parked.remove(&ReachedSetId::ROOT)) {
            *reached = root;
        }
        if let Some(error) = run.failure {
            return Err(error);
        }
        info!(
            sub_analyses = self.stats.sub_analyses,
            cache_hits = self.cpa.cache().hits(),
            status = %run.status,
            "block analysis finished"
        );
        Ok(AlgorithmOutcome::Done(run.status))
    }
}

impl<C, R> StatisticsProvider for BamAlgorithm<C, R>
where
    C: ConfigurableProgramAnalysis,
    R: Reducer<C::State, C::Precision>,
{
    fn statistics(&self) -> StatisticsReport {
        StatisticsReport::new("block abstraction")
            .count("runs", self.stats.runs)
            .count("sub-analyses", self.stats.sub_analyses)
            .count("scheduled", self.stats.scheduled)
            .count("resumed", self.stats.resumed)
            .count("raced lookups", self.stats.raced)
            .count("cached summaries", self.cpa.cache().len())
            .count("cache hits", self.cpa.cache().hits())
    }
}
