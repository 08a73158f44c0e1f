//! Block-abstraction memoization: function bodies are analyzed once per (reduced) entry state
//! and the resulting summaries are applied at every call.
//!
//! [`BamCpa`] wraps an analysis. At a call into a block it looks for a summary in the shared
//! [`BamCache`]; when there is none it signals the missing block instead of entering the
//! callee. [`BamAlgorithm`] reacts to those signals by running the sub-analyses, possibly in
//! parallel, and resuming whoever waited for them.

mod cache;
mod coordinator;
mod dependencies;
mod reducer;

#[cfg(test)]
mod tests;

pub use cache::{BamCache, BlockSummary, CacheLookup, ReachedSetId};
pub use coordinator::{BamAlgorithm, InlineScheduler, RayonScheduler, Scheduler};
pub use dependencies::DependencyGraph;
pub use reducer::{IdentityReducer, Reducer, ValueReducer};

use crate::CpaError;
use crate::analysis::cpa::state::{AbstractState, BlockRequest, Successor, Transfer};
use crate::analysis::cpa::{
    ConfigurableProgramAnalysis, MergeOperator, PrecisionAdjustment, StopOperator,
    TransferRelation,
};
use argo_cfa::{Block, BlockPartitioning, Cfa, CfaEdge, CfaNodeId, EdgeKind};
use std::sync::Arc;
use tracing::trace;

type Cache<C> = BamCache<
    <C as ConfigurableProgramAnalysis>::State,
    <C as ConfigurableProgramAnalysis>::Precision,
>;

/// Wraps an analysis so that calls into blocks are answered from block summaries.
///
/// Return edges have no successors: a sub-analysis ends at its block exit, and callers step
/// from the call site straight to the return site using the summary.
pub struct BamCpa<C: ConfigurableProgramAnalysis, R> {
    inner: C,
    reducer: R,
    cfa: Arc<Cfa>,
    blocks: BlockPartitioning,
    cache: Arc<Cache<C>>,
}

impl<C, R> BamCpa<C, R>
where
    C: ConfigurableProgramAnalysis,
    R: Reducer<C::State, C::Precision>,
{
    /// One block per function other than main.
    pub fn new(inner: C, reducer: R, cfa: Arc<Cfa>) -> Self {
        let blocks = BlockPartitioning::by_function(&cfa);
        Self::with_blocks(inner, reducer, cfa, blocks)
    }

    pub fn with_blocks(inner: C, reducer: R, cfa: Arc<Cfa>, blocks: BlockPartitioning) -> Self {
        Self {
            inner,
            reducer,
            cfa,
            blocks,
            cache: Arc::new(BamCache::new()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn blocks(&self) -> &BlockPartitioning {
        &self.blocks
    }

    pub fn cache(&self) -> &Arc<Cache<C>> {
        &self.cache
    }

    fn enter_block(
        &self,
        state: &C::State,
        precision: &C::Precision,
        call: &CfaEdge,
        block: &Block,
        return_site: CfaNodeId,
    ) -> Result<Transfer<C::State, C::Precision>, CpaError> {
        let entries = match self
            .inner
            .transfer_relation()
            .successors_for_edge(state, precision, call)?
        {
            Transfer::Successors(s) => s,
            signal => return Ok(signal),
        };
        if entries.is_empty() {
            return Ok(Transfer::none());
        }
        let return_edge = self
            .cfa
            .leaving_edges(block.exit)
            .into_iter()
            .find(|e| {
                e.target == return_site && matches!(e.kind, EdgeKind::FunctionReturn { .. })
            })
            .ok_or_else(|| {
                CpaError::InvalidConfiguration(format!(
                    "call edge {} has no matching return edge",
                    call.id
                ))
            })?;
        let reduced_precision = self.reducer.reduce_precision(precision, block);

        let mut successors = Vec::new();
        for entry in entries {
            let reduced = self.reducer.reduce(&entry.state, block);
            let Some(summary) = self.cache.finished(block.id, &reduced, &reduced_precision) else {
                trace!(block = %block.id, function = block.function.as_str(), "no summary yet");
                return Ok(Transfer::MissingBlock(BlockRequest {
                    block: block.id,
                    function: block.function,
                    entry: reduced,
                    precision: reduced_precision,
                }));
            };
            if summary.has_target {
                return Ok(Transfer::PropertyViolation(format!(
                    "violation inside `{}`",
                    block.function.as_str()
                )));
            }
            for exit in &summary.exits {
                let expanded = self.reducer.expand(&entry.state, block, exit.clone());
                match self.inner.transfer_relation().successors_for_edge(
                    &expanded,
                    precision,
                    return_edge,
                )? {
                    Transfer::Successors(s) => successors.extend(
                        s.into_iter()
                            .map(|s| Successor::new(s.state, Some(call.id))),
                    ),
                    signal => return Ok(signal),
                }
            }
        }
        Ok(Transfer::Successors(successors))
    }
}

impl<C, R> TransferRelation<C::State, C::Precision> for BamCpa<C, R>
where
    C: ConfigurableProgramAnalysis,
    R: Reducer<C::State, C::Precision>,
{
    fn successors_for_edge(
        &self,
        state: &C::State,
        precision: &C::Precision,
        edge: &CfaEdge,
    ) -> Result<Transfer<C::State, C::Precision>, CpaError> {
        match &edge.kind {
            EdgeKind::FunctionReturn { .. } => Ok(Transfer::none()),
            EdgeKind::FunctionCall { return_site, .. } => match self.blocks.block_called_by(edge) {
                Some(block) if state.location().is_none_or(|l| l == edge.source) => {
                    self.enter_block(state, precision, edge, block, *return_site)
                }
                Some(_) => Ok(Transfer::none()),
                None => self
                    .inner
                    .transfer_relation()
                    .successors_for_edge(state, precision, edge),
            },
            _ => self
                .inner
                .transfer_relation()
                .successors_for_edge(state, precision, edge),
        }
    }
}

impl<C, R> ConfigurableProgramAnalysis for BamCpa<C, R>
where
    C: ConfigurableProgramAnalysis,
    R: Reducer<C::State, C::Precision>,
{
    type State = C::State;
    type Precision = C::Precision;

    fn transfer_relation(&self) -> &dyn TransferRelation<Self::State, Self::Precision> {
        self
    }

    fn merge_operator(&self) -> &dyn MergeOperator<Self::State, Self::Precision> {
        self.inner.merge_operator()
    }

    fn stop_operator(&self) -> &dyn StopOperator<Self::State, Self::Precision> {
        self.inner.stop_operator()
    }

    fn precision_adjustment(&self) -> &dyn PrecisionAdjustment<Self::State, Self::Precision> {
        self.inner.precision_adjustment()
    }

    fn initial_state(&self, node: CfaNodeId) -> Self::State {
        self.inner.initial_state(node)
    }

    fn initial_precision(&self, node: CfaNodeId) -> Self::Precision {
        self.inner.initial_precision(node)
    }
}
