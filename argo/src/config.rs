use serde::{Deserialize, Serialize};

/// Order in which waiting states are explored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOrder {
    #[default]
    Bfs,
    Dfs,
    /// Topological order of locations; loop heads are explored before their bodies
    ReversePostorder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CegarOptions {
    /// Give up (imprecisely) after this many refinements
    pub max_iterations: Option<usize>,
    /// Refine whenever any target state is reached, not only a new last state
    pub global_refinement: bool,
    pub detect_repeated_counterexamples: bool,
    /// For refiners that are not sound: restart from the initial state after this many
    /// refinements. Zero disables restarts.
    pub unsound_restart_interval: usize,
}

impl Default for CegarOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            global_refinement: false,
            detect_repeated_counterexamples: true,
            unsound_restart_interval: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionHandlingOptions {
    pub continue_after_refinement_failure: bool,
    pub continue_after_unsupported_code: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelOptions {
    /// Worker threads; zero means one per available core
    pub threads: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BamOptions {
    /// Worker threads; zero means one per available core
    pub threads: usize,
    /// Run sub-analyses inline on the coordinating thread, in scheduling order
    pub deterministic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BmcOptions {
    pub initial_bound: u32,
    pub bound_step: u32,
    pub max_bound: u32,
    pub induction: bool,
}

impl Default for BmcOptions {
    fn default() -> Self {
        Self {
            initial_bound: 1,
            bound_step: 1,
            max_bound: 20,
            induction: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub traversal: TraversalOrder,
    pub cegar: CegarOptions,
    pub exceptions: ExceptionHandlingOptions,
    pub parallel: ParallelOptions,
    pub bam: BamOptions,
    pub bmc: BmcOptions,
}

/// Resolve a configured thread count, where zero means "all cores".
pub(crate) fn thread_count(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
