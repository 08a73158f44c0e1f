use crate::config::AnalysisConfig;
use crate::shutdown::ShutdownNotifier;
use argo_cfa::Cfa;
use std::sync::Arc;

/// Everything an analysis needs besides its CPA: the program, its configuration and a
/// cancellation handle. Passed down explicitly; analyses never reach for global state.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub cfa: Arc<Cfa>,
    pub config: AnalysisConfig,
    pub shutdown: ShutdownNotifier,
}

impl AnalysisContext {
    pub fn new(cfa: Cfa, config: AnalysisConfig) -> Self {
        Self {
            cfa: Arc::new(cfa),
            config,
            shutdown: ShutdownNotifier::new(),
        }
    }

    /// A context for a nested analysis: same program and configuration, with a shutdown handle
    /// that can be cancelled without affecting this one.
    pub fn fork(&self) -> Self {
        Self {
            cfa: self.cfa.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.child(),
        }
    }
}
