use anyhow::Context;
use argo::analysis::bam::{BamAlgorithm, BamCpa, IdentityReducer, ValueReducer};
use argo::analysis::bmc::{BddFormulaManager, BmcAlgorithm};
use argo::analysis::cegar::CegarAlgorithm;
use argo::analysis::compound::CompositeCpa;
use argo::analysis::cpa::algorithm::CpaAlgorithm;
use argo::analysis::cpa::{ConfigurableProgramAnalysis, initialize};
use argo::analysis::exception::ExceptionHandlingAlgorithm;
use argo::analysis::location::LocationCpa;
use argo::analysis::parallel::{AnalysisTask, ParallelAlgorithm};
use argo::analysis::reached::ReachedSet;
use argo::analysis::statistics::StatisticsProvider;
use argo::analysis::valuation::{ValueCpa, ValueRefiner, VariablePrecision};
use argo::analysis::{Algorithm, Verdict, verify};
use argo::cfa::description::CfaDescription;
use argo::config::AnalysisConfig;
use argo::shutdown::ShutdownNotifier;
use argo::AnalysisContext;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct ArgoParams {
    #[command(subcommand)]
    pub command: Commands,
    /// Configuration file to use instead of the stored one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check whether an error location of a CFA is reachable
    Check {
        /// CFA description in JSON
        cfa: PathBuf,
        #[arg(short, long, value_enum, default_value_t = AlgorithmChoice::Cegar)]
        algorithm: AlgorithmChoice,
        /// Largest loop bound for bounded model checking
        #[arg(long)]
        bound: Option<u32>,
        /// Worker threads for the portfolio and block summaries
        #[arg(long)]
        threads: Option<usize>,
        /// Give up after this many seconds
        #[arg(long)]
        time_limit: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Print the configuration in effect
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AlgorithmChoice {
    /// Explicit-value analysis tracking every variable
    Cpa,
    /// Explicit-value analysis refining the tracked variables on demand
    Cegar,
    /// Block summaries per function, computed in parallel
    Bam,
    /// Bounded model checking with k-induction
    Bmc,
    /// Explicit-value analysis, CEGAR and bounded model checking racing each other
    Portfolio,
}

#[derive(Debug, Serialize)]
struct Report {
    verdict: Verdict,
    status: String,
    counterexample: Option<String>,
    statistics: String,
}

type Values = CompositeCpa<LocationCpa, ValueCpa>;
type ValueReached = ReachedSet<
    <Values as ConfigurableProgramAnalysis>::State,
    <Values as ConfigurableProgramAnalysis>::Precision,
>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let params = ArgoParams::parse();
    let config: AnalysisConfig = match &params.config {
        Some(path) => confy::load_path(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => confy::load("argo", None).context("reading stored configuration")?,
    };
    match params.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Check {
            cfa,
            algorithm,
            bound,
            threads,
            time_limit,
            json,
        } => {
            let mut config = config;
            if let Some(bound) = bound {
                config.bmc.max_bound = bound;
            }
            if let Some(threads) = threads {
                config.parallel.threads = threads;
                config.bam.threads = threads;
            }
            let text = std::fs::read_to_string(&cfa)
                .with_context(|| format!("reading {}", cfa.display()))?;
            let description: CfaDescription = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", cfa.display()))?;
            let mut context = AnalysisContext::new(description.build()?, config);
            if let Some(seconds) = time_limit {
                context.shutdown = ShutdownNotifier::with_time_limit(Duration::from_secs(seconds));
            }
            let report = check(&context, algorithm)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.statistics);
                if let Some(path) = &report.counterexample {
                    println!("counterexample: {path}");
                }
                println!("Verification result: {} ({})", report.verdict, report.status);
            }
            Ok(())
        }
    }
}

fn values(context: &AnalysisContext, precision: VariablePrecision) -> Arc<Values> {
    Arc::new(CompositeCpa::new(
        LocationCpa::new(context.cfa.clone()),
        ValueCpa::new().with_precision(precision),
    ))
}

fn value_cegar(
    context: &AnalysisContext,
) -> (
    ExceptionHandlingAlgorithm<CegarAlgorithm<CpaAlgorithm<Values>, ValueRefiner>>,
    ValueReached,
) {
    let cpa = values(context, VariablePrecision::default());
    let mut reached = ReachedSet::with_order(context.config.traversal, context.cfa.clone());
    initialize(&cpa, &mut reached, context.cfa.entry());
    let cegar = CegarAlgorithm::new(
        CpaAlgorithm::new(cpa, context),
        ValueRefiner::new(context.cfa.clone()),
        context.config.cegar.clone(),
    );
    (
        ExceptionHandlingAlgorithm::new(cegar, context.config.exceptions.clone()),
        reached,
    )
}

fn explicit(context: &AnalysisContext) -> (CpaAlgorithm<Values>, ValueReached) {
    let cpa = values(context, VariablePrecision::All);
    let mut reached = ReachedSet::with_order(context.config.traversal, context.cfa.clone());
    initialize(&cpa, &mut reached, context.cfa.entry());
    (CpaAlgorithm::new(cpa, context), reached)
}

fn run<A: Algorithm + StatisticsProvider>(
    mut algorithm: A,
    mut reached: ReachedSet<A::State, A::Precision>,
    counterexample: impl FnOnce(&A) -> Option<String>,
) -> anyhow::Result<Report> {
    let (verdict, status) = match verify(&mut algorithm, &mut reached) {
        Ok((verdict, status)) => (verdict, status.to_string()),
        Err(e) if e.is_benign() => {
            warn!(error = %e, "analysis stopped early");
            (Verdict::Unknown, e.to_string())
        }
        Err(e) => return Err(e.into()),
    };
    let counterexample = match verdict {
        Verdict::Unsafe => counterexample(&algorithm).or_else(|| {
            let target = reached.target_states().first().copied()?;
            reached.arg().path_to(target).ok().map(|p| p.to_string())
        }),
        _ => None,
    };
    Ok(Report {
        verdict,
        status,
        counterexample,
        statistics: algorithm.statistics().to_string(),
    })
}

fn check(context: &AnalysisContext, choice: AlgorithmChoice) -> anyhow::Result<Report> {
    match choice {
        AlgorithmChoice::Cpa => {
            let (algorithm, reached) = explicit(context);
            run(algorithm, reached, |_| None)
        }
        AlgorithmChoice::Cegar => {
            let (algorithm, reached) = value_cegar(context);
            run(algorithm, reached, |_| None)
        }
        AlgorithmChoice::Bam => {
            let inner = CompositeCpa::new(
                LocationCpa::new(context.cfa.clone()),
                ValueCpa::new().with_precision(VariablePrecision::All),
            );
            let reducer = (IdentityReducer, ValueReducer::new(&context.cfa));
            let cpa = Arc::new(BamCpa::new(inner, reducer, context.cfa.clone()));
            let mut reached = ReachedSet::with_order(context.config.traversal, context.cfa.clone());
            initialize(&cpa, &mut reached, context.cfa.entry());
            run(BamAlgorithm::new(cpa, context)?, reached, |_| None)
        }
        AlgorithmChoice::Bmc => {
            let inner = values(context, VariablePrecision::All);
            let bmc = BmcAlgorithm::new(inner, BddFormulaManager::new(), context);
            run(bmc, ReachedSet::new(), |b| {
                b.counterexample().map(|p| p.to_string())
            })
        }
        AlgorithmChoice::Portfolio => {
            let portfolio = ParallelAlgorithm::new(context)
                .with_task(AnalysisTask::from_algorithm("explicit", |c: &AnalysisContext| {
                    explicit(c)
                }))
                .with_task(AnalysisTask::from_algorithm("cegar", |c: &AnalysisContext| {
                    value_cegar(c)
                }))
                .with_task(AnalysisTask::from_algorithm("bmc", |c: &AnalysisContext| {
                    let bmc = BmcAlgorithm::new(
                        values(c, VariablePrecision::All),
                        BddFormulaManager::new(),
                        c,
                    );
                    (bmc, ReachedSet::new())
                }));
            run_portfolio(portfolio)
        }
    }
}

fn run_portfolio(mut portfolio: ParallelAlgorithm) -> anyhow::Result<Report> {
    let (verdict, status, counterexample) = match portfolio.run() {
        Ok(outcome) => {
            let verdict = outcome.verdict();
            let counterexample = match (verdict, &outcome.result) {
                (Verdict::Unsafe, Some(result)) => {
                    result.reached.counterexample().map(|p| p.to_string())
                }
                _ => None,
            };
            (verdict, outcome.status.to_string(), counterexample)
        }
        Err(e) if e.is_benign() => {
            warn!(error = %e, "portfolio stopped early");
            (Verdict::Unknown, e.to_string(), None)
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Report {
        verdict,
        status,
        counterexample,
        statistics: portfolio.statistics().to_string(),
    })
}
