//! Batch driver: runs every discovered pair through the merger
//!
//! Each pair moves `Pending -> Validating -> Merging` and ends either
//! `Succeeded` or `Failed`. A failure never stops the batch.

use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info_span};

use crate::{
    error::{Error, ErrorKind},
    locator::{Pairs, PhotoVideoPair, SkippedGroup},
    logging::Verbosity,
    merger::{MergedFile, Merger},
    metadata::{MetadataAccessor, XmpMetadata},
};

/// Settings for a batch run
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchConfig {
    pub verbosity: Verbosity,
}

/// Processing state of one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairState {
    Pending,
    Validating,
    Merging,
    Succeeded(MergedFile),
    Failed { kind: ErrorKind, detail: String },
}

impl PairState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Merging => "merging",
            Self::Succeeded(_) => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    fn failed(err: &Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

/// Final state of one pair
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub pair: PhotoVideoPair,
    pub state: PairState,
}

/// Everything a batch run produced, in processing order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    outcomes: Vec<PairOutcome>,
    skipped: Vec<SkippedGroup>,
    verbosity: Verbosity,
}

impl BatchReport {
    pub fn outcomes(&self) -> &[PairOutcome] {
        &self.outcomes
    }

    /// Groups the locator couldn't turn into pairs
    pub fn skipped(&self) -> &[SkippedGroup] {
        &self.skipped
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.state.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// At least one pair merged
    pub fn is_success(&self) -> bool {
        self.succeeded() > 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Merged {} of {} pair(s), {} failed, {} group(s) skipped",
            self.succeeded(),
            self.outcomes.len(),
            self.failed(),
            self.skipped.len()
        )?;

        for outcome in &self.outcomes {
            match &outcome.state {
                PairState::Succeeded(merged) if self.verbosity == Verbosity::Verbose => {
                    writeln!(
                        f,
                        "  ok      {} (video offset {})",
                        merged.path.display(),
                        merged.offset
                    )?;
                }
                PairState::Failed { kind, detail } => {
                    writeln!(f, "  failed  {} [{}]: {}", outcome.pair, kind, detail)?;
                }
                _ => {}
            }
        }

        for group in &self.skipped {
            writeln!(f, "  skipped {}", group)?;
        }
        Ok(())
    }
}

/// Sequential driver over a [`Merger`]
#[derive(Debug)]
pub struct Batch<M = XmpMetadata> {
    merger: Merger<M>,
    config: BatchConfig,
}

impl<M: MetadataAccessor> Batch<M> {
    pub fn new(merger: Merger<M>, config: BatchConfig) -> Self {
        Self { merger, config }
    }

    /// Process every pair, collecting outcomes in order
    pub fn run(&self, mut pairs: Pairs) -> BatchReport {
        let pending: Vec<_> = pairs.by_ref().collect();
        let inputs: HashSet<PathBuf> = pending
            .iter()
            .flat_map(|pair| [canonical(pair.photo()), canonical(pair.video())])
            .collect();
        let mut produced = HashSet::new();
        let mut outcomes = Vec::new();

        for pair in pending {
            let span = info_span!("pair", photo = %pair.photo().display());
            let _enter = span.enter();

            let state = self.process(&pair, &inputs, &mut produced);
            if let PairState::Failed { kind, detail } = &state {
                error!(pair = %pair, kind = %kind, "{}", detail);
            }
            outcomes.push(PairOutcome { pair, state });
        }

        BatchReport {
            outcomes,
            skipped: pairs.into_skipped(),
            verbosity: self.config.verbosity,
        }
    }

    fn process(
        &self,
        pair: &PhotoVideoPair,
        inputs: &HashSet<PathBuf>,
        produced: &mut HashSet<PathBuf>,
    ) -> PairState {
        let mut state = PairState::Pending;
        advance(&mut state, PairState::Validating);

        if let Err(err) = self.validate(pair, inputs, produced) {
            advance(&mut state, PairState::failed(&err));
            return state;
        }

        advance(&mut state, PairState::Merging);
        let next = match self.merger.merge(pair) {
            Ok(merged) => {
                produced.insert(canonical(&merged.path));
                PairState::Succeeded(merged)
            }
            Err(err) => PairState::failed(&err),
        };
        advance(&mut state, next);
        state
    }

    /// Re-check the pair and make sure its output neither overwrites another
    /// pair's input nor an output written earlier in this run
    fn validate(
        &self,
        pair: &PhotoVideoPair,
        inputs: &HashSet<PathBuf>,
        produced: &HashSet<PathBuf>,
    ) -> crate::Result<()> {
        pair.validate()?;
        let output = canonical(&self.merger.output_path(pair)?);
        if output != canonical(pair.photo()) && inputs.contains(&output) {
            return Err(Error::InvalidInput(format!(
                "{} is an input of another pair in this run",
                output.display()
            )));
        }
        if produced.contains(&output) {
            return Err(Error::InvalidInput(format!(
                "{} was already written by an earlier pair in this run",
                output.display()
            )));
        }
        Ok(())
    }
}

/// Resolved form of `path`, or `path` itself when it doesn't exist yet
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn advance(state: &mut PairState, next: PairState) {
    debug!(from = state.name(), to = next.name(), "state");
    *state = next;
}
