pub mod ast;
pub mod classify;
pub mod cleanup;
pub mod config;
pub mod deps;
pub mod error;
pub mod extract;
pub mod harness;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod printer;
pub mod rewrite;
pub mod sandbox;
pub mod trace;
pub mod visitor;

#[cfg(test)]
mod classify_tests;
#[cfg(test)]
mod cleanup_tests;
#[cfg(test)]
mod deps_tests;
#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod normalize_tests;
#[cfg(test)]
mod printer_tests;
#[cfg(test)]
mod rewrite_tests;
#[cfg(test)]
mod sandbox_tests;

use std::marker::PhantomData;

use ast::{NodeCounter, Program};
use classify::Helpers;
use cleanup::CleanupStats;
use config::Config;
use deps::Resolution;
use error::Result;
use extract::Extraction;
use harness::{EvalOutcome, EvalStatus};
use log::{info, warn};
use rewrite::RewriteStats;

// =============================================================================
// Generic ID allocation
// =============================================================================

/// Generic counter for generating unique IDs.
///
/// The ID type must implement `From<u32>` to convert the raw counter value.
#[derive(Debug, Clone)]
pub struct IdSource<Id> {
    next_id: u32,
    _phantom: PhantomData<Id>,
}

impl<Id: From<u32>> IdSource<Id> {
    pub fn new() -> Self {
        IdSource {
            next_id: 0,
            _phantom: PhantomData,
        }
    }

    pub fn next_id(&mut self) -> Id {
        let id = Id::from(self.next_id);
        self.next_id += 1;
        id
    }
}

impl<Id: From<u32>> Default for IdSource<Id> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Typestate pipeline
// =============================================================================
//
// Each struct represents a completed phase. Methods consume `self` and
// return the next stage, enforcing valid ordering:
//
//   Source::new(text)
//     .normalize(&config)        -> Normalized
//     .parse(&mut counter)?      -> Parsed
//     .classify(&config)         -> Classified
//     .extract(&config)          -> Extracted
//     .evaluate(&config)         -> Evaluated
//     .rewrite(&config, &mut c)  -> Rewritten
//     .cleanup(&config)          -> Cleaned
//     .emit()                    -> String

/// Raw source text, as read from the input.
pub struct Source {
    text: String,
}

impl Source {
    pub fn new(text: impl Into<String>) -> Self {
        Source { text: text.into() }
    }

    /// Apply the pre-parse literal normalizer.
    pub fn normalize(self, config: &Config) -> Normalized {
        let text = if config.string_reverse {
            normalize::normalize_string_reverse(&self.text)
        } else {
            self.text
        };
        Normalized { text }
    }
}

/// Source after textual normalization.
pub struct Normalized {
    pub text: String,
}

impl Normalized {
    /// Parse into a syntax tree. Parse failure is fatal.
    pub fn parse(self, counter: &mut NodeCounter) -> Result<Parsed> {
        let tokens = lexer::tokenize(&self.text).map_err(|e| crate::err_parse!("{}", e))?;
        let mut parser = parser::Parser::new(tokens, counter);
        let program = parser.parse()?;
        Ok(Parsed { program })
    }
}

/// Source has been parsed.
pub struct Parsed {
    pub program: Program,
}

impl Parsed {
    /// Identify helper definitions matching the intercept pattern.
    pub fn classify(self, config: &Config) -> Classified {
        let helpers = classify::classify(&self.program, config);
        info!("classified {} helper definition(s)", helpers.len());
        Classified {
            program: self.program,
            helpers,
        }
    }
}

/// Helper set H is known.
pub struct Classified {
    pub program: Program,
    pub helpers: Helpers,
}

impl Classified {
    /// Enumerate pure call sites and resolve the dependency closure.
    pub fn extract(self, config: &Config) -> Extracted {
        let (extraction, resolution) = if config.function_calls {
            let extraction = extract::extract(&self.program, &self.helpers, config);
            let resolution = deps::resolve(&self.helpers, &extraction);
            (extraction, resolution)
        } else {
            (Extraction::default(), Resolution::default())
        };
        Extracted {
            program: self.program,
            helpers: self.helpers,
            extraction,
            resolution,
        }
    }
}

/// Pure call set P and extracted set E are known.
pub struct Extracted {
    pub program: Program,
    pub helpers: Helpers,
    pub extraction: Extraction,
    pub resolution: Resolution,
}

impl Extracted {
    /// Assemble and run the evaluator program; collect the result map.
    pub fn evaluate(self, config: &Config) -> Evaluated {
        let outcome = harness::evaluate(&self.helpers, &self.extraction, &self.resolution, config);

        if let Some(path) = &config.debug_output_path {
            if let Err(e) = trace::write_trace(path, &outcome.call_log) {
                warn!("failed to write debug trace to {}: {}", path.display(), e);
            }
        }

        Evaluated {
            program: self.program,
            helpers: self.helpers,
            outcome,
        }
    }
}

/// Result map R has been captured.
pub struct Evaluated {
    pub program: Program,
    pub helpers: Helpers,
    pub outcome: EvalOutcome,
}

impl Evaluated {
    /// Replace rewritable call nodes with their captured results.
    pub fn rewrite(mut self, config: &Config, counter: &mut NodeCounter) -> Rewritten {
        let stats = if config.disable_replace {
            info!("replacement disabled; leaving the tree untouched");
            RewriteStats::default()
        } else {
            rewrite::rewrite(&mut self.program, &self.helpers, &self.outcome.results, config, counter)
        };
        Rewritten {
            program: self.program,
            helpers: self.helpers,
            outcome: self.outcome,
            rewrite_stats: stats,
        }
    }
}

/// The tree has been rewritten.
pub struct Rewritten {
    pub program: Program,
    pub helpers: Helpers,
    pub outcome: EvalOutcome,
    pub rewrite_stats: RewriteStats,
}

impl Rewritten {
    /// Comment out or delete provably dead helpers and initializers.
    pub fn cleanup(mut self, config: &Config) -> Cleaned {
        let cleanup_stats = cleanup::cleanup(
            &mut self.program,
            &self.helpers,
            &self.outcome.results,
            config.cleanup_mode,
        );
        Cleaned {
            program: self.program,
            outcome: self.outcome,
            rewrite_stats: self.rewrite_stats,
            cleanup_stats,
        }
    }
}

/// Final stage: ready to print.
pub struct Cleaned {
    pub program: Program,
    pub outcome: EvalOutcome,
    pub rewrite_stats: RewriteStats,
    pub cleanup_stats: CleanupStats,
}

impl Cleaned {
    pub fn emit(&self) -> String {
        printer::print_program(&self.program)
    }
}

// =============================================================================
// Convenience entry point
// =============================================================================

/// Everything a caller needs to know about one run.
pub struct RunOutput {
    /// The revised program text.
    pub source: String,
    pub eval_status: EvalStatus,
    pub call_log: Vec<harness::CallRecord>,
    pub rewrite_stats: RewriteStats,
    pub cleanup_stats: CleanupStats,
}

/// Drive the whole pipeline over `source`.
///
/// Fatal only on parse failure; sandbox failures degrade to a no-op
/// rewrite, in keeping with the shrink-only policy.
pub fn deobfuscate(source: &str, config: &Config) -> Result<RunOutput> {
    let mut counter = NodeCounter::new();

    let cleaned = Source::new(source)
        .normalize(config)
        .parse(&mut counter)?
        .classify(config)
        .extract(config)
        .evaluate(config)
        .rewrite(config, &mut counter)
        .cleanup(config);

    let source = cleaned.emit();
    Ok(RunOutput {
        source,
        eval_status: cleaned.outcome.status.clone(),
        call_log: cleaned.outcome.call_log,
        rewrite_stats: cleaned.rewrite_stats,
        cleanup_stats: cleaned.cleanup_stats,
    })
}
