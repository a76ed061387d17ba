//! **Symbolic spending-condition analysis for Bitcoin scripts.**
//!
//! Given a script, this crate walks every reachable control-flow path with a
//! dual interpreter: stack elements are either concrete byte strings or
//! symbolic expressions over the witness elements a spender will provide.
//! Each conditional opcode forks the analyzer; each path accumulates the
//! predicates that must hold for the script to accept; a simplifier removes
//! redundancies and kills contradictory paths. The result is a disjunction
//! (one disjunct per surviving path) of conjunctions of predicates.
//!
//! ## Example
//!
//! ```rust
//! use bitcoin::opcodes::all::*;
//! use bitcoin::script::Builder;
//! use spendpath::{analyze_script, ScriptRules, ScriptVersion};
//!
//! // A plain P2PKH output script, analyzed against an empty stack.
//! let script = Builder::new()
//!     .push_opcode(OP_DUP)
//!     .push_opcode(OP_HASH160)
//!     .push_slice([0x11; 20])
//!     .push_opcode(OP_EQUALVERIFY)
//!     .push_opcode(OP_CHECKSIG)
//!     .into_script();
//!
//! let analysis = analyze_script(&script, ScriptVersion::Legacy, ScriptRules::All).unwrap();
//! assert_eq!(
//!     analysis.to_string(),
//!     "(HASH160(<input1>) == <1111111111111111111111111111111111111111>) \
//!      && CHECKSIG(<input0>, <input1>)",
//! );
//! ```
//!
//! `<input0>` is the first element the spender pushes; a path's inputs are
//! exactly its minimal witness. Paths that abort (OP_RETURN, unbalanced
//! conditionals, failed constant verifies, ...) are reported per path and do
//! not contribute a disjunct.

use core::fmt;

use bitcoin::script::Script;

mod analyzer;
mod cond_stack;
mod error;
mod expr;
mod opcode;
mod script;
mod scriptnum;
mod simplify;

pub use analyzer::{
    PathError, PathRecord, ScriptAnalyzer, ScriptRules, ScriptVersion, MAX_PUBKEYS_PER_MULTISIG,
    MAX_STACK_SIZE,
};
pub use error::{AnalysisError, ScriptError};
pub use expr::{App, Expr, ExprOp};
pub use script::{items, ScriptItem};
pub use simplify::simplify_conditions;

/// The result of analyzing one script: surviving spending paths plus the
/// paths that aborted, both in depth-first discovery order.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Satisfiable paths with simplified conditions.
    pub paths: Vec<SpendingPath>,
    /// Paths that ended in an error, with the stack at the point of failure.
    pub failures: Vec<PathFailure>,
}

/// One satisfiable way of spending the analyzed output.
#[derive(Debug, Clone)]
pub struct SpendingPath {
    /// Discovery-order id of the path (stable across runs).
    pub id: usize,
    /// Conjunction of predicates the witness must satisfy. Empty means the
    /// path accepts unconditionally.
    pub conditions: Vec<Expr>,
    /// Minimal number of witness elements this path consumes.
    pub witness_len: u32,
}

/// A path that aborted before reaching the final stack check.
#[derive(Debug, Clone)]
pub struct PathFailure {
    pub id: usize,
    pub error: ScriptError,
    /// Bottom-to-top stack snapshot at the point of failure.
    pub stack: Vec<Expr>,
}

impl fmt::Display for Analysis {
    /// Renders the per-path diagnostics followed by the disjunction of
    /// spending conditions. An empty disjunction prints `false`; a path with
    /// no remaining conditions prints `true`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in &self.failures {
            write!(f, "path {} failed: {} (stack: [", failure.id, failure.error)?;
            for (i, e) in failure.stack.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{e}")?;
            }
            writeln!(f, "])")?;
        }
        if self.paths.is_empty() {
            return f.write_str("false");
        }
        for (i, path) in self.paths.iter().enumerate() {
            if i > 0 {
                f.write_str(" ||\n")?;
            }
            if path.conditions.is_empty() {
                f.write_str("true")?;
            } else {
                for (j, cond) in path.conditions.iter().enumerate() {
                    if j > 0 {
                        f.write_str(" && ")?;
                    }
                    write!(f, "{cond}")?;
                }
            }
        }
        Ok(())
    }
}

/// Analyzes an item sequence.
///
/// A script containing a disabled opcode anywhere is rejected up front; it
/// can never be spent, executed arm or not.
pub fn analyze(
    items: &[ScriptItem],
    version: ScriptVersion,
    rules: ScriptRules,
) -> Result<Analysis, ScriptError> {
    for item in items {
        if let ScriptItem::Op(op) = item {
            if opcode::is_disabled(*op) {
                return Err(ScriptError::DisabledOpcode);
            }
        }
    }

    let mut records = Vec::new();
    ScriptAnalyzer::new(items, version, rules).run(&mut records);

    let mut paths = Vec::new();
    let mut failures = Vec::new();
    for record in records {
        let PathRecord {
            id,
            conditions,
            witness_len,
            error,
        } = record;
        match error {
            Some(err) => failures.push(PathFailure {
                id,
                error: err.kind,
                stack: err.stack,
            }),
            None => {
                if let Some(conditions) = simplify_conditions(conditions) {
                    paths.push(SpendingPath {
                        id,
                        conditions,
                        witness_len,
                    });
                }
            }
        }
    }
    Ok(Analysis { paths, failures })
}

/// Parses a serialized script and analyzes it.
pub fn analyze_script(
    script: &Script,
    version: ScriptVersion,
    rules: ScriptRules,
) -> Result<Analysis, AnalysisError> {
    let items = script::items(script)?;
    Ok(analyze(&items, version, rules)?)
}
