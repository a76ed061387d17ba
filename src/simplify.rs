//! Normalization of a path's collected spending conditions.
//!
//! Order matters: sorting makes dedup a linear scan, dedup collapses aliases
//! before the contradiction check, and partial evaluation runs last so any
//! concrete value it produces is re-examined until the list stops changing.

use bitcoin::opcodes::all::{OP_CHECKSIG, OP_EQUAL, OP_NOT};

use crate::expr::{Expr, ExprOp};
use crate::opcode;
use crate::scriptnum::{bool_not, encode_bool, FALSE};

/// Simplifies one path's conjunct list.
///
/// Returns `None` when the path is unsatisfiable (a predicate evaluated to
/// false, or the list contains both a predicate and its negation). An empty
/// list means the path is spendable unconditionally.
pub fn simplify_conditions(mut conds: Vec<Expr>) -> Option<Vec<Expr>> {
    for c in &mut conds {
        normalize(c);
    }
    conds.sort();
    conds.dedup();

    // p together with !p can never hold.
    for p in &conds {
        for q in &conds {
            if p.is_negation_of(q) {
                return None;
            }
        }
    }

    let mut i = 0;
    while i < conds.len() {
        match evaluate(&conds[i]) {
            Step::Keep => i += 1,
            Step::Satisfied => {
                conds.remove(i);
            }
            Step::Unsatisfiable => return None,
            Step::Replace(e) => {
                // Re-examine the rewritten predicate in place.
                conds[i] = e;
            }
        }
    }
    Some(conds)
}

/// Sorts the arguments of order-insensitive applications, recursively, so
/// that structurally equal-up-to-commutativity predicates compare equal.
fn normalize(e: &mut Expr) {
    if let Expr::App(app) = e {
        let reorder = match app.op {
            ExprOp::Not => true,
            ExprOp::Op(op) => opcode::can_reorder_args(op),
        };
        if reorder {
            for arg in &mut app.args {
                normalize(arg);
            }
            app.args.sort();
        }
    }
}

enum Step {
    Keep,
    Satisfied,
    Unsatisfiable,
    Replace(Expr),
}

fn evaluate(e: &Expr) -> Step {
    if let Some(truthy) = e.truth() {
        return if truthy {
            Step::Satisfied
        } else {
            Step::Unsatisfiable
        };
    }
    let Expr::App(app) = e else {
        // A bare witness variable just has to be truthy.
        return Step::Keep;
    };
    match app.op {
        ExprOp::Op(OP_EQUAL) if app.args.len() == 2 => {
            if let (Expr::Bytes(a), Expr::Bytes(b)) = (&app.args[0], &app.args[1]) {
                Step::Replace(Expr::Bytes(encode_bool(a == b)))
            } else {
                Step::Keep
            }
        }
        ExprOp::Not | ExprOp::Op(OP_NOT) if app.args.len() == 1 => match &app.args[0] {
            Expr::Bytes(b) => Step::Replace(Expr::Bytes(bool_not(b))),
            // A CHECKSIG that must evaluate false means the signature must
            // be the empty vector (NULLFAIL).
            Expr::App(inner) if inner.op == ExprOp::Op(OP_CHECKSIG) && inner.args.len() == 2 => {
                Step::Replace(Expr::app(
                    OP_EQUAL,
                    vec![inner.args[0].clone(), Expr::bytes(FALSE)],
                ))
            }
            _ => Step::Keep,
        },
        _ => Step::Keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::opcodes::all::{OP_ADD, OP_HASH160};

    fn checksig(sig: Expr, pk: Expr) -> Expr {
        Expr::app(OP_CHECKSIG, vec![sig, pk])
    }

    #[test]
    fn sorts_and_dedups() {
        let cs = checksig(Expr::Var(0), Expr::Var(1));
        let out = simplify_conditions(vec![Expr::Var(2), cs.clone(), cs.clone()]).unwrap();
        assert_eq!(out, vec![cs, Expr::Var(2)]);
    }

    #[test]
    fn commutative_arguments_collapse() {
        let a = Expr::app(OP_ADD, vec![Expr::Var(0), Expr::Var(1)]);
        let b = Expr::app(OP_ADD, vec![Expr::Var(1), Expr::Var(0)]);
        let out = simplify_conditions(vec![a.clone(), b]).unwrap();
        assert_eq!(out.len(), 1);
        // Argument order of CHECKSIG is significant and must survive.
        let cs = checksig(Expr::Var(1), Expr::Var(0));
        let out = simplify_conditions(vec![cs.clone()]).unwrap();
        assert_eq!(out, vec![cs]);
    }

    #[test]
    fn contradiction_kills_the_branch() {
        let p = checksig(Expr::Var(0), Expr::Var(1));
        assert_eq!(simplify_conditions(vec![p.clone(), Expr::not(p)]), None);
    }

    #[test]
    fn concrete_predicates_settle() {
        // Truthy constants drop out.
        let eq = Expr::app(OP_EQUAL, vec![Expr::bytes([0xab]), Expr::bytes([0xab])]);
        assert_eq!(simplify_conditions(vec![eq]).unwrap(), vec![]);
        // A falsy constant is fatal.
        let ne = Expr::app(OP_EQUAL, vec![Expr::bytes([0xab]), Expr::bytes([0xcd])]);
        assert_eq!(simplify_conditions(vec![ne]), None);
        // The negation rewrite produces a constant that is re-examined.
        let not_zero = Expr::not(Expr::bytes([0x00]));
        assert_eq!(simplify_conditions(vec![not_zero]).unwrap(), vec![]);
        let not_one = Expr::not(Expr::bytes([0x01]));
        assert_eq!(simplify_conditions(vec![not_one]), None);
    }

    #[test]
    fn negated_checksig_rewrites_to_null_signature() {
        let hash = Expr::app(OP_HASH160, vec![Expr::Var(1)]);
        let not_cs = Expr::not(checksig(Expr::Var(0), hash.clone()));
        let out = simplify_conditions(vec![not_cs]).unwrap();
        assert_eq!(
            out,
            vec![Expr::app(OP_EQUAL, vec![Expr::Var(0), Expr::bytes(FALSE)])]
        );
    }

    #[test]
    fn simplification_is_idempotent() {
        let cases = vec![
            vec![
                Expr::Var(1),
                checksig(Expr::Var(0), Expr::Var(1)),
                Expr::app(OP_ADD, vec![Expr::Var(1), Expr::Var(0)]),
                Expr::not(Expr::Var(2)),
            ],
            vec![
                Expr::app(OP_EQUAL, vec![Expr::bytes([0x01]), Expr::bytes([0x01])]),
                Expr::Var(0),
                Expr::Var(0),
            ],
        ];
        for conds in cases {
            let once = simplify_conditions(conds).unwrap();
            let twice = simplify_conditions(once.clone()).unwrap();
            assert_eq!(once, twice);
        }
    }
}
