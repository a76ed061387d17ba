//! Symbolic stack values: concrete bytes, witness variables, and applied
//! opcodes.

use core::cmp::Ordering;
use core::fmt;

use bitcoin::opcodes::all::{OP_EQUAL, OP_NOT};
use bitcoin::opcodes::Opcode;

use crate::error::ScriptError;
use crate::opcode;
use crate::scriptnum::cast_to_bool;

/// Head of an applied expression.
///
/// `Not` is the analyzer-internal negation. It has no on-chain encoding,
/// sorts before every real opcode, and unlike OP_NOT accepts operands longer
/// than 4 bytes (it is equivalent to `IF 0 ELSE 1 ENDIF` without minimal-if).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Not,
    Op(Opcode),
}

impl ExprOp {
    fn sort_code(self) -> i32 {
        match self {
            ExprOp::Not => -1,
            ExprOp::Op(op) => op.to_u8() as i32,
        }
    }
}

/// An opcode applied to an ordered argument list.
///
/// `err` optionally marks "this predicate must hold, else the path fails
/// with this error". It is a diagnostic annotation: equality and ordering
/// ignore it.
#[derive(Debug, Clone)]
pub struct App {
    pub op: ExprOp,
    pub args: Vec<Expr>,
    pub err: Option<ScriptError>,
}

/// A symbolic stack element.
#[derive(Debug, Clone)]
pub enum Expr {
    Bytes(Vec<u8>),
    Var(u32),
    App(App),
}

impl Expr {
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Expr::Bytes(b.into())
    }

    pub fn app(op: Opcode, args: Vec<Expr>) -> Self {
        Expr::App(App {
            op: ExprOp::Op(op),
            args,
            err: None,
        })
    }

    pub fn app_tagged(op: Opcode, args: Vec<Expr>, err: ScriptError) -> Self {
        Expr::App(App {
            op: ExprOp::Op(op),
            args,
            err: Some(err),
        })
    }

    /// The internal negation of `e`.
    pub fn not(e: Expr) -> Self {
        Expr::App(App {
            op: ExprOp::Not,
            args: vec![e],
            err: None,
        })
    }

    /// The boolean value of a concrete expression, `None` when symbolic.
    pub fn truth(&self) -> Option<bool> {
        match self {
            Expr::Bytes(b) => Some(cast_to_bool(b)),
            _ => None,
        }
    }

    /// Whether `self` is `OP_NOT(other)` or the internal not of `other`.
    pub fn is_negation_of(&self, other: &Expr) -> bool {
        match self {
            Expr::App(app) => {
                matches!(app.op, ExprOp::Not | ExprOp::Op(OP_NOT))
                    && app.args.len() == 1
                    && app.args[0] == *other
            }
            _ => false,
        }
    }

    /// Rewrites draw-order variable ids into witness positions.
    ///
    /// Underflow draws walk downward from the top of the would-be witness
    /// stack, so with `total` draws the n-th draw sits at witness position
    /// `total - 1 - n`.
    pub fn relabel_vars(&mut self, total: u32) {
        match self {
            Expr::Bytes(_) => {}
            Expr::Var(n) => *n = total - 1 - *n,
            Expr::App(app) => {
                for arg in &mut app.args {
                    arg.relabel_vars(total);
                }
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::App(_) => 0,
            Expr::Var(_) => 1,
            Expr::Bytes(_) => 2,
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Bytes(a), Expr::Bytes(b)) => a == b,
            (Expr::Var(a), Expr::Var(b)) => a == b,
            (Expr::App(a), Expr::App(b)) => a.op == b.op && a.args == b.args,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Expr::App(a), Expr::App(b)) => a
                .op
                .sort_code()
                .cmp(&b.op.sort_code())
                .then_with(|| a.args.len().cmp(&b.args.len()))
                .then_with(|| a.args.cmp(&b.args)),
            (Expr::Var(a), Expr::Var(b)) => a.cmp(b),
            (Expr::Bytes(a), Expr::Bytes(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bytes(b) => write!(f, "<{}>", hex::encode(b)),
            Expr::Var(n) => write!(f, "<input{n}>"),
            Expr::App(app) => match app.op {
                ExprOp::Not => write!(f, "!({})", app.args[0]),
                ExprOp::Op(OP_EQUAL) if app.args.len() == 2 => {
                    write!(f, "({} == {})", app.args[0], app.args[1])
                }
                ExprOp::Op(op) => {
                    write!(f, "{}(", opcode::name(op))?;
                    for (i, arg) in app.args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(")")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::opcodes::all::{OP_ADD, OP_CHECKSIG, OP_HASH160};

    #[test]
    fn equality_ignores_error_tag() {
        let plain = Expr::app(OP_CHECKSIG, vec![Expr::Var(0), Expr::Var(1)]);
        let tagged = Expr::app_tagged(
            OP_CHECKSIG,
            vec![Expr::Var(0), Expr::Var(1)],
            ScriptError::CheckSigVerify,
        );
        assert_eq!(plain, tagged);
        assert_eq!(plain.cmp(&tagged), Ordering::Equal);
    }

    #[test]
    fn ordering_is_total_and_layered() {
        let app = Expr::app(OP_ADD, vec![Expr::Var(0), Expr::Var(1)]);
        let not = Expr::not(Expr::Var(0));
        let var = Expr::Var(3);
        let bytes = Expr::bytes([0x01]);

        // Apps sort before vars, vars before bytes.
        assert!(app < var);
        assert!(var < bytes);
        // The internal not sorts before every real opcode.
        assert!(not < app);
        // Vars by index, bytes lexicographically.
        assert!(Expr::Var(1) < Expr::Var(2));
        assert!(Expr::bytes([0x01]) < Expr::bytes([0x02]));
        assert!(Expr::bytes([0x01]) < Expr::bytes([0x01, 0x00]));
        // Apps by opcode, then arity, then arguments.
        assert!(Expr::app(OP_ADD, vec![]) < Expr::app(OP_CHECKSIG, vec![]));
        assert!(
            Expr::app(OP_ADD, vec![Expr::Var(0)])
                < Expr::app(OP_ADD, vec![Expr::Var(0), Expr::Var(1)])
        );
        assert!(
            Expr::app(OP_ADD, vec![Expr::Var(0), Expr::Var(1)])
                < Expr::app(OP_ADD, vec![Expr::Var(0), Expr::Var(2)])
        );
    }

    #[test]
    fn negation_shapes() {
        let e = Expr::app(OP_CHECKSIG, vec![Expr::Var(0), Expr::Var(1)]);
        assert!(Expr::not(e.clone()).is_negation_of(&e));
        assert!(Expr::app(bitcoin::opcodes::all::OP_NOT, vec![e.clone()]).is_negation_of(&e));
        assert!(!e.clone().is_negation_of(&Expr::not(e)));
    }

    #[test]
    fn display_forms() {
        let pkh = Expr::app(OP_HASH160, vec![Expr::Var(1)]);
        let eq = Expr::app(bitcoin::opcodes::all::OP_EQUAL, vec![pkh, Expr::bytes([0xab, 0xcd])]);
        assert_eq!(eq.to_string(), "(HASH160(<input1>) == <abcd>)");
        assert_eq!(Expr::not(Expr::Var(0)).to_string(), "!(<input0>)");
        assert_eq!(Expr::bytes([]).to_string(), "<>");
        assert_eq!(
            Expr::app(OP_CHECKSIG, vec![Expr::Var(0), Expr::Var(1)]).to_string(),
            "CHECKSIG(<input0>, <input1>)"
        );
    }
}
