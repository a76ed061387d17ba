//! The symbolic executor.
//!
//! One [`ScriptAnalyzer`] owns one control-flow path. Conditionals clone the
//! analyzer, push opposite gates onto the two condition stacks, and run the
//! fork to completion before the parent resumes, so the registry ends up in
//! depth-first pre-order of the fork tree. Stack slots the script consumes
//! but the path never produced are drawn as fresh witness variables; the
//! number of draws is the minimal witness length of that path.

use bitcoin::opcodes::all::*;
use bitcoin::opcodes::Opcode;
use tracing::{debug, trace};

use crate::cond_stack::ConditionStack;
use crate::error::ScriptError;
use crate::expr::Expr;
use crate::opcode;
use crate::script::ScriptItem;
use crate::scriptnum::{self, cast_to_bool, read_scriptnum, scriptnum_vec};

/// Combined stack plus altstack limit, checked after every executed item.
pub const MAX_STACK_SIZE: usize = 1000;
/// Upper bound on the key count consumed by CHECKMULTISIG.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Which consensus regime the script runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScriptVersion {
    Legacy,
    SegwitV0,
    SegwitV1,
}

/// Whether to honor standardness rules on top of consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRules {
    All,
    ConsensusOnly,
}

/// One registry entry: the outcome of a single control-flow path.
#[derive(Debug, Clone)]
pub struct PathRecord {
    /// Depth-first pre-order index of this path in the fork tree.
    pub id: usize,
    /// Spending conditions collected along the path (raw, unsimplified).
    pub conditions: Vec<Expr>,
    /// Number of witness elements this path draws.
    pub witness_len: u32,
    /// Set when the path aborted instead of reaching the final check.
    pub error: Option<PathError>,
}

/// A path failure plus the stack snapshot at the point of failure.
#[derive(Debug, Clone)]
pub struct PathError {
    pub kind: ScriptError,
    pub stack: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct ScriptAnalyzer<'a> {
    items: &'a [ScriptItem],
    version: ScriptVersion,
    rules: ScriptRules,
    offset: usize,
    stack: Vec<Expr>,
    altstack: Vec<Expr>,
    conditions: Vec<Expr>,
    cond_stack: ConditionStack,
    var_counter: u32,
    path: usize,
}

impl<'a> ScriptAnalyzer<'a> {
    pub fn new(items: &'a [ScriptItem], version: ScriptVersion, rules: ScriptRules) -> Self {
        ScriptAnalyzer {
            items,
            version,
            rules,
            offset: 0,
            stack: Vec::new(),
            altstack: Vec::new(),
            conditions: Vec::new(),
            cond_stack: ConditionStack::new(),
            var_counter: 0,
            path: 0,
        }
    }

    /// Runs this path (and, recursively, every path forked from it) to
    /// completion, recording outcomes into `paths`.
    ///
    /// The slot is reserved up front so that registry order is the order in
    /// which paths start executing, not the order in which they finish.
    pub fn run(mut self, paths: &mut Vec<PathRecord>) {
        let slot = paths.len();
        self.path = slot;
        paths.push(PathRecord {
            id: slot,
            conditions: Vec::new(),
            witness_len: 0,
            error: None,
        });
        let outcome = self.exec_all(paths);
        let total = self.var_counter;
        let entry = &mut paths[slot];
        entry.witness_len = total;
        match outcome {
            Ok(()) => {
                for c in &mut self.conditions {
                    c.relabel_vars(total);
                }
                entry.conditions = std::mem::take(&mut self.conditions);
                debug!(path = slot, conditions = entry.conditions.len(), "path accepted");
            }
            Err(kind) => {
                for e in &mut self.stack {
                    e.relabel_vars(total);
                }
                entry.error = Some(PathError {
                    kind,
                    stack: std::mem::take(&mut self.stack),
                });
                debug!(path = slot, error = %kind, "path rejected");
            }
        }
    }

    fn exec_all(&mut self, paths: &mut Vec<PathRecord>) -> Result<(), ScriptError> {
        let items = self.items;
        while self.offset < items.len() {
            let item = &items[self.offset];
            self.offset += 1;
            self.exec_item(item, paths)?;
            if self.stack.len() + self.altstack.len() > MAX_STACK_SIZE {
                return Err(ScriptError::StackSize);
            }
        }
        if !self.cond_stack.is_empty() {
            return Err(ScriptError::UnbalancedConditional);
        }
        if self.stack.len() > 1 {
            return Err(ScriptError::CleanStack);
        }
        // Read instead of take so a failure still snapshots the offender.
        let top = self.read1();
        self.verify(top, ScriptError::EvalFalse)
    }

    fn exec_item(
        &mut self,
        item: &ScriptItem,
        paths: &mut Vec<PathRecord>,
    ) -> Result<(), ScriptError> {
        let executing = self.cond_stack.all_true();
        match item {
            ScriptItem::Push(bytes) => {
                if executing {
                    self.stack.push(Expr::bytes(bytes.clone()));
                }
                Ok(())
            }
            ScriptItem::Op(op) => {
                if !executing && !opcode::is_branching(*op) {
                    return Ok(());
                }
                trace!(path = self.path, op = %opcode::name(*op), depth = self.stack.len(), "exec");
                self.exec_opcode(*op, executing, paths)
            }
        }
    }

    fn exec_opcode(
        &mut self,
        op: Opcode,
        executing: bool,
        paths: &mut Vec<PathRecord>,
    ) -> Result<(), ScriptError> {
        if let Some(bytes) = opcode::constant_push(op) {
            self.stack.push(Expr::Bytes(bytes));
            return Ok(());
        }
        match op {
            OP_IF | OP_NOTIF => {
                if !executing {
                    self.cond_stack.push(false);
                    return Ok(());
                }
                let condition = self.take1();
                let mut fork = self.clone();
                // The arm that runs when the popped value is truthy keeps
                // `condition`; the other arm gets its negation. NOTIF only
                // swaps which arm is gated open.
                self.cond_stack.push(op == OP_IF);
                fork.cond_stack.push(op == OP_NOTIF);
                let minimal_if = self.version == ScriptVersion::SegwitV1
                    || (self.version == ScriptVersion::SegwitV0
                        && self.rules == ScriptRules::All);
                if minimal_if {
                    let err = if self.version == ScriptVersion::SegwitV1 {
                        ScriptError::TapscriptMinimalIf
                    } else {
                        ScriptError::MinimalIf
                    };
                    self.conditions.push(Expr::app_tagged(
                        OP_EQUAL,
                        vec![condition.clone(), Expr::bytes(scriptnum::TRUE)],
                        err,
                    ));
                    fork.conditions.push(Expr::app_tagged(
                        OP_EQUAL,
                        vec![condition, Expr::bytes(scriptnum::FALSE)],
                        err,
                    ));
                } else {
                    self.conditions.push(condition.clone());
                    fork.conditions.push(Expr::not(condition));
                }
                trace!(parent = self.path, offset = self.offset, "fork at conditional");
                fork.run(paths);
                Ok(())
            }
            OP_ELSE => {
                if self.cond_stack.toggle_top() {
                    Ok(())
                } else {
                    Err(ScriptError::UnbalancedConditional)
                }
            }
            OP_ENDIF => {
                if self.cond_stack.pop() {
                    Ok(())
                } else {
                    Err(ScriptError::UnbalancedConditional)
                }
            }

            OP_NOP | OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9
            | OP_NOP10 => Ok(()),

            OP_VERIFY => {
                let e = self.take1();
                self.verify(e, ScriptError::Verify)
            }
            OP_RETURN => Err(ScriptError::OpReturn),

            OP_TOALTSTACK => {
                let e = self.take1();
                self.altstack.push(e);
                Ok(())
            }
            OP_FROMALTSTACK => {
                let e = self
                    .altstack
                    .pop()
                    .ok_or(ScriptError::InvalidAltstackOperation)?;
                self.stack.push(e);
                Ok(())
            }

            OP_2DROP => {
                self.take(2);
                Ok(())
            }
            OP_2DUP => {
                let pair = self.read(2);
                self.stack.extend(pair);
                Ok(())
            }
            OP_3DUP => {
                let triple = self.read(3);
                self.stack.extend(triple);
                Ok(())
            }
            OP_2OVER => {
                let four = self.read(4);
                self.stack.push(four[0].clone());
                self.stack.push(four[1].clone());
                Ok(())
            }
            OP_2ROT => {
                let mut six = self.take(6);
                six.rotate_left(2);
                self.stack.extend(six);
                Ok(())
            }
            OP_2SWAP => {
                let mut four = self.take(4);
                four.rotate_left(2);
                self.stack.extend(four);
                Ok(())
            }
            OP_IFDUP => self.exec_ifdup(paths),
            OP_DEPTH => {
                let depth = self.stack.len() as i64;
                self.stack.push(Expr::Bytes(scriptnum_vec(depth)));
                Ok(())
            }
            OP_DROP => {
                self.take(1);
                Ok(())
            }
            OP_DUP => {
                let top = self.read1();
                self.stack.push(top);
                Ok(())
            }
            OP_NIP => {
                let mut pair = self.take(2);
                let top = pair.pop().unwrap_or_else(|| unreachable!());
                self.stack.push(top);
                Ok(())
            }
            OP_OVER => {
                let pair = self.read(2);
                self.stack.push(pair[0].clone());
                Ok(())
            }
            OP_PICK | OP_ROLL => {
                let depth = self.take_number()?;
                if depth < 0 {
                    return Err(ScriptError::InvalidStackOperation);
                }
                let depth = depth as usize;
                if op == OP_PICK {
                    let seen = self.read(depth + 1);
                    self.stack.push(seen[0].clone());
                } else {
                    let mut moved = self.take(depth + 1);
                    moved.rotate_left(1);
                    self.stack.extend(moved);
                }
                Ok(())
            }
            OP_ROT => {
                let mut triple = self.take(3);
                triple.rotate_left(1);
                self.stack.extend(triple);
                Ok(())
            }
            OP_SWAP => {
                let mut pair = self.take(2);
                pair.swap(0, 1);
                self.stack.extend(pair);
                Ok(())
            }
            OP_TUCK => {
                let mut pair = self.take(2);
                let top = pair.pop().unwrap_or_else(|| unreachable!());
                let below = pair.pop().unwrap_or_else(|| unreachable!());
                self.stack.push(top.clone());
                self.stack.push(below);
                self.stack.push(top);
                Ok(())
            }
            OP_SIZE => {
                let top = self.read1();
                self.stack.push(Expr::app(OP_SIZE, vec![top]));
                Ok(())
            }

            OP_EQUAL => {
                let args = self.take(2);
                self.stack.push(Expr::app(OP_EQUAL, args));
                Ok(())
            }
            OP_EQUALVERIFY => {
                let args = self.take(2);
                let e = Expr::app(OP_EQUAL, args);
                self.verify(e, ScriptError::EqualVerify)
            }

            OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                let args = self.take(1);
                self.stack.push(Expr::app(op, args));
                Ok(())
            }
            OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMNOTEQUAL
            | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL | OP_GREATERTHANOREQUAL
            | OP_MIN | OP_MAX => {
                let args = self.take(2);
                self.stack.push(Expr::app(op, args));
                Ok(())
            }
            OP_NUMEQUALVERIFY => {
                let args = self.take(2);
                let e = Expr::app(OP_NUMEQUAL, args);
                self.verify(e, ScriptError::NumEqualVerify)
            }
            OP_WITHIN => {
                let args = self.take(3);
                self.stack.push(Expr::app(OP_WITHIN, args));
                Ok(())
            }

            OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => {
                let args = self.take(1);
                self.stack.push(Expr::app(op, args));
                Ok(())
            }
            OP_CODESEPARATOR => Ok(()),

            OP_CHECKSIG => {
                let args = self.take(2);
                self.stack.push(Expr::app(OP_CHECKSIG, args));
                Ok(())
            }
            OP_CHECKSIGVERIFY => {
                let args = self.take(2);
                let e = Expr::app(OP_CHECKSIG, args);
                self.verify(e, ScriptError::CheckSigVerify)
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                self.exec_multisig(op == OP_CHECKMULTISIGVERIFY)
            }

            OP_CLTV | OP_CSV => {
                let top = self.read1();
                self.conditions.push(Expr::app(op, vec![top]));
                Ok(())
            }

            OP_CHECKSIGADD => {
                if self.version < ScriptVersion::SegwitV1 {
                    return Err(ScriptError::BadOpcode);
                }
                let mut args = self.take(3);
                let pk = args.pop().unwrap_or_else(|| unreachable!());
                let n = args.pop().unwrap_or_else(|| unreachable!());
                let sig = args.pop().unwrap_or_else(|| unreachable!());
                let checksig = Expr::app(OP_CHECKSIG, vec![sig, pk]);
                self.stack.push(Expr::app(OP_ADD, vec![n, checksig]));
                Ok(())
            }

            op if opcode::is_disabled(op) => Err(ScriptError::DisabledOpcode),
            _ => Err(ScriptError::BadOpcode),
        }
    }

    /// OP_IFDUP duplicates a truthy top. A symbolic top forks: this path
    /// assumes truthy (and duplicates), the fork assumes the negation.
    fn exec_ifdup(&mut self, paths: &mut Vec<PathRecord>) -> Result<(), ScriptError> {
        let top = self.read1();
        if let Some(truthy) = top.truth() {
            if truthy {
                self.stack.push(top);
            }
            return Ok(());
        }
        let mut fork = self.clone();
        fork.conditions.push(Expr::not(top.clone()));
        self.conditions.push(top.clone());
        self.stack.push(top);
        trace!(parent = self.path, offset = self.offset, "fork at OP_IFDUP");
        fork.run(paths);
        Ok(())
    }

    fn exec_multisig(&mut self, verify: bool) -> Result<(), ScriptError> {
        if self.version == ScriptVersion::SegwitV1 {
            return Err(ScriptError::TapscriptCheckMultiSig);
        }
        let key_count = self.take_number()?;
        if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&key_count) {
            return Err(ScriptError::PubkeyCount);
        }
        let keys = self.take(key_count as usize);
        let sig_count = self.take_number()?;
        if !(0..=key_count).contains(&sig_count) {
            return Err(ScriptError::SigCount);
        }
        let sigs = self.take(sig_count as usize);
        // The consumed-but-unused dummy element must be null (BIP 147),
        // recorded as a condition so a symbolic dummy stays visible.
        let dummy = self.take1();
        self.conditions.push(Expr::app_tagged(
            OP_EQUAL,
            vec![dummy, Expr::bytes(scriptnum::FALSE)],
            ScriptError::SigNullDummy,
        ));
        let mut args = sigs;
        args.push(Expr::Bytes(scriptnum_vec(sig_count)));
        args.extend(keys);
        args.push(Expr::Bytes(scriptnum_vec(key_count)));
        let e = Expr::app(OP_CHECKMULTISIG, args);
        if verify {
            self.verify(e, ScriptError::CheckMultiSigVerify)
        } else {
            self.stack.push(e);
            Ok(())
        }
    }

    /// Settles a value that must be truthy for the path to continue.
    ///
    /// Concrete values resolve now; symbolic applications are recorded as a
    /// spending condition tagged with the failure kind they would raise.
    fn verify(&mut self, e: Expr, err: ScriptError) -> Result<(), ScriptError> {
        match e {
            Expr::Bytes(b) => {
                if cast_to_bool(&b) {
                    Ok(())
                } else {
                    Err(err)
                }
            }
            Expr::App(mut app) => {
                app.err = Some(err);
                self.conditions.push(Expr::App(app));
                Ok(())
            }
            var @ Expr::Var(_) => {
                self.conditions.push(var);
                Ok(())
            }
        }
    }

    /// Pops a value that must be a concrete script number. Symbolic depths
    /// and counts are not modeled.
    fn take_number(&mut self) -> Result<i64, ScriptError> {
        match self.take1() {
            Expr::Bytes(b) => read_scriptnum(&b),
            _ => Err(ScriptError::NumOverflow),
        }
    }

    /// Removes the top `n` elements, in bottom-to-top order. Slots the stack
    /// does not have are drawn as fresh witness variables below everything
    /// already known.
    fn take(&mut self, n: usize) -> Vec<Expr> {
        self.grow_to(n);
        let split = self.stack.len() - n;
        self.stack.split_off(split)
    }

    /// Non-destructive [`Self::take`].
    fn read(&mut self, n: usize) -> Vec<Expr> {
        self.grow_to(n);
        self.stack[self.stack.len() - n..].to_vec()
    }

    fn take1(&mut self) -> Expr {
        self.take(1).pop().unwrap_or_else(|| unreachable!())
    }

    fn read1(&mut self) -> Expr {
        self.read(1).pop().unwrap_or_else(|| unreachable!())
    }

    fn grow_to(&mut self, depth: usize) {
        while self.stack.len() < depth {
            let var = Expr::Var(self.var_counter);
            self.var_counter += 1;
            self.stack.insert(0, var);
        }
    }
}
