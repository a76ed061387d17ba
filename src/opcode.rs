//! Opcode classification on top of the `bitcoin` crate's opcode table.

use bitcoin::opcodes::all::*;
use bitcoin::opcodes::Opcode;

/// Opcodes disabled because of CVE-2010-5137. A script containing any of
/// these anywhere is invalid, executed or not.
pub fn is_disabled(op: Opcode) -> bool {
    matches!(
        op,
        OP_CAT
            | OP_SUBSTR
            | OP_LEFT
            | OP_RIGHT
            | OP_INVERT
            | OP_AND
            | OP_OR
            | OP_XOR
            | OP_2MUL
            | OP_2DIV
            | OP_MUL
            | OP_DIV
            | OP_MOD
            | OP_LSHIFT
            | OP_RSHIFT
    )
}

/// Flow-control opcodes that are dispatched even inside a skipped arm.
pub fn is_branching(op: Opcode) -> bool {
    matches!(op, OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF)
}

/// The byte string pushed by a constant opcode, if `op` is one.
pub fn constant_push(op: Opcode) -> Option<Vec<u8>> {
    match op {
        OP_PUSHBYTES_0 => Some(Vec::new()),
        OP_PUSHNUM_NEG1 => Some(vec![0x81]),
        op if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) => {
            Some(vec![op.to_u8() - 0x50])
        }
        _ => None,
    }
}

/// Whether swapping the arguments of `op` preserves its meaning.
///
/// CHECKSIG is excluded even though it returns a plain boolean: `[sig, pk]`
/// is not symmetric.
pub fn can_reorder_args(op: Opcode) -> bool {
    !matches!(
        op,
        OP_CHECKMULTISIG
            | OP_CHECKSIG
            | OP_GREATERTHAN
            | OP_GREATERTHANOREQUAL
            | OP_LESSTHAN
            | OP_LESSTHANOREQUAL
            | OP_SUB
            | OP_WITHIN
    )
}

/// Display name without the `OP_` prefix: `CHECKSIG`, `HASH160`, ...
pub fn name(op: Opcode) -> String {
    let name = format!("{:?}", op);
    match name.strip_prefix("OP_") {
        Some(stripped) => stripped.to_owned(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants() {
        use bitcoin::opcodes::OP_0;
        assert_eq!(constant_push(OP_0), Some(vec![]));
        assert_eq!(constant_push(OP_PUSHNUM_NEG1), Some(vec![0x81]));
        assert_eq!(constant_push(OP_PUSHNUM_1), Some(vec![1]));
        assert_eq!(constant_push(OP_PUSHNUM_16), Some(vec![16]));
        assert_eq!(constant_push(OP_NOP), None);
        assert_eq!(constant_push(OP_PUSHDATA1), None);
    }

    #[test]
    fn names() {
        assert_eq!(name(OP_CHECKSIG), "CHECKSIG");
        assert_eq!(name(OP_HASH160), "HASH160");
        assert_eq!(name(OP_NUMEQUAL), "NUMEQUAL");
    }

    #[test]
    fn disabled_set() {
        for op in [OP_CAT, OP_SUBSTR, OP_MUL, OP_DIV, OP_LSHIFT, OP_RSHIFT] {
            assert!(is_disabled(op));
        }
        for op in [OP_ADD, OP_SUB, OP_EQUAL, OP_IF, OP_CHECKSIG] {
            assert!(!is_disabled(op));
        }
    }
}
