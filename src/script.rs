//! The item-level view of a script: inline pushes and opcodes.

use bitcoin::opcodes::Opcode;
use bitcoin::script::{Instruction, Script};

/// One executable element of a script.
///
/// Push-style opcodes (OP_PUSHBYTES_n, OP_PUSHDATA1/2/4) never show up as
/// [`ScriptItem::Op`]; they arrive as [`ScriptItem::Push`] carrying their
/// payload, which is also how the executor wants them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptItem {
    Push(Vec<u8>),
    Op(Opcode),
}

/// Flattens a serialized script into its item sequence.
pub fn items(script: &Script) -> Result<Vec<ScriptItem>, bitcoin::script::Error> {
    script
        .instructions()
        .map(|instruction| {
            Ok(match instruction? {
                Instruction::PushBytes(bytes) => ScriptItem::Push(bytes.as_bytes().to_vec()),
                Instruction::Op(op) => ScriptItem::Op(op),
            })
        })
        .collect()
}
