use thiserror::Error;

/// Reasons a spending path stops being viable.
///
/// Every error is terminal for the path that raised it; sibling paths keep
/// running. The messages follow the reference diagnostics so output lines up
/// with what `bitcoind -debug=script` would say about the same script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("opcode missing or not understood")]
    BadOpcode,
    #[error("attempted to use a disabled opcode")]
    DisabledOpcode,
    #[error("invalid OP_IF construction")]
    UnbalancedConditional,

    #[error("operation not valid with the current stack size")]
    InvalidStackOperation,
    #[error("operation not valid with the current altstack size")]
    InvalidAltstackOperation,
    #[error("stack size limit exceeded")]
    StackSize,
    #[error("stack size must be exactly one after execution")]
    CleanStack,

    #[error("script failed an OP_VERIFY operation")]
    Verify,
    #[error("script failed an OP_EQUALVERIFY operation")]
    EqualVerify,
    #[error("script failed an OP_NUMEQUALVERIFY operation")]
    NumEqualVerify,
    #[error("script failed an OP_CHECKSIGVERIFY operation")]
    CheckSigVerify,
    #[error("script failed an OP_CHECKMULTISIGVERIFY operation")]
    CheckMultiSigVerify,

    #[error("OP_RETURN was encountered")]
    OpReturn,
    #[error("script evaluated without error but finished with a false/empty top stack element")]
    EvalFalse,

    #[error("script number overflow")]
    NumOverflow,

    #[error("dummy CHECKMULTISIG argument must be zero")]
    SigNullDummy,
    #[error("OP_IF/NOTIF argument must be minimal")]
    MinimalIf,
    #[error("OP_IF/NOTIF argument must be minimal in tapscript")]
    TapscriptMinimalIf,
    #[error("OP_CHECKMULTISIG(VERIFY) is not available in tapscript")]
    TapscriptCheckMultiSig,

    #[error("OP_CHECKMULTISIG(VERIFY) with invalid pubkey count")]
    PubkeyCount,
    #[error("OP_CHECKMULTISIG(VERIFY) with invalid signature count")]
    SigCount,
}

/// Errors from the parse-then-analyze convenience entry point.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("malformed script: {0}")]
    Parse(#[from] bitcoin::script::Error),
    #[error(transparent)]
    Script(#[from] ScriptError),
}
