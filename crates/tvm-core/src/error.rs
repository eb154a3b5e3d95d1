use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// Result type used across the machine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, rewriting, compiling or executing a traversal.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("The traversal has already been submitted and can no longer be mutated")]
    #[diagnostic(code(tvm::illegal_state))]
    IllegalState,

    #[error("No compiler can resolve op \"{0}\"")]
    #[diagnostic(
        code(tvm::unresolved_op),
        help("Register a compiler for this op through a structure or processor factory.")
    )]
    UnresolvedOp(SmolStr),

    #[error("No structure factory is bound to the root bytecode")]
    #[diagnostic(
        code(tvm::no_structure_factory),
        help("Attach a structure factory with `Query::with_structure` before submitting.")
    )]
    NoStructureFactory,

    #[error("No processor factory is bound to the root bytecode or the machine")]
    #[diagnostic(code(tvm::no_processor_factory))]
    NoProcessorFactory,

    #[error("The path does not have an object for the provided label: {0}")]
    #[diagnostic(
        code(tvm::path_label_not_found),
        help("Check `Path::has` first when the label may be absent.")
    )]
    PathLabelNotFound(SmolStr),

    #[error("Invalid arguments for \"{op}\": {reason}")]
    #[diagnostic(code(tvm::invalid_arguments))]
    InvalidArguments { op: SmolStr, reason: String },

    #[error("Invalid types for \"{op}\", got {found}")]
    #[diagnostic(code(tvm::invalid_types))]
    InvalidTypes { op: SmolStr, found: SmolStr },

    #[error("Integer overflow in \"{0}\"")]
    #[diagnostic(code(tvm::overflow))]
    Overflow(SmolStr),

    #[error("Unable to build worker pool: {0}")]
    #[diagnostic(code(tvm::pool_build))]
    PoolBuild(String),

    #[error("Invalid processor configuration: {0}")]
    #[diagnostic(code(tvm::config))]
    Config(String),

    #[error("Processor stopped before completing: {0}")]
    #[diagnostic(code(tvm::processor))]
    Processor(String),
}

impl Error {
    pub fn invalid_arguments(op: &str, reason: impl Into<String>) -> Self {
        Error::InvalidArguments {
            op: op.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_types(op: &str, found: &crate::Value) -> Self {
        Error::InvalidTypes {
            op: op.into(),
            found: found.type_name().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use rstest::rstest;

    #[rstest]
    #[case(Error::UnresolvedOp("out".into()), "No compiler can resolve op \"out\"")]
    #[case(
        Error::PathLabelNotFound("a".into()),
        "The path does not have an object for the provided label: a"
    )]
    #[case(
        Error::invalid_types("incr", &Value::Str("x".into())),
        "Invalid types for \"incr\", got string"
    )]
    #[case(
        Error::invalid_arguments("is", "expected 1 or 2 arguments"),
        "Invalid arguments for \"is\": expected 1 or 2 arguments"
    )]
    #[case(Error::Overflow("incr".into()), "Integer overflow in \"incr\"")]
    fn test_display(#[case] error: Error, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_diagnostic_code() {
        let code = Error::NoStructureFactory.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("tvm::no_structure_factory"));
    }
}
