// Error taxonomy: parse errors and semantic errors abort compilation;
// runtime failures are recoverable (caught by TryCatch) or fatal. All
// four carry a source location, same as every AST node does (ast.cpp).

use thiserror::Error;

use crate::loc::SourceLoc;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("parse error at {at}: {message}")]
pub struct ParseError {
    pub at: SourceLoc,
    pub message: String,
}

impl ParseError {
    pub fn new(at: SourceLoc, message: impl Into<String>) -> ParseError {
        ParseError { at, message: message.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("semantic error at {at}: {message}")]
pub struct SemanticError {
    pub at: SourceLoc,
    pub message: String,
}

impl SemanticError {
    pub fn new(at: SourceLoc, message: impl Into<String>) -> SemanticError {
        SemanticError { at, message: message.into() }
    }
}

// Runtime failures. `recoverable()` tells the interpreter whether a
// TryCatch may absorb it; stack overflow and an explicit Terminate are
// always fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeFault {
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("null pointer dereference")]
    NullPointer,
    #[error("host error: {0}")]
    HostError(String),
    #[error("stack overflow")]
    StackOverflow,
    #[error("terminated")]
    Terminate,
}

impl RuntimeFault {
    pub fn recoverable(&self) -> bool {
        !matches!(self, RuntimeFault::StackOverflow | RuntimeFault::Terminate)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Runtime(#[from] RuntimeFault),
}
