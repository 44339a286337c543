// Source locations, threaded through the reader, the AST, and every
// diagnostic. Carried through per spec, never resolved back to a
// byte range -- this is not a debugger.

use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn new(file: Rc<str>, line: u32, column: u32) -> SourceLoc {
        SourceLoc { file, line, column }
    }

    // Used for synthetic nodes introduced by the resolver (auto-deref,
    // default-argument backfill) that have no literal source text.
    pub fn synthetic() -> SourceLoc {
        SourceLoc { file: Rc::from("<synthetic>"), line: 0, column: 0 }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
