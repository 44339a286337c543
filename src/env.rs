// Local-variable scope tracking during type inference.
//
// A single flat stack, not a chained scope map: ast.cpp's
// ExprLet::inferType saves context.local.size() before descending into
// its body and truncates back to it on the way out, and lookups scan
// from the end backward (`for (auto it = context.local.rbegin(); ...)`)
// so an inner `let` can shadow an outer one of the same name. A flat
// Vec with push/truncate reproduces that directly -- this language's
// scoping is strictly nested, so it needs none of the indirection a
// tree-shaped lexical scope chain would require.

use crate::ast::VarTarget;
use crate::types::TypeDecl;

#[derive(Clone, Debug)]
pub struct LocalVar {
    pub name: String,
    pub type_: TypeDecl,
    pub offset: usize,
}

#[derive(Default)]
pub struct Locals {
    vars: Vec<LocalVar>,
}

impl Locals {
    pub fn new() -> Locals {
        Locals::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn push(&mut self, name: String, type_: TypeDecl, offset: usize) {
        self.vars.push(LocalVar { name, type_, offset });
    }

    // Restore to a previously saved length, dropping everything
    // declared since -- the scope-exit half of the save/restore pair.
    pub fn truncate(&mut self, len: usize) {
        self.vars.truncate(len);
    }

    pub fn find(&self, name: &str) -> Option<&LocalVar> {
        self.vars.iter().rev().find(|v| v.name == name)
    }

    pub fn find_target(&self, name: &str) -> Option<VarTarget> {
        self.find(name).map(|v| VarTarget::Local { offset: v.offset })
    }
}
