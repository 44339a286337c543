// Lowering resolved expressions into a flat, indexable execution
// graph, replacing raw SimNode* chains with arena indices.
//
// Ported from ast.cpp's Expr*::simulate methods, which build a tree of
// heap-allocated SimNode subclasses dispatched through a virtual
// `SimNode::eval`. Here every node is pushed into a single Vec<SimNode>
// arena and referenced by its index (SimNodeId), so the interpreter in
// interp.rs walks plain data with no virtual dispatch and no raw
// pointers to manage.
//
// Storage model: locals, globals and heap-allocated structures are
// each a flat Vec<Value> (see interp::Value). An "offset" recorded on
// a node is an index into the relevant Vec<Value>, not a byte offset --
// Structure::assign_offsets / TypeDecl size_of still compute real byte
// offsets for `sizeof` and field-layout metadata, but the interpreter
// addresses storage one declared field/local/element per slot. A
// multi-slot value (the vectorN kinds) occupies its full declared
// width with the later slots left untouched (see interp::Value::Tomb),
// which keeps offset arithmetic for fields-after-a-vector and
// array-of-vector indexing correct without needing raw byte access or
// unsafe transmutes anywhere in the interpreter.
//
// Arrays of by-value structures are out of scope: a structure-typed
// array element has nowhere of its own to live in this slot model
// short of heap-allocating one sub-array per element, which the
// language surface never asks for (structures are always accessed
// through `new`-allocated pointers). Arrays of scalars, strings and
// pointers are fully supported.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind, VarTarget};
use crate::program::{FunctionId, Program};
use crate::types::Base;

pub type SimNodeId = u32;

#[derive(Clone, Debug)]
pub enum SimNode {
    ConstBool(bool),
    ConstInt(i32),
    ConstUInt(u32),
    ConstFloat(f32),
    ConstStr(Rc<str>),
    ConstNullPtr,

    GetLocal { offset: usize },
    GetArgument { index: u32 },
    GetGlobal { index: u32 },

    Field { value: SimNodeId, offset: usize },
    At { value: SimNodeId, index: SimNodeId, elem_size: usize, len: u32 },

    Ref2Value { value: SimNodeId },
    Ptr2Ref { value: SimNodeId },
    // `defaults` zero-initializes the first slot of every field's
    // range; any remaining slots in a multi-slot (vectorN) field are
    // left as Value::Tomb by the interpreter.
    New { size: usize, defaults: Vec<(usize, Base)> },

    Block(Vec<SimNodeId>),
    Let { inits: Vec<(usize, SimNodeId)>, body: SimNodeId },

    IfThenElse { cond: SimNodeId, if_true: SimNodeId, if_false: Option<SimNodeId> },
    While { cond: SimNodeId, body: SimNodeId },
    Foreach { head: SimNodeId, elem_offset: usize, elem_size: usize, len: u32, body: SimNodeId },
    TryCatch { try_this: SimNodeId, catch_that: SimNodeId },

    Return(Option<SimNodeId>),
    Break,

    Call { func: FunctionId, args: Vec<SimNodeId> },
}

// The lowered program: a flat node arena plus, for every function
// index, the entry node of its body (None for built-ins, which the
// interpreter dispatches to a native function instead).
pub struct SimProgram {
    pub nodes: Vec<SimNode>,
    pub entries: Vec<Option<SimNodeId>>,
    pub global_inits: Vec<SimNodeId>,
}

fn push(arena: &mut Vec<SimNode>, node: SimNode) -> SimNodeId {
    arena.push(node);
    (arena.len() - 1) as SimNodeId
}

pub fn lower_program(program: &Program) -> SimProgram {
    let mut arena = Vec::new();
    let mut entries = Vec::with_capacity(program.functions().len());
    for f in program.functions() {
        let entry = f.body.as_ref().map(|body| lower_expr(program, &mut arena, body));
        entries.push(entry);
    }
    let global_inits = program
        .globals()
        .iter()
        .map(|g| lower_expr(program, &mut arena, g.init.as_ref().expect("globals always carry a resolved initializer")))
        .collect();
    SimProgram { nodes: arena, entries, global_inits }
}

fn lower_expr(program: &Program, arena: &mut Vec<SimNode>, e: &Expr) -> SimNodeId {
    let node = match &*e.kind {
        ExprKind::Bool(v) => SimNode::ConstBool(*v),
        ExprKind::Int(v) => SimNode::ConstInt(*v as i32),
        ExprKind::UInt(v) => SimNode::ConstUInt(*v),
        ExprKind::Float(v) => SimNode::ConstFloat(*v as f32),
        ExprKind::Str(v) => SimNode::ConstStr(Rc::from(v.as_str())),
        ExprKind::NullPtr => SimNode::ConstNullPtr,

        ExprKind::Var { target, .. } => match target.expect("Var lowered before its target was resolved") {
            VarTarget::Local { offset } => SimNode::GetLocal { offset },
            VarTarget::Argument { index } => SimNode::GetArgument { index },
            VarTarget::Global { index } => SimNode::GetGlobal { index },
        },

        ExprKind::Field { value, field_offset, .. } => {
            let value = lower_expr(program, arena, value);
            SimNode::Field { value, offset: field_offset.expect("field offset resolved before lowering") }
        }

        ExprKind::At { value, index } => {
            let elem_ty = e.ty();
            let elem_size = program.size_of(elem_ty);
            let len = *value.ty().dims.last().expect("'at' target is an array");
            let value = lower_expr(program, arena, value);
            let index = lower_expr(program, arena, index);
            SimNode::At { value, index, elem_size, len }
        }

        ExprKind::Call { args, func, .. } => {
            let args = args.iter().map(|a| lower_expr(program, arena, a)).collect();
            SimNode::Call { func: func.expect("call resolved before lowering"), args }
        }

        ExprKind::Op1 { subexpr, func, .. } => {
            let args = vec![lower_expr(program, arena, subexpr)];
            SimNode::Call { func: func.expect("operator resolved before lowering"), args }
        }

        ExprKind::Op2 { left, right, func, .. } => {
            let args = vec![lower_expr(program, arena, left), lower_expr(program, arena, right)];
            SimNode::Call { func: func.expect("operator resolved before lowering"), args }
        }

        ExprKind::Op3 { cond, left, right, func, .. } => {
            let args = vec![lower_expr(program, arena, cond), lower_expr(program, arena, left), lower_expr(program, arena, right)];
            SimNode::Call { func: func.expect("operator resolved before lowering"), args }
        }

        ExprKind::Ref2Value(inner) => {
            let value = lower_expr(program, arena, inner);
            SimNode::Ref2Value { value }
        }

        ExprKind::Ptr2Ref(inner) => {
            let value = lower_expr(program, arena, inner);
            SimNode::Ptr2Ref { value }
        }

        ExprKind::New { structure } => {
            let s = program.structure(*structure);
            let size = s.size_of(|t| program.size_of(t)).max(1);
            let defaults = s.fields.iter().map(|f| (f.offset, f.type_.base)).collect();
            SimNode::New { size, defaults }
        }

        ExprKind::SizeOf { subexpr, of_type } => {
            let size = match (subexpr, of_type) {
                (Some(sub), _) => program.size_of(sub.ty()),
                (None, Some(t)) => program.size_of(t),
                (None, None) => 0,
            };
            SimNode::ConstUInt(size as u32)
        }

        // The outermost array dimension is always known statically,
        // so `length` resolves to a constant at lowering time, the
        // same way `sizeof` does -- there is no dynamic array-length
        // header stored alongside the elements at runtime.
        ExprKind::Length(e) => {
            let len = *e.ty().dims.last().expect("'length' target is an array");
            SimNode::ConstUInt(len)
        }

        ExprKind::Return(value) => SimNode::Return(value.as_ref().map(|v| lower_expr(program, arena, v))),
        ExprKind::Break => SimNode::Break,

        ExprKind::IfThenElse { cond, if_true, if_false } => {
            let cond = lower_expr(program, arena, cond);
            let if_true = lower_expr(program, arena, if_true);
            let if_false = if_false.as_ref().map(|e| lower_expr(program, arena, e));
            SimNode::IfThenElse { cond, if_true, if_false }
        }

        ExprKind::While { cond, body } => {
            let cond = lower_expr(program, arena, cond);
            let body = lower_expr(program, arena, body);
            SimNode::While { cond, body }
        }

        ExprKind::Foreach { head, iter_target, body, .. } => {
            let elem_ty = head.ty().one_dim_lower();
            let elem_size = program.size_of(&elem_ty);
            let len = *head.ty().dims.last().expect("'foreach' target is an array");
            let elem_offset = match iter_target.expect("foreach target resolved before lowering") {
                VarTarget::Local { offset } => offset,
                _ => unreachable!("foreach iteration variable is always a local"),
            };
            let head = lower_expr(program, arena, head);
            let body = lower_expr(program, arena, body);
            SimNode::Foreach { head, elem_offset, elem_size, len, body }
        }

        ExprKind::TryCatch { try_this, catch_that } => {
            let try_this = lower_expr(program, arena, try_this);
            let catch_that = lower_expr(program, arena, catch_that);
            SimNode::TryCatch { try_this, catch_that }
        }

        ExprKind::Let(vars, body) => {
            let inits = vars
                .iter()
                .map(|v| {
                    let offset = v.stack_offset.expect("let variable offset resolved before lowering");
                    let init = v.init.as_ref().expect("let variable always has an initializer by the time it's lowered");
                    (offset, lower_expr(program, arena, init))
                })
                .collect();
            let body = lower_expr(program, arena, body);
            SimNode::Let { inits, body }
        }

        ExprKind::Block(items) => {
            let items = items.iter().map(|it| lower_expr(program, arena, it)).collect();
            SimNode::Block(items)
        }
    };
    push(arena, node)
}
