// Type inference and name resolution.
//
// Ported from ast.cpp's Expr*::inferType methods: a single bottom-up
// pass per function body, threading a stack-top cursor and a scope
// stack of locals (env::Locals). Structures and globals are resolved
// first so function bodies can reference either regardless of where
// in the source they were declared; function *signatures* are all
// registered by builder::build before any body is inferred, so
// forward and mutually-recursive calls resolve normally.

use crate::ast::{Expr, ExprKind, Variable, VarTarget};
use crate::env::Locals;
use crate::error::SemanticError;
use crate::loc::SourceLoc;
use crate::program::{FunctionId, Program};
use crate::types::{Base, TypeDecl};

// sizeof(SimNode*) + sizeof(__m128*) + sizeof(__m128) on a 64-bit host
// in the original layout: return-node pointer, a pointer to the
// caller's result register, and the register itself.
const STACK_PREAMBLE_SIZE: usize = 32;

struct Ctx<'p> {
    program: &'p Program,
    locals: Locals,
    stack_top: usize,
    args: Vec<Variable>,
    result: TypeDecl,
    loop_depth: u32,
}

pub fn infer_types(program: &mut Program) -> Result<(), SemanticError> {
    infer_globals(program)?;
    infer_argument_defaults(program)?;
    infer_functions(program)?;
    Ok(())
}

// Infers the type of every trailing-argument default, the same way
// infer_globals infers a global's initializer: in an empty scope, with
// no arguments or locals of its own in view. resolve_overload splices
// these in verbatim for an omitted trailing call argument, so by the
// time any call site reaches it, it must already carry a resolved
// type and match its formal's declared one.
fn infer_argument_defaults(program: &mut Program) -> Result<(), SemanticError> {
    let count = program.functions().len();
    for i in 0..count as u32 {
        if program.function(i).built_in {
            continue;
        }
        let arg_count = program.function(i).arguments.len();
        for j in 0..arg_count {
            let mut init = program.function(i).arguments[j].init.clone();
            if let Some(init_expr) = &mut init {
                let mut ctx = Ctx { program: &*program, locals: Locals::new(), stack_top: 0, args: Vec::new(), result: TypeDecl::simple(Base::Void, SourceLoc::synthetic()), loop_depth: 0 };
                infer_expr(&mut ctx, init_expr)?;
                let formal = &program.function(i).arguments[j];
                if !formal.type_.is_same(init_expr.ty(), false) {
                    return Err(SemanticError::new(init_expr.at.clone(), format!("argument '{}' default type mismatch: expected {}, got {}", formal.name, formal.type_, init_expr.ty())));
                }
            }
            program.function_mut(i).arguments[j].init = init;
        }
    }
    Ok(())
}

fn infer_globals(program: &mut Program) -> Result<(), SemanticError> {
    let count = program.globals().len();
    for i in 0..count as u32 {
        let mut init = program.global(i).init.clone();
        if let Some(init_expr) = &mut init {
            let mut ctx = Ctx { program: &*program, locals: Locals::new(), stack_top: 0, args: Vec::new(), result: TypeDecl::simple(Base::Void, SourceLoc::synthetic()), loop_depth: 0 };
            infer_expr(&mut ctx, init_expr)?;
            let declared = program.global(i).type_.clone();
            if !declared.is_same(init_expr.ty(), false) {
                return Err(SemanticError::new(init_expr.at.clone(), format!("global '{}' initializer type mismatch: expected {}, got {}", program.global(i).name, declared, init_expr.ty())));
            }
        }
        program.globals_mut()[i as usize].init = init;
    }
    Ok(())
}

fn infer_functions(program: &mut Program) -> Result<(), SemanticError> {
    let count = program.functions().len();
    for i in 0..count as u32 {
        if program.function(i).built_in {
            continue;
        }
        let mut body = program.function_mut(i).body.take().ok_or_else(|| SemanticError::new(program.function(i).at.clone(), "function has no body"))?;
        let args = program.function(i).arguments.clone();
        let result = program.function(i).result.clone();
        let mut ctx = Ctx { program: &*program, locals: Locals::new(), stack_top: STACK_PREAMBLE_SIZE, args, result: result.clone(), loop_depth: 0 };
        infer_expr(&mut ctx, &mut body)?;
        if !result.is_void() && !result.is_same(body.ty(), false) {
            return Err(SemanticError::new(body.at.clone(), format!("function '{}' body type {} does not match declared result {}", program.function(i).name, body.ty(), result)));
        }
        // A function whose body ends in a bare field/index expression
        // (no explicit `return`) still needs its ref dereferenced into
        // a plain value before it can be handed back to the caller.
        if !result.is_ref() {
            body = auto_deref(body, false);
        }
        let total_stack_size = ctx.stack_top;
        let f = program.function_mut(i);
        f.body = Some(body);
        f.total_stack_size = total_stack_size;
    }
    Ok(())
}

fn alloc_local(stack_top: &mut usize, size: usize) -> usize {
    let offset = *stack_top;
    let rounded = (size + 15) & !15;
    *stack_top += rounded.max(16);
    offset
}

// Zero value for a scalar type declared with no initializer. Structure
// and array lets must supply their own initializer (usually `new`) --
// there is no implicit storage for them to default-construct into.
fn default_value(t: &TypeDecl) -> Expr {
    let at = t.at.clone();
    let kind = match t.base {
        Base::Bool => ExprKind::Bool(false),
        Base::Int => ExprKind::Int(0),
        Base::UInt => ExprKind::UInt(0),
        Base::Float => ExprKind::Float(0.0),
        Base::String => ExprKind::Str(String::new()),
        Base::Pointer => ExprKind::NullPtr,
        _ => ExprKind::Int(0),
    };
    Expr::new_typed(at, kind, t.clone())
}

fn auto_deref(e: Expr, want_ref: bool) -> Expr {
    if !want_ref && e.ty().is_ref() {
        let ty = e.ty().clone().without_ref();
        let at = e.at.clone();
        Expr::new_typed(at, ExprKind::Ref2Value(e), ty)
    } else {
        e
    }
}

impl Expr {
    fn new_typed(at: SourceLoc, kind: ExprKind, ty: TypeDecl) -> Expr {
        Expr { at, type_: Some(ty), kind: Box::new(kind) }
    }
}

fn resolve_overload(program: &Program, name: &str, operands: &[Expr], at: &SourceLoc) -> Result<(FunctionId, Vec<Expr>, TypeDecl), SemanticError> {
    let arg_types: Vec<TypeDecl> = operands.iter().map(|e| e.ty().clone()).collect();
    let fid = program.find_matching_function(name, &arg_types, at)?;
    let f = program.function(fid);
    let mut final_args = Vec::with_capacity(f.arguments.len());
    for (i, formal) in f.arguments.iter().enumerate() {
        if i < operands.len() {
            final_args.push(auto_deref(operands[i].clone(), formal.type_.is_ref()));
        } else {
            let init = formal.init.clone().expect("overload matching guarantees a default for missing trailing args");
            final_args.push(init);
        }
    }
    Ok((fid, final_args, f.result.clone()))
}

fn infer_expr(ctx: &mut Ctx, expr: &mut Expr) -> Result<(), SemanticError> {
    let at = expr.at.clone();
    let ty = match &mut *expr.kind {
        ExprKind::Bool(_) => TypeDecl::simple(Base::Bool, at.clone()),
        ExprKind::Int(_) => TypeDecl::simple(Base::Int, at.clone()),
        ExprKind::UInt(_) => TypeDecl::simple(Base::UInt, at.clone()),
        ExprKind::Float(_) => TypeDecl::simple(Base::Float, at.clone()),
        ExprKind::Str(_) => TypeDecl::simple(Base::String, at.clone()),
        ExprKind::NullPtr => TypeDecl { base: Base::Pointer, structure: None, dims: Vec::new(), ref_: false, at: at.clone() },

        ExprKind::Var { name, target } => {
            if let Some(idx) = ctx.args.iter().position(|a| &a.name == name) {
                *target = Some(VarTarget::Argument { index: idx as u32 });
                ctx.args[idx].type_.clone()
            } else if let Some(t) = ctx.locals.find_target(name) {
                *target = Some(t);
                // locals are always addressable, regardless of their
                // declared type's own ref marker -- unlike an argument,
                // which carries whatever ref-ness its declaration gave it.
                ctx.locals.find(name).unwrap().type_.clone().as_ref()
            } else if let Some(gid) = ctx.program.find_global(name) {
                *target = Some(VarTarget::Global { index: gid });
                ctx.program.global(gid).type_.clone().as_ref()
            } else {
                return Err(SemanticError::new(at, format!("undefined variable '{}'", name)));
            }
        }

        ExprKind::Field { value, name, field_offset } => {
            infer_expr(ctx, value)?;
            let mut vty = value.ty().clone();
            if vty.is_pointer() {
                let inner = vty.structure;
                let new_ty = TypeDecl { base: Base::Structure, structure: inner, dims: Vec::new(), ref_: true, at: at.clone() };
                let old = std::mem::replace(value, Expr::new(at.clone(), ExprKind::NullPtr));
                *value = Expr::new_typed(at.clone(), ExprKind::Ptr2Ref(old), new_ty.clone());
                vty = new_ty;
            }
            if vty.base != Base::Structure {
                return Err(SemanticError::new(at, format!("'.' requires a structure, got {}", vty)));
            }
            let sid = vty.structure.ok_or_else(|| SemanticError::new(at.clone(), "structure type missing its id"))?;
            let field = ctx.program.structure(sid).find_field(name).ok_or_else(|| SemanticError::new(at.clone(), format!("no field '{}' on structure '{}'", name, ctx.program.structure(sid).name)))?;
            *field_offset = Some(field.offset);
            field.type_.clone().as_ref()
        }

        ExprKind::At { value, index } => {
            infer_expr(ctx, value)?;
            infer_expr(ctx, index)?;
            if !index.ty().is_index() {
                return Err(SemanticError::new(at, format!("array index must be int or uint, got {}", index.ty())));
            }
            if !value.ty().is_array() {
                return Err(SemanticError::new(at, format!("'at' requires an array type, got {}", value.ty())));
            }
            value.ty().one_dim_lower()
        }

        ExprKind::Call { name, args, func } => {
            for a in args.iter_mut() {
                infer_expr(ctx, a)?;
            }
            let (fid, final_args, result) = resolve_overload(ctx.program, name, args, &at)?;
            *args = final_args;
            *func = Some(fid);
            result
        }

        ExprKind::Op1 { op, subexpr, func } => {
            infer_expr(ctx, subexpr)?;
            let operands = [subexpr.clone()];
            let (fid, mut final_args, result) = resolve_overload(ctx.program, op, &operands, &at)?;
            *subexpr = final_args.remove(0);
            *func = Some(fid);
            result
        }

        ExprKind::Op2 { op, left, right, func } => {
            infer_expr(ctx, left)?;
            infer_expr(ctx, right)?;
            let operands = [left.clone(), right.clone()];
            let (fid, mut final_args, result) = resolve_overload(ctx.program, op, &operands, &at)?;
            *right = final_args.remove(1);
            *left = final_args.remove(0);
            *func = Some(fid);
            result
        }

        ExprKind::Op3 { op, cond, left, right, func } => {
            infer_expr(ctx, cond)?;
            infer_expr(ctx, left)?;
            infer_expr(ctx, right)?;
            let operands = [cond.clone(), left.clone(), right.clone()];
            let (fid, mut final_args, result) = resolve_overload(ctx.program, op, &operands, &at)?;
            *right = final_args.remove(2);
            *left = final_args.remove(1);
            *cond = final_args.remove(0);
            *func = Some(fid);
            result
        }

        ExprKind::Ref2Value(inner) => {
            infer_expr(ctx, inner)?;
            inner.ty().clone().without_ref()
        }

        ExprKind::Ptr2Ref(inner) => {
            infer_expr(ctx, inner)?;
            if !inner.ty().is_pointer() {
                return Err(SemanticError::new(at, "ptr2ref requires a pointer"));
            }
            TypeDecl { base: Base::Structure, structure: inner.ty().structure, dims: Vec::new(), ref_: true, at: at.clone() }
        }

        ExprKind::New { structure } => TypeDecl::pointer_to(*structure, at.clone()),

        ExprKind::SizeOf { subexpr, .. } => {
            if let Some(e) = subexpr {
                infer_expr(ctx, e)?;
            }
            TypeDecl::simple(Base::UInt, at.clone())
        }

        ExprKind::Length(e) => {
            infer_expr(ctx, e)?;
            if !e.ty().is_array() {
                return Err(SemanticError::new(at.clone(), format!("'length' requires an array, got {}", e.ty())));
            }
            TypeDecl::simple(Base::UInt, at.clone())
        }

        ExprKind::Return(value) => {
            match value {
                Some(e) => {
                    infer_expr(ctx, e)?;
                    if !ctx.result.is_same(e.ty(), false) {
                        return Err(SemanticError::new(at.clone(), format!("return type {} does not match function result {}", e.ty(), ctx.result)));
                    }
                    let want_ref = ctx.result.is_ref();
                    let old = std::mem::replace(e, Expr::new(at.clone(), ExprKind::NullPtr));
                    *e = auto_deref(old, want_ref);
                }
                None => {
                    if !ctx.result.is_void() {
                        return Err(SemanticError::new(at.clone(), "missing return value"));
                    }
                }
            }
            TypeDecl::simple(Base::Void, at.clone())
        }

        ExprKind::Break => {
            if ctx.loop_depth == 0 {
                return Err(SemanticError::new(at.clone(), "'break' outside of a loop"));
            }
            TypeDecl::simple(Base::Void, at.clone())
        }

        ExprKind::IfThenElse { cond, if_true, if_false } => {
            infer_expr(ctx, cond)?;
            if !cond.ty().is_simple_of(Base::Bool) {
                return Err(SemanticError::new(at.clone(), format!("'if' condition must be bool, got {}", cond.ty())));
            }
            infer_expr(ctx, if_true)?;
            match if_false {
                Some(e) => {
                    infer_expr(ctx, e)?;
                    if !if_true.ty().is_same(e.ty(), false) {
                        return Err(SemanticError::new(at.clone(), "'if' branches have different types"));
                    }
                    if_true.ty().clone()
                }
                None => TypeDecl::simple(Base::Void, at.clone()),
            }
        }

        ExprKind::While { cond, body } => {
            infer_expr(ctx, cond)?;
            if !cond.ty().is_simple_of(Base::Bool) {
                return Err(SemanticError::new(at.clone(), format!("'while' condition must be bool, got {}", cond.ty())));
            }
            ctx.loop_depth += 1;
            let r = infer_expr(ctx, body);
            ctx.loop_depth -= 1;
            r?;
            TypeDecl::simple(Base::Void, at.clone())
        }

        ExprKind::Foreach { head, iter_name, iter_target, body } => {
            infer_expr(ctx, head)?;
            if !head.ty().is_array() {
                return Err(SemanticError::new(at.clone(), format!("'foreach' requires an array, got {}", head.ty())));
            }
            let elem_ty = head.ty().one_dim_lower();
            let size = ctx.program.size_of(&elem_ty);
            let offset = alloc_local(&mut ctx.stack_top, size);
            let saved = ctx.locals.len();
            ctx.locals.push(iter_name.clone(), elem_ty, offset);
            *iter_target = Some(VarTarget::Local { offset });
            ctx.loop_depth += 1;
            let r = infer_expr(ctx, body);
            ctx.loop_depth -= 1;
            ctx.locals.truncate(saved);
            r?;
            TypeDecl::simple(Base::Void, at.clone())
        }

        ExprKind::TryCatch { try_this, catch_that } => {
            infer_expr(ctx, try_this)?;
            infer_expr(ctx, catch_that)?;
            if !try_this.ty().is_same(catch_that.ty(), false) {
                return Err(SemanticError::new(at.clone(), "'try' and 'catch' branches have different types"));
            }
            try_this.ty().clone()
        }

        ExprKind::Let(vars, body) => {
            let saved = ctx.locals.len();
            for v in vars.iter_mut() {
                match &mut v.init {
                    Some(init) => {
                        infer_expr(ctx, init)?;
                        if !v.type_.is_same(init.ty(), false) {
                            return Err(SemanticError::new(v.at.clone(), format!("let '{}' initializer type mismatch: expected {}, got {}", v.name, v.type_, init.ty())));
                        }
                    }
                    None => {
                        if v.type_.base == Base::Structure || v.type_.is_array() {
                            return Err(SemanticError::new(v.at.clone(), format!("let '{}' of structure or array type needs an initializer", v.name)));
                        }
                        v.init = Some(default_value(&v.type_));
                    }
                }
                let size = ctx.program.size_of(&v.type_);
                let offset = alloc_local(&mut ctx.stack_top, size);
                v.stack_offset = Some(offset);
                ctx.locals.push(v.name.clone(), v.type_.clone(), offset);
            }
            infer_expr(ctx, body)?;
            ctx.locals.truncate(saved);
            body.ty().clone()
        }

        ExprKind::Block(items) => {
            let mut last = TypeDecl::simple(Base::Void, at.clone());
            for item in items.iter_mut() {
                infer_expr(ctx, item)?;
                last = item.ty().clone();
            }
            last
        }
    };
    expr.type_ = Some(ty);
    Ok(())
}
