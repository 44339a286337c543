// Translates a `sexpr::Node` tree into a `Program` plus untyped
// `Expr` trees, mirroring the three-pass structure of `ast.cpp`'s
// `parse()`: structures are registered first, then globals, then
// function signatures, and only then are function bodies parsed --
// so two functions can call each other regardless of declaration
// order. Types referenced by a structure or global must already be
// declared (the same restriction `ast.cpp` enforces by not re-running
// the structures pass).
//
// Grammar (each top-level form is one of):
//   (struct NAME (TYPE-DECL field)...)
//   (let TYPE-DECL name [init])
//   (defun (RESULT-DECL name) (ARG-DECL argname [default])... body)
//
// A TYPE-DECL is `base [* | &] [dim...]` where `base` is a type name
// or a previously declared structure name, `*` marks a pointer, `&`
// marks a reference, and each `dim` is a bare unsigned integer giving
// an array dimension (innermost last). Dims are written between the
// base and the name they declare -- `(int 3 a)` declares `int a[3]`,
// keeping the trailing position free for a scalar initializer
// (`(int a 0)`), since a single grammar can't tell a dim from an init
// by position alone.
//
// Expression forms:
//   <int|uint|float|bool|string|null literal>
//   name
//   (block e...)
//   (let ((TYPE-DECL name [init])...) body)
//   (. value field)
//   (at value index)
//   (if cond then [else])
//   (while cond body)
//   (foreach name array body)
//   (try body catch)
//   (return [e])
//   (break)
//   (new StructName)
//   (sizeof TYPE-DECL)
//   (length array-expr)
//   (name arg...)          -- Call, unless `name` is an operator
//                             symbol (non-alphanumeric), in which case
//                             it lowers to Op1/Op2/Op3 by arity.

use crate::ast::{Expr, ExprKind, Function, Variable};
use crate::error::{Error, ParseError};
use crate::loc::SourceLoc;
use crate::program::Program;
use crate::sexpr::{Atom, Node};
use crate::types::{Base, FieldDecl, Structure, TypeDecl};

pub fn build(root: &Node) -> Result<Program, Error> {
    let mut program = Program::new();
    let forms = root.expect_list().map_err(Error::from)?;

    for form in forms {
        if form.head() == Some("struct") {
            build_structure(&mut program, form)?;
        }
    }
    program.assign_structure_offsets();

    for form in forms {
        if form.head() == Some("let") {
            build_global(&mut program, form)?;
        }
    }

    // pass A: register every function's signature with no body, so
    // later bodies can call forward- or mutually-recursive functions.
    let mut defuns = Vec::new();
    for form in forms {
        if form.head() == Some("defun") {
            let (func, body_form) = build_signature(&program, form)?;
            let id = program.add_function(func).map_err(Error::from)?;
            defuns.push((id, body_form));
        }
    }

    // pass B: parse bodies now that every signature is visible.
    for (id, body_form) in defuns {
        let args = program.function(id).arguments.clone();
        let body = build_expr(&program, &args, body_form)?;
        program.function_mut(id).body = Some(body);
    }

    Ok(program)
}

fn build_structure(program: &mut Program, form: &Node) -> Result<(), Error> {
    let items = form.expect_list()?;
    let name = items[1].expect_name()?.to_string();
    let mut structure = Structure::new(name);
    for field_form in &items[2..] {
        let decl = field_form.expect_list()?;
        let field_name = decl.last().ok_or_else(|| ParseError::new(field_form.loc().clone(), "empty field declaration"))?.expect_name()?.to_string();
        let type_ = parse_type_decl(program, decl, 0)?;
        structure.fields.push(FieldDecl { name: field_name, type_, offset: 0 });
    }
    program.add_structure(structure, form.loc()).map_err(Error::from)?;
    Ok(())
}

fn build_global(program: &mut Program, form: &Node) -> Result<(), Error> {
    let items = form.expect_list()?;
    let var = parse_variable(program, &[], &items[1..], form.loc())?;
    program.add_global(var).map_err(Error::from)?;
    Ok(())
}

// Parses `(RESULT-DECL name) (ARG-DECL argname [default])... body` and
// returns the Function (body left `None`) plus the unparsed body Node.
fn build_signature<'a>(program: &Program, form: &'a Node) -> Result<(Function, &'a Node), Error> {
    let items = form.expect_list()?;
    if items.len() < 3 {
        return Err(ParseError::new(form.loc().clone(), "malformed defun").into());
    }
    let header = items[1].expect_list()?;
    let name = header.last().ok_or_else(|| ParseError::new(items[1].loc().clone(), "missing function name"))?.expect_name()?.to_string();
    let result = parse_type_decl(program, header, 0)?;

    let mut arguments = Vec::new();
    for arg_form in &items[2..items.len() - 1] {
        let arg_items = arg_form.expect_list()?;
        arguments.push(parse_variable(program, &[], arg_items, arg_form.loc())?);
    }
    let body_form = &items[items.len() - 1];

    Ok((
        Function {
            name,
            arguments,
            result,
            body: None,
            built_in: false,
            at: form.loc().clone(),
            index: 0,
            total_stack_size: 0,
        },
        body_form,
    ))
}

// Parses a flat declaration list `[base, marker_or_dim..., name, [init]]`.
// `trailing` counts extra elements (beyond the implicit name) to
// exclude from the dimension scan -- 1 when the declaration carries an
// initializer.
fn parse_type_decl(program: &Program, items: &[Node], trailing: usize) -> Result<TypeDecl, ParseError> {
    let at = items[0].loc().clone();
    let base_name = items[0].expect_name()?;
    let mut type_ = resolve_base(program, base_name, &at)?;

    let dim_end = items.len() - 1 - trailing;
    let mut i = 1;
    if i < dim_end {
        if let Some(marker) = items[i].as_name() {
            if marker == "*" {
                type_.base = Base::Pointer;
                i += 1;
            } else if marker == "&" {
                type_.ref_ = true;
                i += 1;
            }
        }
    }
    while i < dim_end {
        type_.dims.push(expect_dim(&items[i])?);
        i += 1;
    }
    Ok(type_)
}

// The reader classifies a bare digit word as an Int/UInt atom, not a
// Name, so a dimension can't be read with Node::expect_name.
fn expect_dim(node: &Node) -> Result<u32, ParseError> {
    match node {
        Node::Atom(Atom::Int(v), _) if *v >= 0 => Ok(*v as u32),
        Node::Atom(Atom::UInt(v), _) => Ok(*v),
        Node::Atom(Atom::Name(n), at) => n.parse().map_err(|_| ParseError::new(at.clone(), format!("expected array dimension, got '{}'", n))),
        _ => Err(ParseError::new(node.loc().clone(), "expected an array dimension")),
    }
}

fn resolve_base(program: &Program, name: &str, at: &SourceLoc) -> Result<TypeDecl, ParseError> {
    let base = match name {
        "void" => Some(Base::Void),
        "bool" => Some(Base::Bool),
        "int" => Some(Base::Int),
        "uint" => Some(Base::UInt),
        "int2" => Some(Base::Int2),
        "int3" => Some(Base::Int3),
        "int4" => Some(Base::Int4),
        "uint2" => Some(Base::UInt2),
        "uint3" => Some(Base::UInt3),
        "uint4" => Some(Base::UInt4),
        "float" => Some(Base::Float),
        "float2" => Some(Base::Float2),
        "float3" => Some(Base::Float3),
        "float4" => Some(Base::Float4),
        "string" => Some(Base::String),
        _ => None,
    };
    if let Some(base) = base {
        return Ok(TypeDecl::simple(base, at.clone()));
    }
    if let Some(id) = program.find_structure(name) {
        return Ok(TypeDecl::structure(id, at.clone()));
    }
    Err(ParseError::new(at.clone(), format!("unknown type '{}'", name)))
}

fn parse_variable(program: &Program, _locals: &[Variable], items: &[Node], at: &SourceLoc) -> Result<Variable, Error> {
    if items.is_empty() {
        return Err(ParseError::new(at.clone(), "empty variable declaration").into());
    }
    let last = &items[items.len() - 1];
    if last.as_name().is_some() {
        // no initializer: [... name]
        let type_ = parse_type_decl(program, items, 0)?;
        let name = last.expect_name()?.to_string();
        Ok(Variable::new(name, type_, None, at.clone()))
    } else {
        // initializer present: [... name init]
        if items.len() < 2 {
            return Err(ParseError::new(at.clone(), "malformed initialized declaration").into());
        }
        let name_node = &items[items.len() - 2];
        let name = name_node.expect_name()?.to_string();
        let type_ = parse_type_decl(program, items, 1)?;
        let init = build_expr(program, &[], last)?;
        Ok(Variable::new(name, type_, Some(init), at.clone()))
    }
}

const OP_CHARS: &str = "+-*/%<>=!&|^~?";

fn looks_like_operator(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| OP_CHARS.contains(c))
}

fn build_expr(program: &Program, args: &[Variable], node: &Node) -> Result<Expr, Error> {
    let at = node.loc().clone();
    match node {
        Node::Atom(atom, at) => Ok(expr_from_atom(atom, at, args)),
        Node::List(items, _) => {
            if items.is_empty() {
                return Ok(Expr::new(at, ExprKind::Block(Vec::new())));
            }
            let head = items[0].as_name().unwrap_or("");
            match head {
                "block" => {
                    let body = items[1..].iter().map(|n| build_expr(program, args, n)).collect::<Result<Vec<_>, _>>()?;
                    Ok(Expr::new(at, ExprKind::Block(body)))
                }
                "let" => build_let(program, args, &at, items),
                "." => {
                    if items.len() != 3 {
                        return Err(ParseError::new(at, "(. value field) expects exactly two operands").into());
                    }
                    let value = build_expr(program, args, &items[1])?;
                    let name = items[2].expect_name()?.to_string();
                    Ok(Expr::new(at, ExprKind::Field { value, name, field_offset: None }))
                }
                "at" => {
                    if items.len() != 3 {
                        return Err(ParseError::new(at, "(at value index) expects exactly two operands").into());
                    }
                    let value = build_expr(program, args, &items[1])?;
                    let index = build_expr(program, args, &items[2])?;
                    Ok(Expr::new(at, ExprKind::At { value, index }))
                }
                "if" => {
                    if items.len() < 3 || items.len() > 4 {
                        return Err(ParseError::new(at, "(if cond then [else]) malformed").into());
                    }
                    let cond = build_expr(program, args, &items[1])?;
                    let if_true = build_expr(program, args, &items[2])?;
                    let if_false = if items.len() == 4 { Some(build_expr(program, args, &items[3])?) } else { None };
                    Ok(Expr::new(at, ExprKind::IfThenElse { cond, if_true, if_false }))
                }
                "while" => {
                    if items.len() != 3 {
                        return Err(ParseError::new(at, "(while cond body) malformed").into());
                    }
                    let cond = build_expr(program, args, &items[1])?;
                    let body = build_expr(program, args, &items[2])?;
                    Ok(Expr::new(at, ExprKind::While { cond, body }))
                }
                "foreach" => {
                    if items.len() != 4 {
                        return Err(ParseError::new(at, "(foreach name array body) malformed").into());
                    }
                    let iter_name = items[1].expect_name()?.to_string();
                    let head_e = build_expr(program, args, &items[2])?;
                    let body = build_expr(program, args, &items[3])?;
                    Ok(Expr::new(at, ExprKind::Foreach { head: head_e, iter_name, iter_target: None, body }))
                }
                "try" => {
                    if items.len() != 3 {
                        return Err(ParseError::new(at, "(try body catch) malformed").into());
                    }
                    let try_this = build_expr(program, args, &items[1])?;
                    let catch_that = build_expr(program, args, &items[2])?;
                    Ok(Expr::new(at, ExprKind::TryCatch { try_this, catch_that }))
                }
                "return" => {
                    let value = if items.len() == 2 { Some(build_expr(program, args, &items[1])?) } else { None };
                    Ok(Expr::new(at, ExprKind::Return(value)))
                }
                "break" => Ok(Expr::new(at, ExprKind::Break)),
                "=>" => {
                    if items.len() != 2 {
                        return Err(ParseError::new(at, "(=> pointer) expects exactly one operand").into());
                    }
                    let inner = build_expr(program, args, &items[1])?;
                    Ok(Expr::new(at, ExprKind::Ptr2Ref(inner)))
                }
                "new" => {
                    if items.len() != 2 {
                        return Err(ParseError::new(at, "(new StructName) malformed").into());
                    }
                    let name = items[1].expect_name()?;
                    let id = program.find_structure(name).ok_or_else(|| ParseError::new(items[1].loc().clone(), format!("unknown structure '{}'", name)))?;
                    Ok(Expr::new(at, ExprKind::New { structure: id }))
                }
                "sizeof" => {
                    if items.len() != 2 {
                        return Err(ParseError::new(at, "(sizeof type|expr) malformed").into());
                    }
                    if let Some(n) = items[1].as_name() {
                        if let Ok(of_type) = resolve_base(program, n, items[1].loc()) {
                            return Ok(Expr::new(at, ExprKind::SizeOf { subexpr: None, of_type: Some(of_type) }));
                        }
                    }
                    let sub = build_expr(program, args, &items[1])?;
                    Ok(Expr::new(at, ExprKind::SizeOf { subexpr: Some(sub), of_type: None }))
                }
                "length" => {
                    if items.len() != 2 {
                        return Err(ParseError::new(at, "(length array-expr) expects exactly one operand").into());
                    }
                    let sub = build_expr(program, args, &items[1])?;
                    Ok(Expr::new(at, ExprKind::Length(sub)))
                }
                name if looks_like_operator(name) => {
                    let operands = items[1..].iter().map(|n| build_expr(program, args, n)).collect::<Result<Vec<_>, _>>()?;
                    match operands.len() {
                        1 => {
                            let mut it = operands.into_iter();
                            Ok(Expr::new(at, ExprKind::Op1 { op: name.to_string(), subexpr: it.next().unwrap(), func: None }))
                        }
                        2 => {
                            let mut it = operands.into_iter();
                            let left = it.next().unwrap();
                            let right = it.next().unwrap();
                            Ok(Expr::new(at, ExprKind::Op2 { op: name.to_string(), left, right, func: None }))
                        }
                        3 => {
                            let mut it = operands.into_iter();
                            let cond = it.next().unwrap();
                            let left = it.next().unwrap();
                            let right = it.next().unwrap();
                            Ok(Expr::new(at, ExprKind::Op3 { op: name.to_string(), cond, left, right, func: None }))
                        }
                        n => Err(ParseError::new(at, format!("operator '{}' called with {} operands", name, n)).into()),
                    }
                }
                "" => Err(ParseError::new(at, "empty call head").into()),
                name => {
                    let call_args = items[1..].iter().map(|n| build_expr(program, args, n)).collect::<Result<Vec<_>, _>>()?;
                    Ok(Expr::new(at, ExprKind::Call { name: name.to_string(), args: call_args, func: None }))
                }
            }
        }
    }
}

fn build_let(program: &Program, args: &[Variable], at: &SourceLoc, items: &[Node]) -> Result<Expr, Error> {
    if items.len() != 3 {
        return Err(ParseError::new(at.clone(), "(let ((decl...)...) body) malformed").into());
    }
    let decls = items[1].expect_list()?;
    let mut vars = Vec::new();
    for decl in decls {
        let decl_items = decl.expect_list()?;
        vars.push(parse_variable(program, args, decl_items, decl.loc())?);
    }
    let body = build_expr(program, args, &items[2])?;
    Ok(Expr::new(at.clone(), ExprKind::Let(vars, body)))
}

fn expr_from_atom(atom: &Atom, at: &SourceLoc, args: &[Variable]) -> Expr {
    let kind = match atom {
        Atom::Int(v) => ExprKind::Int(*v),
        Atom::UInt(v) => ExprKind::UInt(*v),
        Atom::Float(v) => ExprKind::Float(*v),
        Atom::Str(v) => ExprKind::Str(v.clone()),
        Atom::Bool(v) => ExprKind::Bool(*v),
        Atom::NullPtr => ExprKind::NullPtr,
        Atom::Name(n) => {
            let target = args.iter().position(|a| &a.name == n).map(|i| crate::ast::VarTarget::Argument { index: i as u32 });
            ExprKind::Var { name: n.clone(), target }
        }
    };
    Expr::new(at.clone(), kind)
}
