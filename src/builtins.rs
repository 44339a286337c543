// Default operator and library function registration: a small fixed
// builtin set, no user-defined operators.
//
// Grounded in module_builtin_runtime.cpp's addExtern<DAS_BIND_FUN(...)>
// registration: every builtin is added to the Program as an ordinary
// Function (so overload resolution treats it exactly like user code)
// and then wired to a native Rust implementation by name and argument
// types, rather than carrying a lowered body.

use crate::ast::{Function, Variable};
use crate::error::SemanticError;
use crate::interp::{NativeFn, Value};
use crate::loc::SourceLoc;
use crate::program::Program;
use crate::types::{Base, TypeDecl};

fn t(base: Base) -> TypeDecl {
    TypeDecl::simple(base, SourceLoc::synthetic())
}

fn arg(name: &str, base: Base) -> Variable {
    Variable::new(name.to_string(), t(base), None, SourceLoc::synthetic())
}

fn reg(program: &mut Program, name: &str, args: Vec<Variable>, result: Base) -> Result<(), SemanticError> {
    let f = Function {
        name: name.to_string(),
        arguments: args,
        result: t(result),
        body: None,
        built_in: true,
        at: SourceLoc::synthetic(),
        index: 0,
        total_stack_size: 0,
    };
    program.add_function(f)?;
    Ok(())
}

// Registers the fixed builtin set into `program`. Must run before
// `builder::build` parses user code, so user `defun`s can overload
// these names (the resolver's ambiguity check still applies).
pub fn register_builtins(program: &mut Program) -> Result<(), SemanticError> {
    for base in [Base::Int, Base::UInt, Base::Float] {
        for op in ["+", "-", "*", "/", "%"] {
            reg(program, op, vec![arg("a", base), arg("b", base)], base)?;
        }
        for op in ["<", "<=", ">", ">=", "==", "!="] {
            reg(program, op, vec![arg("a", base), arg("b", base)], Base::Bool)?;
        }
        reg(program, "-", vec![arg("a", base)], base)?;
    }
    for op in ["==", "!="] {
        reg(program, op, vec![arg("a", Base::Bool), arg("b", Base::Bool)], Base::Bool)?;
    }
    for op in ["&&", "||"] {
        reg(program, op, vec![arg("a", Base::Bool), arg("b", Base::Bool)], Base::Bool)?;
    }
    reg(program, "!", vec![arg("a", Base::Bool)], Base::Bool)?;

    for base in [Base::Bool, Base::Int, Base::UInt, Base::Float] {
        reg(program, "?", vec![arg("c", Base::Bool), arg("a", base), arg("b", base)], base)?;
    }

    for base in [Base::Int, Base::UInt, Base::Float, Base::Bool, Base::String] {
        reg(program, "print", vec![arg("a", base)], Base::Void)?;
    }

    Ok(())
}

macro_rules! num_binop {
    ($name:ident, $pat:ident, $op:tt) => {
        fn $name(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
            match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a $op b)),
                (Value::UInt(a), Value::UInt(b)) => Ok(Value::UInt(a $op b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a $op b)),
                _ => Err(crate::error::RuntimeFault::HostError(format!("{} expects matching numeric operands", stringify!($pat)))),
            }
        }
    };
}

num_binop!(native_add, add, +);
num_binop!(native_sub, sub, -);
num_binop!(native_mul, mul, *);

fn native_div(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(crate::error::RuntimeFault::HostError("division by zero".into()));
            }
            Ok(Value::Int(a / b))
        }
        (Value::UInt(a), Value::UInt(b)) => {
            if *b == 0 {
                return Err(crate::error::RuntimeFault::HostError("division by zero".into()));
            }
            Ok(Value::UInt(a / b))
        }
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
        _ => Err(crate::error::RuntimeFault::HostError("/ expects matching numeric operands".into())),
    }
}

fn native_rem(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(crate::error::RuntimeFault::HostError("division by zero".into()));
            }
            Ok(Value::Int(a % b))
        }
        (Value::UInt(a), Value::UInt(b)) => {
            if *b == 0 {
                return Err(crate::error::RuntimeFault::HostError("division by zero".into()));
            }
            Ok(Value::UInt(a % b))
        }
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a % b)),
        _ => Err(crate::error::RuntimeFault::HostError("% expects matching numeric operands".into())),
    }
}

fn native_neg(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match &args[0] {
        Value::Int(a) => Ok(Value::Int(-a)),
        Value::UInt(a) => Ok(Value::UInt(a.wrapping_neg())),
        Value::Float(a) => Ok(Value::Float(-a)),
        _ => Err(crate::error::RuntimeFault::HostError("unary - expects a number".into())),
    }
}

macro_rules! num_cmp {
    ($name:ident, $op:tt) => {
        fn $name(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
            let r = match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) => a $op b,
                (Value::UInt(a), Value::UInt(b)) => a $op b,
                (Value::Float(a), Value::Float(b)) => a $op b,
                (Value::Bool(a), Value::Bool(b)) => a $op b,
                _ => return Err(crate::error::RuntimeFault::HostError("comparison expects matching operands".into())),
            };
            Ok(Value::Bool(r))
        }
    };
}

num_cmp!(native_lt, <);
num_cmp!(native_le, <=);
num_cmp!(native_gt, >);
num_cmp!(native_ge, >=);
num_cmp!(native_eq, ==);
num_cmp!(native_ne, !=);

fn native_and(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match (&args[0], &args[1]) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        _ => Err(crate::error::RuntimeFault::HostError("&& expects bool operands".into())),
    }
}

fn native_or(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match (&args[0], &args[1]) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        _ => Err(crate::error::RuntimeFault::HostError("|| expects bool operands".into())),
    }
}

fn native_not(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match &args[0] {
        Value::Bool(a) => Ok(Value::Bool(!a)),
        _ => Err(crate::error::RuntimeFault::HostError("! expects a bool".into())),
    }
}

fn native_ternary(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match &args[0] {
        Value::Bool(true) => Ok(args[1].clone()),
        Value::Bool(false) => Ok(args[2].clone()),
        _ => Err(crate::error::RuntimeFault::HostError("?: expects a bool condition".into())),
    }
}

fn native_print(args: &[Value]) -> Result<Value, crate::error::RuntimeFault> {
    match &args[0] {
        Value::Int(v) => println!("{}", v),
        Value::UInt(v) => println!("{}", v),
        Value::Float(v) => println!("{}", v),
        Value::Bool(v) => println!("{}", v),
        Value::Str(v) => println!("{}", v),
        other => return Err(crate::error::RuntimeFault::HostError(format!("print does not support {:?}", other))),
    }
    Ok(Value::Void)
}

// Wires every built-in Function to its native implementation by name,
// arity and argument base types. Returns one slot per function in
// `program`, aligned to FunctionId so Context can index it directly.
pub fn natives_table(program: &Program) -> Vec<Option<NativeFn>> {
    program
        .functions()
        .iter()
        .map(|f| {
            if !f.built_in {
                return None;
            }
            let bases: Vec<Base> = f.arguments.iter().map(|a| a.type_.base).collect();
            native_for(&f.name, &bases)
        })
        .collect()
}

fn native_for(name: &str, bases: &[Base]) -> Option<NativeFn> {
    match (name, bases.len()) {
        ("+", 2) => Some(native_add as NativeFn),
        ("-", 2) => Some(native_sub as NativeFn),
        ("*", 2) => Some(native_mul as NativeFn),
        ("/", 2) => Some(native_div as NativeFn),
        ("%", 2) => Some(native_rem as NativeFn),
        ("-", 1) => Some(native_neg as NativeFn),
        ("<", 2) => Some(native_lt as NativeFn),
        ("<=", 2) => Some(native_le as NativeFn),
        (">", 2) => Some(native_gt as NativeFn),
        (">=", 2) => Some(native_ge as NativeFn),
        ("==", 2) => Some(native_eq as NativeFn),
        ("!=", 2) => Some(native_ne as NativeFn),
        ("&&", 2) => Some(native_and as NativeFn),
        ("||", 2) => Some(native_or as NativeFn),
        ("!", 1) => Some(native_not as NativeFn),
        ("?", 3) => Some(native_ternary as NativeFn),
        ("print", 1) => Some(native_print as NativeFn),
        _ => None,
    }
}

