// microscript: a small statically-typed embedded scripting core.
//
// A host hands `compile` a parsed `sexpr::Node` tree (or its own
// front-end's equivalent -- see sexpr.rs's module comment), gets back
// a fully type-checked `Program`, lowers it once with `simulate`, and
// then calls `invoke` as many times as it likes against the resulting
// `Context`.

pub mod ast;
pub mod builder;
pub mod builtins;
pub mod env;
pub mod error;
pub mod interp;
pub mod loc;
pub mod program;
pub mod resolver;
pub mod sexpr;
pub mod sim;
pub mod types;

pub use error::Error;
pub use interp::{Context, Value};
pub use program::{FunctionId, Program};
pub use sexpr::Node;

// Parses and type-checks a program: builds structures/globals/
// functions from `root`, registers the builtin operator and function
// set alongside them, then runs resolver::infer_types over the whole
// table. Builtins are added after user code so user structures and
// globals are visible to no one but themselves -- operator and
// function names resolve by lookup at inference time, not at parse
// time, so ordering here only affects FunctionId numbering.
pub fn compile(root: &Node) -> Result<Program, Error> {
    log::debug!("compiling program");
    let mut program = builder::build(root)?;
    builtins::register_builtins(&mut program)?;
    resolver::infer_types(&mut program)?;
    log::info!("compiled {} structure(s), {} global(s), {} function(s)", program.structures().len(), program.globals().len(), program.functions().len());
    Ok(program)
}

// Lowers a type-checked Program into an executable node arena and
// wires every builtin Function to its native implementation.
pub fn simulate(program: &Program) -> sim::SimProgram {
    sim::lower_program(program)
}

// Builds a fresh Context (running every global initializer) ready for
// repeated `Context::invoke` calls against `program`/`sim`.
pub fn new_context<'p>(program: &'p Program, sim: &'p sim::SimProgram) -> Result<Context<'p>, error::RuntimeFault> {
    let natives = builtins::natives_table(program);
    Context::new(program, sim, natives)
}
