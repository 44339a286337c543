// Program assembly: symbol tables, structure layout, and overload
// resolution.
//
// Grounded in ast.cpp's Program class: addStructure/addVariable/
// addFunction duplicate checks, the field-offset pass driven from
// inferTypes(), and findMatchingFunctions's positional/ref-matters
// matching. Symbol tables use `indexmap` so iteration stays in
// declaration order -- the original relies on insertion-ordered maps
// for diagnostics and codegen determinism, and nothing here should
// depend on a hash function's incidental order.

use indexmap::IndexMap;

use crate::ast::{Function, Variable};
use crate::error::SemanticError;
use crate::loc::SourceLoc;
use crate::types::{Base, Structure, StructureId, TypeDecl};

pub type FunctionId = u32;
pub type VariableId = u32;

#[derive(Default, Debug)]
pub struct Program {
    structures: Vec<Structure>,
    structures_by_name: IndexMap<String, StructureId>,

    globals: Vec<Variable>,
    globals_by_name: IndexMap<String, VariableId>,

    functions: Vec<Function>,
    functions_by_mangled: IndexMap<String, FunctionId>,
    functions_by_name: IndexMap<String, Vec<FunctionId>>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    // -- structures --

    pub fn add_structure(&mut self, s: Structure, at: &SourceLoc) -> Result<StructureId, SemanticError> {
        if self.structures_by_name.contains_key(&s.name) {
            return Err(SemanticError::new(at.clone(), format!("structure '{}' already declared", s.name)));
        }
        let id = self.structures.len() as StructureId;
        self.structures_by_name.insert(s.name.clone(), id);
        self.structures.push(s);
        Ok(id)
    }

    pub fn structure(&self, id: StructureId) -> &Structure {
        &self.structures[id as usize]
    }

    pub fn structure_mut(&mut self, id: StructureId) -> &mut Structure {
        &mut self.structures[id as usize]
    }

    pub fn find_structure(&self, name: &str) -> Option<StructureId> {
        self.structures_by_name.get(name).copied()
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    // Packed layout, no padding: run after every structure is declared
    // so field types referring to other structures already know their
    // size (§4.2's "depth-first over declaration order" requirement).
    pub fn assign_structure_offsets(&mut self) {
        for id in 0..self.structures.len() as StructureId {
            let mut s = self.structures[id as usize].clone();
            s.assign_offsets(|t| self.size_of(t));
            self.structures[id as usize] = s;
        }
    }

    // -- globals --

    pub fn add_global(&mut self, v: Variable) -> Result<VariableId, SemanticError> {
        if self.globals_by_name.contains_key(&v.name) {
            return Err(SemanticError::new(v.at.clone(), format!("global '{}' already declared", v.name)));
        }
        let id = self.globals.len() as VariableId;
        self.globals_by_name.insert(v.name.clone(), id);
        self.globals.push(v);
        Ok(id)
    }

    pub fn global(&self, id: VariableId) -> &Variable {
        &self.globals[id as usize]
    }

    pub fn globals(&self) -> &[Variable] {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut [Variable] {
        &mut self.globals
    }

    pub fn find_global(&self, name: &str) -> Option<VariableId> {
        self.globals_by_name.get(name).copied()
    }

    // -- functions --

    pub fn add_function(&mut self, mut f: Function) -> Result<FunctionId, SemanticError> {
        let mangled = f.mangled_name();
        if self.functions_by_mangled.contains_key(&mangled) {
            return Err(SemanticError::new(f.at.clone(), format!("function '{}' already declared with this signature", f.name)));
        }
        let id = self.functions.len() as FunctionId;
        f.index = id;
        self.functions_by_mangled.insert(mangled, id);
        self.functions_by_name.entry(f.name.clone()).or_default().push(id);
        self.functions.push(f);
        Ok(id)
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id as usize]
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn overloads(&self, name: &str) -> &[FunctionId] {
        self.functions_by_name.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    // Positional matching with ref-matters-only-when-required, and
    // default-argument backfill: a formal past the end of `args` is
    // acceptable only if it carries an initializer. Ported from
    // Program::findMatchingFunctions.
    pub fn find_matching_function(&self, name: &str, args: &[TypeDecl], at: &SourceLoc) -> Result<FunctionId, SemanticError> {
        let mut matches = Vec::new();
        for &fid in self.overloads(name) {
            let f = &self.functions[fid as usize];
            if args.len() > f.arguments.len() {
                continue;
            }
            let mut ok = true;
            for (i, formal) in f.arguments.iter().enumerate() {
                if i < args.len() {
                    let ref_matters = formal.type_.is_ref();
                    if !formal.type_.is_same(&args[i], ref_matters) {
                        ok = false;
                        break;
                    }
                } else if formal.init.is_none() {
                    ok = false;
                    break;
                }
            }
            if ok {
                matches.push(fid);
            }
        }
        match matches.len() {
            0 => Err(SemanticError::new(at.clone(), format!("no matching overload for '{}'", name))),
            1 => Ok(matches[0]),
            _ => Err(SemanticError::new(at.clone(), format!("ambiguous call to '{}': {} overloads match", name, matches.len()))),
        }
    }

    // -- sizing --

    // Recurses through structure fields; arrays are dims.product() *
    // element size, matching TypeDecl::getSizeOf/getStride in the
    // original (no internal alignment, so size == stride here).
    pub fn size_of(&self, t: &TypeDecl) -> usize {
        let elem = if t.base == Base::Structure {
            match t.structure {
                Some(id) => self.structure(id).size_of(|ft| self.size_of(ft)),
                None => 0,
            }
        } else {
            crate::types::base_size(t.base)
        };
        if t.dims.is_empty() {
            elem
        } else {
            elem * t.dims.iter().map(|d| *d as usize).product::<usize>()
        }
    }

    pub fn stride(&self, t: &TypeDecl) -> usize {
        self.size_of(t)
    }
}
