// The type system: TypeDecl value objects and Structure layout.
//
// Grounded in ast.cpp's TypeDecl / Structure (isSameType, getSizeOf,
// getStride, getMangledName, field-offset pass in Program::inferTypes),
// re-cast as a closed base-kind enum with arena indices standing in
// for the original's shared_ptr<Structure> back-references.

use std::fmt;

use crate::loc::SourceLoc;

pub type StructureId = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Base {
    None,
    Void,
    Bool,
    Int,
    UInt,
    Int2,
    Int3,
    Int4,
    UInt2,
    UInt3,
    UInt4,
    Float,
    Float2,
    Float3,
    Float4,
    String,
    Pointer,
    Structure,
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Base::None => "none",
            Base::Void => "void",
            Base::Bool => "bool",
            Base::Int => "int",
            Base::UInt => "uint",
            Base::Int2 => "int2",
            Base::Int3 => "int3",
            Base::Int4 => "int4",
            Base::UInt2 => "uint2",
            Base::UInt3 => "uint3",
            Base::UInt4 => "uint4",
            Base::Float => "float",
            Base::Float2 => "float2",
            Base::Float3 => "float3",
            Base::Float4 => "float4",
            Base::String => "string",
            Base::Pointer => "pointer",
            Base::Structure => "structure",
        };
        write!(f, "{}", s)
    }
}

// Fixed per-base-kind byte size, mirroring getTypeBaseSize in the
// original. Structure sizes are computed separately (they depend on
// field layout, which the caller resolves via StructureId).
pub fn base_size(base: Base) -> usize {
    match base {
        Base::None | Base::Void => 0,
        Base::Bool => 1,
        Base::Int | Base::UInt | Base::Float => 4,
        Base::Int2 | Base::UInt2 | Base::Float2 => 8,
        Base::Int3 | Base::UInt3 | Base::Float3 => 12,
        Base::Int4 | Base::UInt4 | Base::Float4 => 16,
        Base::String | Base::Pointer => std::mem::size_of::<usize>(),
        Base::Structure => 0, // caller must use Program::size_of_structure
    }
}

#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub base: Base,
    pub structure: Option<StructureId>,
    pub dims: Vec<u32>,
    pub ref_: bool,
    pub at: SourceLoc,
}

impl TypeDecl {
    pub fn simple(base: Base, at: SourceLoc) -> TypeDecl {
        TypeDecl { base, structure: None, dims: Vec::new(), ref_: false, at }
    }

    pub fn structure(id: StructureId, at: SourceLoc) -> TypeDecl {
        TypeDecl { base: Base::Structure, structure: Some(id), dims: Vec::new(), ref_: false, at }
    }

    pub fn pointer_to(id: StructureId, at: SourceLoc) -> TypeDecl {
        TypeDecl { base: Base::Pointer, structure: Some(id), dims: Vec::new(), ref_: false, at }
    }

    pub fn as_ref(mut self) -> TypeDecl {
        self.ref_ = true;
        self
    }

    pub fn without_ref(mut self) -> TypeDecl {
        self.ref_ = false;
        self
    }

    // Type with the trailing dimension removed -- the result of `At`.
    pub fn one_dim_lower(&self) -> TypeDecl {
        let mut t = self.clone();
        t.dims.pop();
        t.ref_ = true;
        t
    }

    pub fn is_void(&self) -> bool {
        self.base == Base::Void && self.dims.is_empty()
    }

    pub fn is_pointer(&self) -> bool {
        self.base == Base::Pointer && self.dims.is_empty()
    }

    pub fn is_simple_type(&self) -> bool {
        !matches!(self.base, Base::None | Base::Void | Base::Structure | Base::Pointer) && self.dims.is_empty()
    }

    pub fn is_simple_of(&self, base: Base) -> bool {
        self.base == base && self.is_simple_type()
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    // ref matters: explicit ref, structure-by-value, or any array dim.
    pub fn is_ref(&self) -> bool {
        self.ref_ || self.base == Base::Structure || !self.dims.is_empty()
    }

    pub fn is_index(&self) -> bool {
        matches!(self.base, Base::Int | Base::UInt) && self.dims.is_empty()
    }

    pub fn is_same(&self, other: &TypeDecl, ref_matters: bool) -> bool {
        if self.base != other.base {
            return false;
        }
        if self.base == Base::Structure && self.structure != other.structure {
            return false;
        }
        if self.base == Base::Pointer {
            if let (Some(a), Some(b)) = (self.structure, other.structure) {
                if a != b {
                    return false;
                }
            }
        }
        if self.dims != other.dims {
            return false;
        }
        if ref_matters && self.ref_ != other.ref_ {
            return false;
        }
        true
    }

    // True when `other` is a valid iteration-variable type for an
    // array of `self`'s base type: a ref to the bare element type,
    // no dims of its own.
    pub fn is_iterator_type(&self, other: &TypeDecl) -> bool {
        if self.base != other.base {
            return false;
        }
        if self.base == Base::Structure && self.structure != other.structure {
            return false;
        }
        if !other.dims.is_empty() {
            return false;
        }
        other.is_ref()
    }

    pub fn mangled(&self) -> String {
        let mut s = self.base.to_string();
        if self.base == Base::Structure {
            if let Some(id) = self.structure {
                s = format!("struct{}", id);
            }
        } else if self.base == Base::Pointer {
            if let Some(id) = self.structure {
                s = format!("ptr{}", id);
            }
        }
        if self.ref_ {
            s.push_str("#ref");
        }
        for d in &self.dims {
            s.push('#');
            s.push_str(&d.to_string());
        }
        s
    }
}

impl PartialEq for TypeDecl {
    fn eq(&self, other: &TypeDecl) -> bool {
        self.is_same(other, true)
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if self.base == Base::Pointer {
            write!(f, " *")?;
        }
        for d in &self.dims {
            write!(f, " {}", d)?;
        }
        if self.ref_ {
            write!(f, " &")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: String,
    pub type_: TypeDecl,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct Structure {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

impl Structure {
    pub fn new(name: String) -> Structure {
        Structure { name, fields: Vec::new() }
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    // Packed, left-to-right, no alignment padding: offset[i] = offset[i-1] + size_of(field[i-1]).
    // `size_of` is a closure so structure-typed fields can recurse through the
    // owning Program without Structure holding a back-reference to it.
    pub fn assign_offsets(&mut self, mut size_of: impl FnMut(&TypeDecl) -> usize) {
        let mut offset = 0usize;
        for field in &mut self.fields {
            field.offset = offset;
            offset += size_of(&field.type_);
        }
    }

    pub fn size_of(&self, mut size_of: impl FnMut(&TypeDecl) -> usize) -> usize {
        self.fields.iter().map(|f| size_of(&f.type_)).sum()
    }
}
