//! Declaration registries.
//!
//! Resolved AST nodes refer to declarations by index. The registries own the
//! declaration data for the whole analysis, imported modules included, and
//! are the only place an index is turned back into data.

use indexmap::IndexMap;

use tessel_core::{
    attribute::{BuiltinEntry, MemoryLayout, ShaderStage},
    constant::ConstantValue,
    identifier::Id,
    types::{ExpressionType, TypeNames},
};

use crate::{
    error::{Diagnostic, ErrorKind, Result},
    sanitizer::scope::IdentifierData,
    span::SourceLocation,
};

#[derive(Debug)]
enum Slot<T> {
    Free,
    Reserved,
    Used(T),
}

/// Index-addressed storage where every index is bound at most once.
#[derive(Debug)]
pub struct IndexRegistry<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for IndexRegistry<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> IndexRegistry<T> {
    fn ensure_len(&mut self, len: usize) {
        while self.slots.len() < len {
            self.slots.push(Slot::Free);
        }
    }

    /// Reserves `index` for a declaration that already carries it, so that
    /// automatically numbered declarations skip it.
    pub fn preregister(&mut self, index: usize, location: &SourceLocation) -> Result<()> {
        self.ensure_len(index + 1);
        match self.slots[index] {
            Slot::Free => {
                self.slots[index] = Slot::Reserved;
                Ok(())
            }
            Slot::Reserved | Slot::Used(_) => Err(Diagnostic::new(
                ErrorKind::AlreadyUsedIndexPreregister(index),
                location.clone(),
            )),
        }
    }

    /// Binds `value` to `index`, or to the first index never handed out.
    pub fn register(
        &mut self,
        value: T,
        index: Option<usize>,
        location: &SourceLocation,
    ) -> Result<usize> {
        let index = match index {
            Some(index) => {
                self.ensure_len(index + 1);
                if matches!(self.slots[index], Slot::Used(_)) {
                    return Err(Diagnostic::new(
                        ErrorKind::AlreadyUsedIndex(index),
                        location.clone(),
                    ));
                }
                index
            }
            None => {
                self.slots.push(Slot::Free);
                self.slots.len() - 1
            }
        };
        self.slots[index] = Slot::Used(value);
        Ok(index)
    }

    pub fn get(&self, index: usize, location: &SourceLocation) -> Result<&T> {
        self.try_get(index)
            .ok_or_else(|| Diagnostic::new(ErrorKind::InvalidIndex(index), location.clone()))
    }

    pub fn get_mut(&mut self, index: usize, location: &SourceLocation) -> Result<&mut T> {
        match self.slots.get_mut(index) {
            Some(Slot::Used(value)) => Ok(value),
            _ => Err(Diagnostic::new(ErrorKind::InvalidIndex(index), location.clone())),
        }
    }

    pub fn try_get(&self, index: usize) -> Option<&T> {
        match self.slots.get(index) {
            Some(Slot::Used(value)) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Used(value) => Some((index, value)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: ExpressionType,
    pub builtin: Option<BuiltinEntry>,
    pub location_index: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct StructData {
    pub name: String,
    pub fields: Vec<StructField>,
    pub layout: Option<MemoryLayout>,
}

impl StructData {
    pub fn field(&self, name: &str) -> Option<(usize, &StructField)> {
        self.fields.iter().enumerate().find(|(_, field)| field.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub parameters: Vec<ExpressionType>,
    pub return_type: ExpressionType,
    pub stage: Option<ShaderStage>,
    pub early_fragment_tests: bool,
    /// Functions called from the body, with the call location.
    pub calls: Vec<(usize, SourceLocation)>,
    /// Location of the first `discard`, which ties the function to the
    /// fragment stage.
    pub discard: Option<SourceLocation>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct VariableData {
    pub ty: ExpressionType,
}

#[derive(Debug, Clone)]
pub struct ConstantData {
    /// `NoValue` while the initializer could not be folded (partial analysis).
    pub value: ConstantValue,
}

#[derive(Debug, Clone)]
pub struct AliasData {
    pub name: String,
    pub target: ExpressionType,
}

#[derive(Debug, Clone)]
pub struct OptionData {
    pub name: String,
    pub ty: ExpressionType,
    pub hash: u32,
    /// Override or default; `None` until the shader is specialized.
    pub value: Option<ConstantValue>,
}

#[derive(Debug, Clone)]
pub struct ModuleData {
    pub name: Id,
    /// Exported declarations by name.
    pub exports: IndexMap<String, IdentifierData>,
}

/// Every registry of one analysis.
#[derive(Debug, Default)]
pub struct Registries {
    pub aliases: IndexRegistry<AliasData>,
    pub constants: IndexRegistry<ConstantData>,
    pub functions: IndexRegistry<FunctionData>,
    pub modules: IndexRegistry<ModuleData>,
    pub options: IndexRegistry<OptionData>,
    pub structs: IndexRegistry<StructData>,
    pub variables: IndexRegistry<VariableData>,
}

impl TypeNames for Registries {
    fn struct_name(&self, index: usize) -> Option<String> {
        self.structs.try_get(index).map(|s| s.name.clone())
    }

    fn function_name(&self, index: usize) -> Option<String> {
        self.functions.try_get(index).map(|f| f.name.clone())
    }

    fn alias_name(&self, index: usize) -> Option<String> {
        self.aliases.try_get(index).map(|a| a.name.clone())
    }

    fn module_name(&self, index: usize) -> Option<String> {
        self.modules.try_get(index).map(|m| m.name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::unknown()
    }

    #[test]
    fn test_register_sequential() {
        let mut registry = IndexRegistry::default();
        assert_eq!(registry.register("a", None, &loc()).unwrap(), 0);
        assert_eq!(registry.register("b", None, &loc()).unwrap(), 1);
        assert_eq!(registry.get(1, &loc()).unwrap(), &"b");
    }

    #[test]
    fn test_register_used_index() {
        let mut registry = IndexRegistry::default();
        registry.register("a", Some(2), &loc()).unwrap();
        let err = registry.register("b", Some(2), &loc()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::AlreadyUsedIndex(2));
    }

    #[test]
    fn test_preregistered_index_is_skipped() {
        let mut registry = IndexRegistry::default();
        registry.preregister(0, &loc()).unwrap();
        assert_eq!(registry.register("auto", None, &loc()).unwrap(), 1);
        assert_eq!(registry.register("fixed", Some(0), &loc()).unwrap(), 0);

        let err = registry.preregister(1, &loc()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::AlreadyUsedIndexPreregister(1));
    }

    #[test]
    fn test_invalid_index() {
        let mut registry: IndexRegistry<u32> = IndexRegistry::default();
        registry.preregister(0, &loc()).unwrap();
        assert_eq!(registry.get(0, &loc()).unwrap_err().kind(), &ErrorKind::InvalidIndex(0));
        assert_eq!(registry.get(7, &loc()).unwrap_err().kind(), &ErrorKind::InvalidIndex(7));
    }
}
