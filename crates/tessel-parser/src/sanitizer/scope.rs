//! Nested name scopes.

use indexmap::IndexMap;

/// What a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCategory {
    Alias,
    Constant,
    Function,
    Module,
    Option,
    Struct,
    Variable,
    /// Introduced by an import that partial analysis could not resolve.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierData {
    pub category: IdentifierCategory,
    pub index: usize,
}

impl IdentifierData {
    pub fn new(category: IdentifierCategory, index: usize) -> Self {
        Self { category, index }
    }

    pub fn unresolved() -> Self {
        Self::new(IdentifierCategory::Unresolved, 0)
    }
}

/// Stack of scopes; the first one holds module-level declarations.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<IndexMap<String, IdentifierData>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self {
            scopes: vec![IndexMap::new()],
        }
    }
}

impl ScopeStack {
    pub fn push(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<IdentifierData> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Whether `name` is bound in the innermost scope.
    pub fn is_declared_in_current(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
    }

    /// Binds `name` in the innermost scope. Returns `false` if it was
    /// already bound there.
    pub fn declare(&mut self, name: &str, data: IdentifierData) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_pop() {
        let mut scopes = ScopeStack::default();
        let outer = IdentifierData::new(IdentifierCategory::Constant, 0);
        let inner = IdentifierData::new(IdentifierCategory::Variable, 3);

        assert!(scopes.declare("x", outer));
        scopes.push();
        assert!(!scopes.is_declared_in_current("x"));
        assert!(scopes.declare("x", inner));
        assert_eq!(scopes.lookup("x"), Some(inner));
        assert!(!scopes.declare("x", inner));

        scopes.pop();
        assert_eq!(scopes.lookup("x"), Some(outer));
    }

    #[test]
    fn test_module_scope_is_never_popped() {
        let mut scopes = ScopeStack::default();
        scopes.pop();
        assert!(scopes.declare("main", IdentifierData::new(IdentifierCategory::Function, 0)));
        assert!(scopes.lookup("main").is_some());
    }
}
