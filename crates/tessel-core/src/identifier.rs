//! Interned identifiers for module paths.
//!
//! Module names such as `Engine.Lighting` are compared and hashed frequently
//! during import resolution, so they are stored as [`Id`] symbols in a global
//! string interner.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn with_interner<R>(f: impl FnOnce(&mut DefaultStringInterner) -> R) -> R {
    let mut interner = INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock");
    f(&mut interner)
}

/// An interned module path or identifier.
///
/// # Examples
///
/// ```
/// use tessel_core::identifier::Id;
///
/// let engine = Id::new("Engine");
/// let lighting = engine.create_nested(Id::new("Lighting"));
/// assert_eq!(lighting, "Engine.Lighting");
/// assert_eq!(lighting.segments(), vec!["Engine", "Lighting"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Separator between the segments of a nested module path.
    pub const SEPARATOR: char = '.';

    /// Interns `name` and returns its identifier.
    pub fn new(name: &str) -> Self {
        Self(with_interner(|interner| interner.get_or_intern(name)))
    }

    /// Creates a nested path by joining `self` and `child` with [`Id::SEPARATOR`].
    pub fn create_nested(&self, child: Id) -> Self {
        with_interner(|interner| {
            let parent = interner
                .resolve(self.0)
                .expect("Parent ID should exist in interner");
            let child = interner
                .resolve(child.0)
                .expect("Child ID should exist in interner");
            let nested = format!("{parent}{}{child}", Self::SEPARATOR);
            Self(interner.get_or_intern(&nested))
        })
    }

    /// Splits the identifier into its path segments.
    pub fn segments(&self) -> Vec<String> {
        self.to_string()
            .split(Self::SEPARATOR)
            .map(str::to_string)
            .collect()
    }

    /// Returns `true` when the identifier is a nested path.
    pub fn is_nested(&self) -> bool {
        self.to_string().contains(Self::SEPARATOR)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = with_interner(|interner| {
            interner
                .resolve(self.0)
                .expect("Symbol should exist in interner")
                .to_string()
        });
        f.write_str(&value)
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        with_interner(|interner| interner.resolve(self.0) == Some(other))
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
