use std::fmt;

use rustc_hash::FxHashMap;

use crate::types::{ArenaError, Result};

/// Two-byte identifier of an interned name.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SymbolId(pub u16);

impl SymbolId {
    /// Reserved id that never names a symbol.
    pub const INVALID: SymbolId = SymbolId(0xFFFF);
    /// Encoded width in bytes when stored in a record.
    pub const SIZE: usize = 2;

    /// Returns true unless this is [`SymbolId::INVALID`].
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interns short names (tag names, attribute keys) into dense 2-byte ids.
#[derive(Default, Debug)]
pub struct SymbolTable {
    ids: FxHashMap<String, SymbolId>,
    names: Vec<String>,
}

impl SymbolTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, assigning the next one on first sight.
    pub fn intern(&mut self, name: &str) -> Result<SymbolId> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let next = u16::try_from(self.names.len())
            .ok()
            .filter(|&raw| raw != SymbolId::INVALID.0)
            .ok_or(ArenaError::Capacity("symbol table full"))?;
        let id = SymbolId(next);
        self.ids.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        Ok(id)
    }

    /// Id of `name` without inserting it.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.ids.get(name).copied()
    }

    /// Name behind `id`, if assigned.
    pub fn resolve(&self, id: SymbolId) -> Option<&str> {
        self.names.get(usize::from(id.0)).map(String::as_str)
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
