use crate::types::{LocateId, Symbol};

/// One slot per possible locate id.
pub const LOCATE_SLOTS: usize = 1 << 16;

/// Locate id → ticker table, allocated once per session.
pub struct SecurityDirectory {
    symbols: Vec<Option<Symbol>>,
    registered: usize,
}

impl SecurityDirectory {
    pub fn new() -> Self {
        Self {
            symbols: vec![None; LOCATE_SLOTS],
            registered: 0,
        }
    }

    /// Records `symbol` for `locate`, returning the symbol it replaced.
    pub fn register(&mut self, locate: LocateId, symbol: Symbol) -> Option<Symbol> {
        let prev = self.symbols[locate as usize].replace(symbol);
        if prev.is_none() {
            self.registered += 1;
        }
        prev
    }

    pub fn symbol(&self, locate: LocateId) -> Option<&Symbol> {
        self.symbols[locate as usize].as_ref()
    }

    /// Registered slots in ascending locate order.
    pub fn registered(&self) -> impl Iterator<Item = (LocateId, &Symbol)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i as LocateId, s)))
    }

    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }
}

impl Default for SecurityDirectory {
    fn default() -> Self {
        Self::new()
    }
}
