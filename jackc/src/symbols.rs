use crate::parser::Type;
use crate::vmwriter::Segment;
use std::collections::HashMap;

/// The storage class of a Jack identifier.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Kind {
    Static,
    Field,
    Arg,
    Var,
}

impl Kind {
    pub fn segment(self) -> Segment {
        match self {
            Kind::Static => Segment::Static,
            Kind::Field => Segment::This,
            Kind::Arg => Segment::Argument,
            Kind::Var => Segment::Local,
        }
    }

    fn class_scoped(self) -> bool {
        matches!(self, Kind::Static | Kind::Field)
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub v_type: Type,
    pub kind: Kind,
    pub index: u16,
}

/// Two-tier symbol table: class scope (static, field) under subroutine
/// scope (argument, var), each kind with its own allocation counter.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<String, Entry>,
    subroutine_scope: HashMap<String, Entry>,
    counts: [u16; 4],
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the subroutine scope and resets its counters.
    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
        self.counts[Kind::Arg as usize] = 0;
        self.counts[Kind::Var as usize] = 0;
    }

    /// Binds `name` to the next free index of its kind.
    pub fn define(&mut self, name: &str, v_type: Type, kind: Kind) -> u16 {
        let index = self.counts[kind as usize];
        self.counts[kind as usize] += 1;

        let entry = Entry {
            v_type,
            kind,
            index,
        };
        if kind.class_scoped() {
            self.class_scope.insert(name.to_owned(), entry);
        } else {
            self.subroutine_scope.insert(name.to_owned(), entry);
        }

        index
    }

    pub fn var_count(&self, kind: Kind) -> u16 {
        self.counts[kind as usize]
    }

    /// Subroutine scope shadows class scope.
    pub fn resolve(&self, name: &str) -> Option<&Entry> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.resolve(name).map(|entry| entry.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&Type> {
        self.resolve(name).map(|entry| &entry.v_type)
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.resolve(name).map(|entry| entry.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_count_per_kind() {
        let mut table = SymbolTable::new();

        assert_eq!(table.define("a", Type::Int, Kind::Static), 0);
        assert_eq!(table.define("b", Type::Int, Kind::Field), 0);
        assert_eq!(table.define("c", Type::Int, Kind::Field), 1);
        assert_eq!(table.define("d", Type::Int, Kind::Arg), 0);
        assert_eq!(table.define("e", Type::Boolean, Kind::Var), 0);
        assert_eq!(table.define("f", Type::Boolean, Kind::Var), 1);

        assert_eq!(table.var_count(Kind::Field), 2);
        assert_eq!(table.var_count(Kind::Var), 2);
        assert_eq!(table.var_count(Kind::Static), 1);
    }

    #[test]
    fn subroutine_scope_shadows_class_scope() {
        let mut table = SymbolTable::new();

        table.define("x", Type::Int, Kind::Field);
        table.define("x", Type::Boolean, Kind::Var);

        assert_eq!(table.kind_of("x"), Some(Kind::Var));
        assert_eq!(table.type_of("x"), Some(&Type::Boolean));
    }

    #[test]
    fn start_subroutine_resets_only_the_inner_scope() {
        let mut table = SymbolTable::new();

        table.define("field0", Type::Int, Kind::Field);
        table.define("arg0", Type::Int, Kind::Arg);
        table.define("local0", Type::Int, Kind::Var);

        table.start_subroutine();

        assert_eq!(table.kind_of("arg0"), None);
        assert_eq!(table.kind_of("local0"), None);
        assert_eq!(table.kind_of("field0"), Some(Kind::Field));
        assert_eq!(table.var_count(Kind::Arg), 0);
        assert_eq!(table.var_count(Kind::Var), 0);
        assert_eq!(table.var_count(Kind::Field), 1);

        assert_eq!(table.define("fresh", Type::Int, Kind::Arg), 0);
    }

    #[test]
    fn kinds_map_to_their_segments() {
        assert_eq!(Kind::Static.segment(), Segment::Static);
        assert_eq!(Kind::Field.segment(), Segment::This);
        assert_eq!(Kind::Arg.segment(), Segment::Argument);
        assert_eq!(Kind::Var.segment(), Segment::Local);
    }

    #[test]
    fn unknown_names_resolve_to_nothing() {
        let table = SymbolTable::new();

        assert!(table.resolve("ghost").is_none());
        assert_eq!(table.index_of("ghost"), None);
    }
}
