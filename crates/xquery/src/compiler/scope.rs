use crate::types::SeqType;
use crate::xdm::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// A declared variable. Two variables are the same binding iff their ids match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub id: VarId,
    pub name: Arc<str>,
    /// Declared type, if any.
    pub declared: Option<SeqType>,
}

impl Var {
    pub fn new(id: VarId, name: &str, declared: Option<SeqType>) -> Self {
        Self {
            id,
            name: name.into(),
            declared,
        }
    }
}

/// Remapping from original variable ids to their copies.
pub type VarMap = HashMap<VarId, Var>;

#[derive(Debug, Clone)]
struct Binding {
    var: Var,
    seq_type: Option<SeqType>,
    value: Option<Value>,
}

/// Variables declared while compiling one scope-introducing construct,
/// each with the type inferred for its binding and, for bindings to
/// literal values, the value itself.
#[derive(Debug, Clone, Default)]
pub struct VarScope {
    vars: Vec<Binding>,
}

impl VarScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, var: Var) {
        self.vars.push(Binding {
            var,
            seq_type: None,
            value: None,
        });
    }

    fn binding(&mut self, var: &Var) -> Option<&mut Binding> {
        self.vars.iter_mut().rev().find(|b| b.var.id == var.id)
    }

    /// Records the static type of the value bound to `var`.
    pub fn set_type(&mut self, var: &Var, st: SeqType) {
        if let Some(b) = self.binding(var) {
            b.seq_type = Some(st);
        }
    }

    /// Records that `var` is bound to a value known at compile time.
    pub fn set_value(&mut self, var: &Var, value: Value) {
        if let Some(b) = self.binding(var) {
            b.seq_type = Some(value.seq_type());
            b.value = Some(value);
        }
    }

    pub fn get(&self, id: VarId) -> Option<(&Var, Option<SeqType>)> {
        self.vars
            .iter()
            .rev()
            .find(|b| b.var.id == id)
            .map(|b| (&b.var, b.seq_type))
    }

    pub fn value(&self, id: VarId) -> Option<&Value> {
        self.vars.iter().rev().find(|b| b.var.id == id)?.value.as_ref()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_binding_wins() {
        let x = Var::new(VarId(1), "x", None);
        let mut vs = VarScope::new();
        vs.add(x.clone());
        vs.set_type(&x, SeqType::INTEGER_O);
        assert_eq!(vs.get(VarId(1)).map(|(_, st)| st), Some(Some(SeqType::INTEGER_O)));
        assert!(vs.value(VarId(1)).is_none());
        vs.set_value(&x, Value::integer(3));
        assert_eq!(vs.value(VarId(1)), Some(&Value::integer(3)));
        assert!(vs.get(VarId(2)).is_none());
    }
}
