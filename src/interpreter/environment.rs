use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

/// The variable namespace of an interpreter. There is a single flat scope:
/// a call binds its parameters into it and puts the previous bindings back
/// when the call ends, so functions never capture their defining scope.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    store: HashMap<Rc<str>, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key).cloned()
    }

    pub fn set(&mut self, key: Rc<str>, value: Value) {
        self.store.insert(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub(crate) fn snapshot(&self) -> Environment {
        self.clone()
    }

    pub(crate) fn restore(&mut self, snapshot: Environment) {
        *self = snapshot;
    }
}
