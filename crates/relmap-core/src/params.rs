//! Named parameter sources for statement templates.

use crate::model::Model;
use crate::naming::column_to_field;
use crate::value::Value;
use std::collections::HashMap;

/// Something that can supply a value for a `#{name}` placeholder.
pub trait ParamSource {
    /// Resolve `name`, `None` when it is unknown.
    fn resolve(&self, name: &str) -> Option<Value>;
}

impl ParamSource for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Records resolve by field name first, then by column name.
impl<M: Model> ParamSource for M {
    fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.field_value(name) {
            return Some(value);
        }
        match M::fields().iter().find(|f| f.column == name) {
            Some(field) => self.field_value(field.name),
            None => self.field_value(&column_to_field(name)),
        }
    }
}
