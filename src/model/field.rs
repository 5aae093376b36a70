use super::schema::{FieldDefinition, FieldType};
use super::Value;

/// One schema-declared attribute of a model instance and its live value.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldType,
    value: Option<Value>,
}

impl Field {
    /// Build a field, falling back to the definition's default producer when
    /// no value is supplied. Without a producer the field stays empty.
    pub fn new(name: impl Into<String>, definition: &FieldDefinition, value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind: definition.kind().clone(),
            value: value.or_else(|| definition.produce_default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldType {
        &self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn value_mut(&mut self) -> Option<&mut Value> {
        self.value.as_mut()
    }

    /// No value, or an explicit null.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, Value::is_null)
    }

    pub(crate) fn set(&mut self, value: Value) {
        self.value = Some(value);
    }

    pub(crate) fn take(&mut self) -> Option<Value> {
        self.value.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_value_wins_over_default() {
        let definition = FieldDefinition::new(FieldType::String).default_value("anon");
        let field = Field::new("name", &definition, Some("bob".into()));
        assert_eq!(field.value(), Some(&Value::from("bob")));
    }

    #[test]
    fn default_fills_missing_value() {
        let definition = FieldDefinition::new(FieldType::String).default_value("anon");
        let field = Field::new("name", &definition, None);
        assert_eq!(field.value().and_then(Value::as_str), Some("anon"));
    }

    #[test]
    fn without_default_field_stays_empty() {
        let definition = FieldDefinition::new(FieldType::Number).required();
        let field = Field::new("age", &definition, None);
        assert!(field.is_empty());
        assert_eq!(field.name(), "age");
    }
}
