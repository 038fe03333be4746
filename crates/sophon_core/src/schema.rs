//! Database field layouts.

use crate::error::{CoreError, CoreResult};
use sophon_engine::{FieldDecl, FieldType};

/// The key and value fields of a database, in declaration order.
///
/// Field names are unique across keys and values. The engine orders rows
/// by the key fields, the first key field leading.
///
/// # Example
///
/// ```rust
/// use sophon_core::Schema;
/// use sophon_engine::FieldType;
///
/// let mut schema = Schema::new();
/// schema.add_key("id", FieldType::U32).unwrap();
/// schema.add_value("name", FieldType::String).unwrap();
/// assert!(schema.add_value("id", FieldType::U8).is_err());
/// assert_eq!(schema.leading_key().unwrap().name, "id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    keys: Vec<FieldDecl>,
    values: Vec<FieldDecl>,
}

impl Schema {
    /// Creates a schema with no fields.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a key field.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if the name is already declared.
    pub fn add_key(&mut self, name: impl Into<String>, field_type: FieldType) -> CoreResult<()> {
        let decl = FieldDecl::key(name, field_type);
        self.check_unique(&decl.name)?;
        self.keys.push(decl);
        Ok(())
    }

    /// Appends a value field.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateField` if the name is already declared.
    pub fn add_value(&mut self, name: impl Into<String>, field_type: FieldType) -> CoreResult<()> {
        let decl = FieldDecl::value(name, field_type);
        self.check_unique(&decl.name)?;
        self.values.push(decl);
        Ok(())
    }

    fn check_unique(&self, name: &str) -> CoreResult<()> {
        if self.field(name).is_some() {
            return Err(CoreError::DuplicateField {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields().find(|decl| decl.name == name)
    }

    /// All fields, keys first.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.keys.iter().chain(&self.values)
    }

    /// The key fields.
    #[must_use]
    pub fn keys(&self) -> &[FieldDecl] {
        &self.keys
    }

    /// The value fields.
    #[must_use]
    pub fn values(&self) -> &[FieldDecl] {
        &self.values
    }

    /// The first key field, which orders the database.
    #[must_use]
    pub fn leading_key(&self) -> Option<&FieldDecl> {
        self.keys.first()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len() + self.values.len()
    }

    /// Returns true when no field is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The declarations handed to the engine.
    #[must_use]
    pub fn decls(&self) -> Vec<FieldDecl> {
        self.fields().cloned().collect()
    }
}

/// A string `key` and a string `value`, used when a database is declared
/// without a schema.
impl Default for Schema {
    fn default() -> Self {
        Self {
            keys: vec![FieldDecl::key("key", FieldType::String)],
            values: vec![FieldDecl::value("value", FieldType::String)],
        }
    }
}
