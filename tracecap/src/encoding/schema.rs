//! Schema descriptors and the encoding traits
//!
//! An [`Entity`] describes one schema type: its name and its fields in
//! declaration order. Entities are produced elsewhere (typically generated
//! from an IDL) and are identified by a [`TypeTag`], never by address.

use std::collections::HashMap;
use std::sync::Arc;

pub use tracecap_common::FieldKind;

use crate::domain::TypeTag;

/// One declared field of an [`Entity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Type descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    tag: TypeTag,
    name: String,
    fields: Vec<Field>,
}

impl Entity {
    /// Describe a type under a caller-assigned tag
    pub fn new(tag: TypeTag, name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            tag,
            name: name.into(),
            fields,
        }
    }

    #[must_use]
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Interns schema types to tags
///
/// Registering a name the first time assigns the next tag; registering it
/// again returns the entity already on file, so every value of a type shares
/// one descriptor.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_name: HashMap<String, Arc<Entity>>,
    next_tag: u32,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with `fields`, or return its existing entity
    ///
    /// Fields given on a repeat registration are ignored.
    pub fn register(&mut self, name: &str, fields: Vec<Field>) -> Arc<Entity> {
        if let Some(existing) = self.by_name.get(name) {
            return Arc::clone(existing);
        }
        let entity = Arc::new(Entity::new(TypeTag(self.next_tag), name, fields));
        self.next_tag += 1;
        self.by_name.insert(name.to_string(), Arc::clone(&entity));
        entity
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Entity>> {
        self.by_name.get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Sink-independent encoding operations
///
/// Object-safe so that [`Encodable`] implementations do not need to know which
/// sink the stream ends up in.
pub trait Encoder {
    fn write_bool(&mut self, value: bool);
    fn write_i8(&mut self, value: i8);
    fn write_u8(&mut self, value: u8);
    fn write_i16(&mut self, value: i16);
    fn write_u16(&mut self, value: u16);
    fn write_i32(&mut self, value: i32);
    fn write_u32(&mut self, value: u32);
    fn write_i64(&mut self, value: i64);
    fn write_u64(&mut self, value: u64);
    fn write_f32(&mut self, value: f32);
    fn write_f64(&mut self, value: f64);

    /// Length-prefixed string; `None` encodes like the empty string
    fn write_string(&mut self, value: Option<&str>);

    /// Raw bytes, no prefix
    fn write_data(&mut self, bytes: &[u8]);

    /// Entity reference: definition on first sight, backreference after
    fn write_entity(&mut self, entity: &Entity);

    /// Nullable object with its own object id
    fn write_object(&mut self, object: Option<&dyn Encodable>);

    /// Nullable value tagged with its entity but without an object id
    fn write_variant(&mut self, value: Option<&dyn Encodable>);
}

/// A value that knows its type descriptor and how to write its fields
pub trait Encodable {
    fn entity(&self) -> &Entity;

    /// Write the fields in the order the entity declares them
    fn encode(&self, encoder: &mut dyn Encoder);
}
