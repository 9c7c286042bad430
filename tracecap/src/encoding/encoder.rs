//! Varint stream encoder

use log::warn;
use std::collections::HashMap;
use tracecap_common::{
    backreference_tag, definition_tag, encode_uvarint, f32_wire_bits, f64_wire_bits, zigzag,
    MAX_VARINT_LEN, NULL_TAG,
};

use super::schema::{Encodable, Encoder, Entity};
use crate::domain::TypeTag;
use crate::sink::ByteSink;

/// Stateful encoder writing the tracecap stream format into a [`ByteSink`]
///
/// Holds the session's entity table and object counter. Both only grow: a
/// type gets one entity id for the lifetime of the encoder and every object
/// gets a fresh object id.
pub struct VarintEncoder<S: ByteSink> {
    sink: S,
    entities: HashMap<TypeTag, u64>,
    next_entity_id: u64,
    next_object_id: u64,
    bytes_written: u64,
    failed: bool,
}

impl<S: ByteSink> VarintEncoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            entities: HashMap::new(),
            next_entity_id: 1,
            next_object_id: 1,
            bytes_written: 0,
            failed: false,
        }
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Number of distinct entities defined so far
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of objects encoded so far
    #[must_use]
    pub fn object_count(&self) -> u64 {
        self.next_object_id - 1
    }

    /// Bytes the sink has accepted
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether the sink has ever returned a short write
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn emit(&mut self, bytes: &[u8]) {
        let accepted = self.sink.write(bytes);
        self.bytes_written += accepted as u64;
        if accepted < bytes.len() && !self.failed {
            warn!(
                "Sink accepted {accepted} of {} bytes; encoded stream is incomplete",
                bytes.len()
            );
            self.failed = true;
        }
    }

    fn emit_uvarint(&mut self, value: u64) {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_uvarint(value, &mut buf);
        self.emit(&buf[..len]);
    }

    /// Wire length for a string of `len` bytes
    ///
    /// Strings past `u32::MAX` bytes are cut to that length and the stream is
    /// marked failed.
    fn string_len(&mut self, len: usize) -> u32 {
        u32::try_from(len).unwrap_or_else(|_| {
            warn!("String of {len} bytes exceeds the stream's length limit; truncating");
            self.failed = true;
            u32::MAX
        })
    }

    fn emit_definition(&mut self, entity: &Entity) {
        self.write_string(Some(entity.name()));
        self.emit_uvarint(entity.fields().len() as u64);
        for field in entity.fields() {
            self.write_string(Some(&field.name));
            self.emit(&[field.kind.code()]);
        }
    }
}

impl<S: ByteSink> Encoder for VarintEncoder<S> {
    fn write_bool(&mut self, value: bool) {
        self.emit(&[u8::from(value)]);
    }

    fn write_i8(&mut self, value: i8) {
        self.emit(&value.to_be_bytes());
    }

    fn write_u8(&mut self, value: u8) {
        self.emit(&[value]);
    }

    fn write_i16(&mut self, value: i16) {
        self.emit_uvarint(zigzag(i64::from(value)));
    }

    fn write_u16(&mut self, value: u16) {
        self.emit_uvarint(u64::from(value));
    }

    fn write_i32(&mut self, value: i32) {
        self.emit_uvarint(zigzag(i64::from(value)));
    }

    fn write_u32(&mut self, value: u32) {
        self.emit_uvarint(u64::from(value));
    }

    fn write_i64(&mut self, value: i64) {
        self.emit_uvarint(zigzag(value));
    }

    fn write_u64(&mut self, value: u64) {
        self.emit_uvarint(value);
    }

    fn write_f32(&mut self, value: f32) {
        self.emit_uvarint(f32_wire_bits(value));
    }

    fn write_f64(&mut self, value: f64) {
        self.emit_uvarint(f64_wire_bits(value));
    }

    fn write_string(&mut self, value: Option<&str>) {
        let bytes = value.unwrap_or_default().as_bytes();
        let len = self.string_len(bytes.len());
        self.write_u32(len);
        self.emit(&bytes[..len as usize]);
    }

    fn write_data(&mut self, bytes: &[u8]) {
        self.emit(bytes);
    }

    fn write_entity(&mut self, entity: &Entity) {
        if let Some(&id) = self.entities.get(&entity.tag()) {
            self.emit_uvarint(backreference_tag(id));
            return;
        }

        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.insert(entity.tag(), id);
        self.emit_uvarint(definition_tag(id));
        self.emit_definition(entity);
    }

    fn write_object(&mut self, object: Option<&dyn Encodable>) {
        let Some(object) = object else {
            self.emit_uvarint(NULL_TAG);
            return;
        };

        let id = self.next_object_id;
        self.next_object_id += 1;
        self.emit_uvarint(definition_tag(id));
        self.write_entity(object.entity());
        object.encode(self);
    }

    fn write_variant(&mut self, value: Option<&dyn Encodable>) {
        let Some(value) = value else {
            self.emit_uvarint(NULL_TAG);
            return;
        };

        self.write_entity(value.entity());
        value.encode(self);
    }
}
