//! Minimal stream reader used to check encoder output in tests.

#![allow(dead_code)]

use std::rc::Rc;
use tracecap::encoding::FieldKind;
use tracecap_common::{tagged_len, unzigzag, MAX_VARINT_LEN};

#[derive(Debug)]
pub struct DecodedEntity {
    pub id: u64,
    pub name: String,
    pub fields: Vec<(String, FieldKind)>,
}

pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    entities: Vec<Rc<DecodedEntity>>,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            entities: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.pos == self.bytes.len()
    }

    pub fn byte(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        b
    }

    pub fn take(&mut self, n: usize) -> &'a [u8] {
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        out
    }

    pub fn uvarint(&mut self) -> u64 {
        let first = self.byte();
        let len = tagged_len(first);
        if len == MAX_VARINT_LEN {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(self.take(8));
            return u64::from_be_bytes(raw);
        }
        let mut value = u64::from(first & (0xFF >> len));
        for _ in 1..len {
            value = (value << 8) | u64::from(self.byte());
        }
        value
    }

    pub fn svarint(&mut self) -> i64 {
        unzigzag(self.uvarint())
    }

    pub fn f32(&mut self) -> f32 {
        let bits = u32::try_from(self.uvarint()).expect("f32 bits fit in u32");
        f32::from_bits(bits.swap_bytes())
    }

    pub fn f64(&mut self) -> f64 {
        f64::from_bits(self.uvarint().swap_bytes())
    }

    pub fn string(&mut self) -> String {
        let len = usize::try_from(self.uvarint()).expect("length fits in usize");
        String::from_utf8(self.take(len).to_vec()).expect("utf-8 string")
    }

    /// Entity reference; `None` for the null tag
    pub fn entity(&mut self) -> Option<Rc<DecodedEntity>> {
        let tag = self.uvarint();
        if tag == 0 {
            return None;
        }
        let id = tag >> 1;
        if tag & 1 == 1 {
            assert_eq!(id as usize, self.entities.len() + 1, "entity ids are sequential");
            let name = self.string();
            let count = self.uvarint();
            let fields = (0..count)
                .map(|_| {
                    let name = self.string();
                    let kind = FieldKind::from_code(self.byte()).expect("valid field kind");
                    (name, kind)
                })
                .collect();
            self.entities.push(Rc::new(DecodedEntity { id, name, fields }));
        }
        Some(Rc::clone(&self.entities[id as usize - 1]))
    }

    /// Object header: id plus entity; `None` for a null object
    pub fn object(&mut self) -> Option<(u64, Rc<DecodedEntity>)> {
        let tag = self.uvarint();
        if tag == 0 {
            return None;
        }
        assert_eq!(tag & 1, 1, "objects are never backreferenced");
        let entity = self.entity().expect("object has an entity");
        Some((tag >> 1, entity))
    }
}
