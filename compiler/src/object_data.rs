// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use crate::{NodeId, RelocType, Relocation};

/// A symbol defined by a blob, at a byte offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinedSymbol {
    pub node: NodeId,
    pub offset: usize,
}

/// The frozen result of an [`ObjectDataBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectData {
    data: Vec<u8>,
    relocs: Vec<Relocation>,
    alignment: usize,
    defined_symbols: Vec<DefinedSymbol>,
}

impl ObjectData {
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn relocs(&self) -> &[Relocation] {
        &self.relocs
    }

    #[must_use]
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    #[must_use]
    pub fn defined_symbols(&self) -> &[DefinedSymbol] {
        &self.defined_symbols
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Every distinct node this blob refers to, in first-reference order.
    #[must_use]
    pub fn reloc_targets(&self) -> Vec<NodeId> {
        let mut targets = Vec::with_capacity(self.relocs.len());
        for reloc in &self.relocs {
            if !targets.contains(&reloc.target) {
                targets.push(reloc.target);
            }
        }
        targets
    }
}

/// Append-only byte buffer with relocations, shared by every emitter.
#[derive(Debug)]
pub struct ObjectDataBuilder {
    pointer_size: usize,
    data: Vec<u8>,
    relocs: Vec<Relocation>,
    alignment: usize,
    defined_symbols: Vec<DefinedSymbol>,
}

impl ObjectDataBuilder {
    #[must_use]
    pub fn new(pointer_size: usize) -> Self {
        debug_assert!(pointer_size == 4 || pointer_size == 8);
        Self {
            pointer_size,
            data: Vec::new(),
            relocs: Vec::new(),
            alignment: 1,
            defined_symbols: Vec::new(),
        }
    }

    #[must_use]
    pub const fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    #[must_use]
    pub fn count_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn require_alignment(&mut self, alignment: usize) {
        debug_assert!(alignment.is_power_of_two());
        self.alignment = self.alignment.max(alignment);
    }

    /// Defines the symbol of `node` at the current offset.
    pub fn add_symbol(&mut self, node: NodeId) {
        self.defined_symbols.push(DefinedSymbol {
            node,
            offset: self.data.len(),
        });
    }

    pub fn emit_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn emit_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    pub fn emit_short(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_int(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_uint(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_long(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Emits a pointer-sized integer.
    pub fn emit_naturalint(&mut self, value: i64) {
        if self.pointer_size == 8 {
            self.emit_long(value);
        } else {
            self.emit_int(value as i32);
        }
    }

    pub fn pad_to_alignment(&mut self, alignment: usize) {
        let misalignment = self.data.len() % alignment;
        if misalignment != 0 {
            self.emit_zeros(alignment - misalignment);
        }
    }

    /// Records a relocation at the current offset without emitting anything.
    /// Used when the relocated bytes are an instruction emitted right after.
    pub fn add_reloc(&mut self, target: NodeId, kind: RelocType) {
        self.relocs.push(Relocation::new(self.data.len(), target, kind));
    }

    /// Records a relocation at the current offset and emits its placeholder,
    /// which holds `delta` as the addend.
    pub fn emit_reloc(&mut self, target: NodeId, kind: RelocType, delta: i32) {
        debug_assert!(!kind.patches_instruction(), "instruction relocations are added with `add_reloc`");

        self.add_reloc(target, kind);
        match kind.size() {
            8 => self.emit_long(delta as i64),
            4 => self.emit_int(delta),
            _ => (),
        }
    }

    /// A pointer-sized absolute reference to `target`.
    pub fn emit_pointer_reloc(&mut self, target: NodeId, delta: i32) {
        let kind = if self.pointer_size == 8 { RelocType::Dir64 } else { RelocType::HighLow };
        self.emit_reloc(target, kind, delta);
    }

    #[must_use]
    pub fn to_object_data(self) -> ObjectData {
        ObjectData {
            data: self.data,
            relocs: self.relocs,
            alignment: self.alignment,
            defined_symbols: self.defined_symbols,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(4, vec![0x78, 0x56, 0x34, 0x12])]
    #[case(8, vec![0x78, 0x56, 0x34, 0x12, 0, 0, 0, 0])]
    fn natural_int_follows_pointer_size(#[case] pointer_size: usize, #[case] expected: Vec<u8>) {
        let mut builder = ObjectDataBuilder::new(pointer_size);
        builder.emit_naturalint(0x12345678);
        assert_eq!(builder.to_object_data().data(), expected.as_slice());
    }

    #[rstest]
    #[case(4, RelocType::HighLow)]
    #[case(8, RelocType::Dir64)]
    fn pointer_reloc_kind(#[case] pointer_size: usize, #[case] kind: RelocType) {
        let mut builder = ObjectDataBuilder::new(pointer_size);
        builder.emit_byte(0xCC);
        builder.emit_pointer_reloc(NodeId::new(3), 16);

        let data = builder.to_object_data();
        assert_eq!(data.relocs(), &[Relocation::new(1, NodeId::new(3), kind)]);
        assert_eq!(data.len(), 1 + pointer_size);
        assert_eq!(kind.read_addend(data.data(), 1), Ok(16));
    }

    #[test]
    fn alignment_is_the_maximum_requested() {
        let mut builder = ObjectDataBuilder::new(8);
        builder.require_alignment(4);
        builder.require_alignment(16);
        builder.require_alignment(8);
        assert_eq!(builder.to_object_data().alignment(), 16);
    }

    #[test]
    fn symbols_are_defined_at_current_offset() {
        let mut builder = ObjectDataBuilder::new(8);
        builder.emit_naturalint(0);
        builder.add_symbol(NodeId::new(7));
        builder.emit_int(1);
        builder.pad_to_alignment(8);

        let data = builder.to_object_data();
        assert_eq!(data.defined_symbols(), &[DefinedSymbol { node: NodeId::new(7), offset: 8 }]);
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn reloc_targets_are_deduplicated() {
        let mut builder = ObjectDataBuilder::new(8);
        builder.emit_reloc(NodeId::new(2), RelocType::Rel32, 0);
        builder.emit_reloc(NodeId::new(1), RelocType::Rel32, 0);
        builder.emit_reloc(NodeId::new(2), RelocType::Dir64, 0);
        assert_eq!(builder.to_object_data().reloc_targets(), vec![NodeId::new(2), NodeId::new(1)]);
    }
}
