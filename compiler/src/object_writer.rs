// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use object::{
    write::{Object, Relocation as ObjectRelocation, SectionId, StandardSegment, Symbol, SymbolId, SymbolSection},
    BinaryFormat,
    SymbolFlags,
    SymbolKind,
    SymbolScope,
};
use strum::IntoEnumIterator;

use crate::{
    node::{EmitMode, NodeKey, ObjectNodeSection},
    LinkError,
    LinkResult,
    NodeFactory,
    NodeId,
    ObjectData,
};

/// The symbol the runtime calls into.
pub const MANAGED_ENTRY_POINT: &str = "__managed__Main";

struct Blob {
    node: NodeId,
    data: ObjectData,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    section: ObjectNodeSection,
    offset: usize,
}

/// Lays the marked nodes out in sections and writes the relocatable object.
pub struct ObjectWriter<'a> {
    factory: &'a NodeFactory,
    nodes: &'a [NodeId],
    marked: &'a HashSet<NodeId>,
    entry_point: Option<NodeId>,
}

impl<'a> ObjectWriter<'a> {
    /// `nodes` must already be in their final order.
    #[must_use]
    pub fn new(factory: &'a NodeFactory, nodes: &'a [NodeId], marked: &'a HashSet<NodeId>, entry_point: Option<NodeId>) -> Self {
        Self {
            factory,
            nodes,
            marked,
            entry_point,
        }
    }

    pub fn write(&self) -> LinkResult<Vec<u8>> {
        let platform = self.factory.platform();
        let format = platform.operating_system().binary_format();
        let architecture = platform.architecture();

        let sections = self.collect_blobs()?;
        let (layouts, placements) = self.layout(&sections);

        let mut obj = Object::new(format, architecture.into(), architecture.endianness().into());
        let mut section_ids = HashMap::new();

        for (section, blobs) in &sections {
            let layout = &layouts[section];
            let mut bytes = vec![0; layout.length];
            for (blob, offset) in blobs.iter().zip(&layout.offsets) {
                bytes[*offset..*offset + blob.data.len()].copy_from_slice(blob.data.data());
            }

            self.apply_section_relocs(*section, blobs, &layout.offsets, &placements, &mut bytes)?;

            let segment = match format {
                BinaryFormat::MachO if section.is_code() => obj.segment_name(StandardSegment::Text).to_vec(),
                BinaryFormat::MachO => obj.segment_name(StandardSegment::Data).to_vec(),
                _ => Vec::new(),
            };

            let name = section.name(platform.operating_system()).as_bytes().to_vec();
            let id = obj.add_section(segment, name, section.kind());
            obj.append_section_data(id, &bytes, layout.alignment as u64);
            section_ids.insert(*section, id);
        }

        let mut symbols = SymbolTable::new(platform.symbol_prefix());
        for (section, blobs) in &sections {
            for blob in blobs {
                for symbol in blob.data.defined_symbols() {
                    let Some(name) = self.factory.mangled_name(symbol.node) else {
                        continue;
                    };

                    let placement = &placements[&symbol.node];
                    let id = symbols.add(&mut obj, name, Some((section_ids[section], placement)))?;
                    symbols.defined.insert(symbol.node, id);
                }
            }
        }

        if let Some(entry_point) = self.entry_point {
            let placement = placements.get(&entry_point)
                .ok_or_else(|| LinkError::MissingObjectData { node: self.factory.display_name(entry_point) })?;
            symbols.add(&mut obj, MANAGED_ENTRY_POINT.to_string(), Some((section_ids[&placement.section], placement)))?;
        }

        for (section, blobs) in &sections {
            for (blob, offset) in blobs.iter().zip(&layouts[section].offsets) {
                self.add_object_relocations(&mut obj, &mut symbols, *section, section_ids[section], blob, *offset, &placements)?;
            }
        }

        debug!("Object file has {} symbols in {} sections", symbols.len(), section_ids.len());
        Ok(obj.write()?)
    }

    /// The data of every emitting node, grouped by section and kept in the
    /// sorted order.
    fn collect_blobs(&self) -> LinkResult<Vec<(ObjectNodeSection, Vec<Blob>)>> {
        let mut per_section: HashMap<ObjectNodeSection, Vec<Blob>> = HashMap::new();

        for node in self.nodes {
            let Some(section) = self.factory.section(*node) else {
                continue;
            };

            let data = self.factory.object_data(*node, EmitMode::Final(self.marked))
                .map_err(|error| LinkError::Emission { node: self.factory.display_name(*node), error })?;

            let Some(data) = data else {
                if let NodeKey::MethodCode(..) = self.factory.key(*node) {
                    return Err(LinkError::MissingObjectData { node: self.factory.display_name(*node) });
                }
                continue;
            };

            per_section.entry(section).or_default().push(Blob { node: *node, data });
        }

        Ok(ObjectNodeSection::iter()
            .filter_map(|section| per_section.remove(&section).map(|blobs| (section, blobs)))
            .collect())
    }

    fn layout(&self, sections: &[(ObjectNodeSection, Vec<Blob>)]) -> (HashMap<ObjectNodeSection, SectionLayout>, HashMap<NodeId, Placement>) {
        let function_alignment = self.factory.platform().architecture().minimum_function_alignment();

        let mut layouts = HashMap::new();
        let mut placements = HashMap::new();

        for (section, blobs) in sections {
            let mut layout = SectionLayout::default();

            for blob in blobs {
                let mut alignment = blob.data.alignment().max(1);
                if section.is_code() {
                    alignment = alignment.max(function_alignment);
                }

                let offset = layout.length.next_multiple_of(alignment);
                layout.alignment = layout.alignment.max(alignment);
                layout.offsets.push(offset);
                layout.length = offset + blob.data.len();

                for symbol in blob.data.defined_symbols() {
                    placements.insert(symbol.node, Placement { section: *section, offset: offset + symbol.offset });
                }
            }

            trace!("Section {section:?} is {} bytes", layout.length);
            layouts.insert(*section, layout);
        }

        (layouts, placements)
    }

    /// A necessary type that was folded lives at its constructed type.
    fn placement_of(&self, target: NodeId, placements: &HashMap<NodeId, Placement>) -> Option<Placement> {
        if let Some(placement) = placements.get(&target) {
            return Some(*placement);
        }

        let NodeKey::NecessaryType(ty) = self.factory.key(target) else {
            return None;
        };

        let constructed = self.factory.existing(&NodeKey::ConstructedType(ty))?;
        placements.get(&constructed).copied()
    }

    fn apply_section_relocs(
        &self,
        section: ObjectNodeSection,
        blobs: &[Blob],
        offsets: &[usize],
        placements: &HashMap<NodeId, Placement>,
        bytes: &mut [u8],
    ) -> LinkResult<()> {
        for (blob, offset) in blobs.iter().zip(offsets) {
            for reloc in blob.data.relocs() {
                if !reloc.kind().is_section_relative() {
                    continue;
                }

                let Some(target) = self.placement_of(reloc.target(), placements) else {
                    continue;
                };

                if target.section != section {
                    continue;
                }

                let source = offset + reloc.offset();
                reloc.kind().apply(bytes, source, source as u64, target.offset as u64)
                    .map_err(|error| LinkError::Relocation { node: self.factory.display_name(blob.node), error })?;
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_object_relocations(
        &self,
        obj: &mut Object<'_>,
        symbols: &mut SymbolTable,
        section: ObjectNodeSection,
        section_id: SectionId,
        blob: &Blob,
        blob_offset: usize,
        placements: &HashMap<NodeId, Placement>,
    ) -> LinkResult<()> {
        let format = self.factory.platform().operating_system().binary_format();

        for reloc in blob.data.relocs() {
            let placement = self.placement_of(reloc.target(), placements);
            if reloc.kind().is_section_relative() && placement.is_some_and(|x| x.section == section) {
                continue;
            }

            let Some(flags) = reloc.kind().object_flags(format) else {
                continue;
            };

            let symbol = match placement {
                Some(..) => symbols.lookup(self.resolve_alias(reloc.target(), placements)),

                None if !self.marked.contains(&reloc.target()) => {
                    return Err(LinkError::UnmarkedTarget {
                        source_node: self.factory.display_name(blob.node),
                        target: self.factory.display_name(reloc.target()),
                    });
                }

                None => match self.factory.key(reloc.target()) {
                    NodeKey::ExternSymbol(name) => Some(symbols.import(obj, name)?),
                    _ => None,
                },
            };

            let Some(symbol) = symbol else {
                return Err(LinkError::MissingObjectData { node: self.factory.display_name(reloc.target()) });
            };

            let stored = reloc.kind().read_addend(blob.data.data(), reloc.offset())
                .map_err(|error| LinkError::Relocation { node: self.factory.display_name(blob.node), error })?;

            obj.add_relocation(section_id, ObjectRelocation {
                offset: (blob_offset + reloc.offset()) as u64,
                symbol,
                addend: reloc.kind().object_addend(stored),
                flags,
            })?;
        }

        Ok(())
    }

    fn resolve_alias(&self, target: NodeId, placements: &HashMap<NodeId, Placement>) -> NodeId {
        if placements.contains_key(&target) {
            return target;
        }

        match self.factory.key(target) {
            NodeKey::NecessaryType(ty) => self.factory.existing(&NodeKey::ConstructedType(ty)).unwrap_or(target),
            _ => target,
        }
    }
}

#[derive(Debug, Default)]
struct SectionLayout {
    offsets: Vec<usize>,
    length: usize,
    alignment: usize,
}

struct SymbolTable {
    prefix: &'static str,
    names: HashSet<String>,
    defined: HashMap<NodeId, SymbolId>,
    imports: HashMap<String, SymbolId>,
}

impl SymbolTable {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            names: HashSet::new(),
            defined: HashMap::new(),
            imports: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.names.len()
    }

    fn lookup(&self, node: NodeId) -> Option<SymbolId> {
        self.defined.get(&node).copied()
    }

    fn import(&mut self, obj: &mut Object<'_>, name: String) -> LinkResult<SymbolId> {
        if let Some(id) = self.imports.get(&name) {
            return Ok(*id);
        }

        let id = self.add(obj, name.clone(), None)?;
        self.imports.insert(name, id);
        Ok(id)
    }

    fn add(&mut self, obj: &mut Object<'_>, name: String, definition: Option<(SectionId, &Placement)>) -> LinkResult<SymbolId> {
        let name = format!("{}{name}", self.prefix);
        if !self.names.insert(name.clone()) {
            return Err(LinkError::DuplicateSymbol { symbol: name });
        }

        let symbol = match definition {
            Some((section, placement)) => Symbol {
                name: name.into_bytes(),
                value: placement.offset as u64,
                size: 0,
                kind: if placement.section.is_code() { SymbolKind::Text } else { SymbolKind::Data },
                scope: SymbolScope::Linkage,
                weak: false,
                section: SymbolSection::Section(section),
                flags: SymbolFlags::None,
            },

            None => Symbol {
                name: name.into_bytes(),
                value: 0,
                size: 0,
                kind: SymbolKind::Unknown,
                scope: SymbolScope::Dynamic,
                weak: false,
                section: SymbolSection::Undefined,
                flags: SymbolFlags::None,
            },
        };

        Ok(obj.add_symbol(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        node::CompiledMethod,
        type_system::{ModuleManifest, TypeSystemContext},
        Architecture,
        ObjectDataBuilder,
        OperatingSystem,
        Platform,
        RelocType,
    };

    /// `Program.Main` compiled to a single call to `puts`.
    fn calling_puts() -> (NodeFactory, NodeId, NodeId) {
        let manifest = ModuleManifest::from_toml(r#"
            [[types]]
            name = "Program"
            [[types.methods]]
            name = "Main"
            static = true
            body = [{ op = "ret" }]
        "#).unwrap();
        let ctx = TypeSystemContext::from_manifest(&manifest, 8).unwrap();
        let factory = NodeFactory::new(ctx, Platform::new(Architecture::X64, OperatingSystem::Linux));

        let main = factory.method_code(factory.type_system().resolve_method_reference("Program::Main").unwrap());
        let puts = factory.extern_symbol("puts".into());

        let mut builder = ObjectDataBuilder::new(8);
        builder.add_symbol(main);
        builder.emit_byte(0xE8);
        builder.emit_reloc(puts, RelocType::Rel32, 0);
        builder.emit_byte(0xC3);

        factory.set_method_code(main, CompiledMethod {
            data: builder.to_object_data(),
            gc_info: Vec::new(),
            eh_info: None,
            extra_dependencies: Vec::new(),
            section: ObjectNodeSection::ManagedCode,
        });

        (factory, main, puts)
    }

    #[test]
    fn marked_extern_symbols_are_imported() {
        let (factory, main, puts) = calling_puts();
        let marked = HashSet::from([main, puts]);
        let nodes = [main, puts];

        let bytes = ObjectWriter::new(&factory, &nodes, &marked, Some(main)).write().unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn unmarked_extern_symbols_are_rejected() {
        let (factory, main, _) = calling_puts();
        let marked = HashSet::from([main]);
        let nodes = [main];

        let result = ObjectWriter::new(&factory, &nodes, &marked, Some(main)).write();
        assert!(
            matches!(&result, Err(LinkError::UnmarkedTarget { target, .. }) if target.contains("puts")),
            "{result:?}",
        );
    }
}
