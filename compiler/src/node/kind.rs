// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use strum::{AsRefStr, EnumIter};

use crate::OperatingSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum NodeKind {
    MethodCode,
    ShadowConcreteMethod,
    MethodDictionary,
    VirtualMethodUse,
    GvmDependencies,
    NecessaryType,
    ConstructedType,
    GcStaticBase,
    NonGcStaticBase,
    GcStaticsRegionStart,
    GcStaticsRegionEnd,
    ReadyToRunHelper,
    ReadyToRunGenericHelper,
    ExternSymbol,
    PInvokeImportCell,
    StringIndirection,
    FrozenString,
}

/// The order in which kinds are emitted. Kinds sharing a section keep this
/// order inside it, which is what puts the GC static bases between the two
/// region delimiters.
pub const KIND_ORDER: [NodeKind; 17] = [
    NodeKind::ConstructedType,
    NodeKind::NecessaryType,
    NodeKind::MethodDictionary,
    NodeKind::FrozenString,
    NodeKind::NonGcStaticBase,
    NodeKind::GcStaticsRegionStart,
    NodeKind::GcStaticBase,
    NodeKind::GcStaticsRegionEnd,
    NodeKind::StringIndirection,
    NodeKind::PInvokeImportCell,
    NodeKind::MethodCode,
    NodeKind::ReadyToRunHelper,
    NodeKind::ReadyToRunGenericHelper,
    NodeKind::ShadowConcreteMethod,
    NodeKind::VirtualMethodUse,
    NodeKind::GvmDependencies,
    NodeKind::ExternSymbol,
];

impl NodeKind {
    /// A fixed number per kind. Stable across compilations, unlike the
    /// position in [`KIND_ORDER`].
    #[must_use]
    pub const fn class_code(&self) -> i32 {
        match self {
            Self::MethodCode => 788492407,
            Self::ShadowConcreteMethod => -1440570971,
            Self::MethodDictionary => -2062813722,
            Self::VirtualMethodUse => 1403040525,
            Self::GvmDependencies => 1525612425,
            Self::NecessaryType => 1000013,
            Self::ConstructedType => 1000014,
            Self::GcStaticBase => -1035437541,
            Self::NonGcStaticBase => -1075478032,
            Self::GcStaticsRegionStart => 1402133487,
            Self::GcStaticsRegionEnd => 1402133488,
            Self::ReadyToRunHelper => 19223,
            Self::ReadyToRunGenericHelper => 19224,
            Self::ExternSymbol => 1218011413,
            Self::PInvokeImportCell => -1131529371,
            Self::StringIndirection => -1011427651,
            Self::FrozenString => -1733946122,
        }
    }

    #[must_use]
    pub fn order(&self) -> usize {
        KIND_ORDER.iter().position(|x| x == self).unwrap_or(KIND_ORDER.len())
    }

    /// Kinds that only exist to carry dependencies and never produce bytes.
    #[must_use]
    pub const fn is_emitting(&self) -> bool {
        !matches!(self, Self::ShadowConcreteMethod | Self::VirtualMethodUse | Self::GvmDependencies | Self::ExternSymbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, EnumIter)]
pub enum ObjectNodeSection {
    ManagedCode,

    /// Code that can be deduplicated by the linker: helpers and throwing
    /// substitutes.
    FoldableManagedCode,
    ReadOnlyData,
    Data,
}

impl ObjectNodeSection {
    #[must_use]
    pub const fn name(&self, os: OperatingSystem) -> &'static str {
        match (self, os) {
            (Self::ManagedCode, OperatingSystem::Windows) => ".managedcode$I",
            (Self::ManagedCode, _) => "__managedcode",
            (Self::FoldableManagedCode, OperatingSystem::Windows) => ".managedcode$F",
            (Self::FoldableManagedCode, _) => "__managedcode_fold",
            (Self::ReadOnlyData, OperatingSystem::Windows) => ".rdata",
            (Self::ReadOnlyData, _) => ".rodata",
            (Self::Data, _) => ".data",
        }
    }

    #[must_use]
    pub const fn is_code(&self) -> bool {
        matches!(self, Self::ManagedCode | Self::FoldableManagedCode)
    }

    #[must_use]
    pub const fn kind(&self) -> object::SectionKind {
        match self {
            Self::ManagedCode | Self::FoldableManagedCode => object::SectionKind::Text,
            Self::ReadOnlyData => object::SectionKind::ReadOnlyData,
            Self::Data => object::SectionKind::Data,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_kind_has_a_place_in_the_order() {
        let ordered: HashSet<NodeKind> = KIND_ORDER.iter().copied().collect();
        assert_eq!(ordered.len(), KIND_ORDER.len());
        assert!(NodeKind::iter().all(|kind| ordered.contains(&kind)));
    }

    #[test]
    fn class_codes_are_unique() {
        let codes: HashSet<i32> = NodeKind::iter().map(|kind| kind.class_code()).collect();
        assert_eq!(codes.len(), NodeKind::iter().count());
    }

    #[test]
    fn gc_statics_sit_between_the_delimiters() {
        assert!(NodeKind::GcStaticsRegionStart.order() < NodeKind::GcStaticBase.order());
        assert!(NodeKind::GcStaticBase.order() < NodeKind::GcStaticsRegionEnd.order());
    }
}
