// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use object::{elf, macho, pe, BinaryFormat, RelocationEncoding, RelocationFlags, RelocationKind};

use crate::{NodeId, RelocationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub(crate) offset: usize,
    pub(crate) target: NodeId,
    pub(crate) kind: RelocType,
}

impl Relocation {
    #[must_use]
    pub const fn new(offset: usize, target: NodeId, kind: RelocType) -> Self {
        Self { offset, target, kind }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.target
    }

    #[must_use]
    pub const fn kind(&self) -> RelocType {
        self.kind
    }
}

/// Relocation kinds, numbered like their PE counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RelocType {
    /// No relocation required
    Absolute = 0x00,

    /// The 32-bit address without an image base (RVA)
    Addr32Nb = 0x02,

    /// 32 bit address base
    HighLow = 0x03,

    /// 64 bit address base
    Dir64 = 0x0A,

    /// 32-bit relative address from byte following reloc
    Rel32 = 0x10,

    /// Arm64: B, BL
    Arm64Branch26 = 0x14,

    /// 32-bit relative address from byte starting reloc
    RelPtr32 = 0x7C,

    /// 32 bit offset from base of section containing target
    SecRel = 0x80,

    /// ADRP
    Arm64PageBaseRel21 = 0x81,

    /// ADD/ADDS (immediate) with zero shift, for page offset
    Arm64PageOffset12A = 0x82,

    /// LDR (indexed, unsigned immediate), for page offset
    Arm64PageOffset12L = 0x83,
}

impl RelocType {
    /// Number of bytes at the relocation offset this kind touches.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Absolute => 0,
            Self::Dir64 => 8,
            _ => 4,
        }
    }

    /// Whether the bytes at the relocation offset hold an instruction rather
    /// than a plain value.
    #[must_use]
    pub const fn patches_instruction(&self) -> bool {
        matches!(self, Self::Arm64Branch26 | Self::Arm64PageBaseRel21 | Self::Arm64PageOffset12A | Self::Arm64PageOffset12L)
    }

    /// These only depend on the distance between source and target, so they
    /// can be resolved once both live in the same section.
    #[must_use]
    pub const fn is_section_relative(&self) -> bool {
        matches!(self, Self::Rel32 | Self::RelPtr32 | Self::Arm64Branch26)
    }

    /// Reads the addend that was stored in place when the relocation was emitted.
    pub fn read_addend(&self, bytes: &[u8], offset: usize) -> Result<i64, RelocationError> {
        let slice = self.slice(bytes, offset)?;

        Ok(match self {
            Self::Dir64 => i64::from_le_bytes(array(slice)),
            _ if self.patches_instruction() => 0,
            Self::Absolute => 0,
            _ => i32::from_le_bytes(array(slice)) as i64,
        })
    }

    /// Applies the relocation to `bytes[offset..]`, where `source` is the
    /// address of the relocated location and `target` is the address of the
    /// symbol it refers to.
    pub fn apply(&self, bytes: &mut [u8], offset: usize, source: u64, target: u64) -> Result<(), RelocationError> {
        let kind = *self;
        let slice = self.slice_mut(bytes, offset)?;

        match kind {
            Self::Absolute => (),

            Self::Addr32Nb | Self::HighLow => {
                let value = i32::from_le_bytes(array(slice)) as i64 + target as i64;
                let value = u32::try_from(value).map_err(|_| RelocationError::OutOfRange { kind, value })?;
                slice[0..4].copy_from_slice(&value.to_le_bytes());
            }

            Self::Dir64 => {
                let value = i64::from_le_bytes(array(slice)).wrapping_add(target as i64);
                slice[0..8].copy_from_slice(&value.to_le_bytes());
            }

            Self::Rel32 => {
                let value = i32::from_le_bytes(array(slice)) as i64 + target as i64 - (source as i64 + 4);
                let value = i32::try_from(value).map_err(|_| RelocationError::OutOfRange { kind, value })?;
                slice[0..4].copy_from_slice(&value.to_le_bytes());
            }

            Self::RelPtr32 => {
                let value = i32::from_le_bytes(array(slice)) as i64 + target as i64 - source as i64;
                let value = i32::try_from(value).map_err(|_| RelocationError::OutOfRange { kind, value })?;
                slice[0..4].copy_from_slice(&value.to_le_bytes());
            }

            Self::Arm64Branch26 => {
                let delta = target as i64 - source as i64;
                if delta % 4 != 0 || !fits_signed(delta >> 2, 26) {
                    return Err(RelocationError::OutOfRange { kind, value: delta });
                }

                let instruction = u32::from_le_bytes(array(slice));
                let instruction = (instruction & 0xFC00_0000) | take_bits((delta >> 2) as u32, 26);
                slice[0..4].copy_from_slice(&instruction.to_le_bytes());
            }

            Self::Arm64PageBaseRel21 => {
                let pages = (target as i64 >> 12) - (source as i64 >> 12);
                if !fits_signed(pages, 21) {
                    return Err(RelocationError::OutOfRange { kind, value: pages });
                }

                let pages = pages as u32;
                let instruction = u32::from_le_bytes(array(slice));
                let instruction = (instruction & 0x9F00_001F)
                    | (take_bits(pages, 2) << 29)
                    | (take_bits(pages >> 2, 19) << 5);
                slice[0..4].copy_from_slice(&instruction.to_le_bytes());
            }

            Self::Arm64PageOffset12A => {
                let instruction = u32::from_le_bytes(array(slice));
                let instruction = (instruction & 0xFFC0_03FF) | ((target as u32 & 0xFFF) << 10);
                slice[0..4].copy_from_slice(&instruction.to_le_bytes());
            }

            Self::Arm64PageOffset12L => {
                let instruction = u32::from_le_bytes(array(slice));
                // The immediate is scaled by the access size, found in bits 30 and 31.
                let scale = instruction >> 30;
                let page_offset = target as u32 & 0xFFF;
                if page_offset & ((1 << scale) - 1) != 0 {
                    return Err(RelocationError::OutOfRange { kind, value: page_offset as i64 });
                }

                let instruction = (instruction & 0xFFC0_03FF) | ((page_offset >> scale) << 10);
                slice[0..4].copy_from_slice(&instruction.to_le_bytes());
            }

            Self::SecRel => return Err(RelocationError::Unsupported { kind }),
        }

        Ok(())
    }

    /// The flags to hand to the `object` crate, or `None` when no file-level
    /// relocation is needed.
    #[must_use]
    pub(crate) fn object_flags(&self, format: BinaryFormat) -> Option<RelocationFlags> {
        let generic = |kind, encoding, size| Some(RelocationFlags::Generic { kind, encoding, size });

        match self {
            Self::Absolute => None,
            Self::Addr32Nb => generic(RelocationKind::ImageOffset, RelocationEncoding::Generic, 32),
            Self::HighLow => generic(RelocationKind::Absolute, RelocationEncoding::Generic, 32),
            Self::Dir64 => generic(RelocationKind::Absolute, RelocationEncoding::Generic, 64),
            Self::Rel32 => generic(RelocationKind::Relative, RelocationEncoding::Generic, 32),
            Self::RelPtr32 => generic(RelocationKind::Relative, RelocationEncoding::Generic, 32),
            Self::SecRel => generic(RelocationKind::SectionOffset, RelocationEncoding::Generic, 32),
            Self::Arm64Branch26 => generic(RelocationKind::Relative, RelocationEncoding::AArch64Call, 26),

            Self::Arm64PageBaseRel21 => Some(match format {
                BinaryFormat::MachO => RelocationFlags::MachO {
                    r_type: macho::ARM64_RELOC_PAGE21,
                    r_pcrel: true,
                    r_length: 2,
                },
                BinaryFormat::Coff => RelocationFlags::Coff { typ: pe::IMAGE_REL_ARM64_PAGEBASE_REL21 },
                _ => RelocationFlags::Elf { r_type: elf::R_AARCH64_ADR_PREL_PG_HI21 },
            }),

            Self::Arm64PageOffset12A => Some(match format {
                BinaryFormat::MachO => RelocationFlags::MachO {
                    r_type: macho::ARM64_RELOC_PAGEOFF12,
                    r_pcrel: false,
                    r_length: 2,
                },
                BinaryFormat::Coff => RelocationFlags::Coff { typ: pe::IMAGE_REL_ARM64_PAGEOFFSET_12A },
                _ => RelocationFlags::Elf { r_type: elf::R_AARCH64_ADD_ABS_LO12_NC },
            }),

            Self::Arm64PageOffset12L => Some(match format {
                BinaryFormat::MachO => RelocationFlags::MachO {
                    r_type: macho::ARM64_RELOC_PAGEOFF12,
                    r_pcrel: false,
                    r_length: 2,
                },
                BinaryFormat::Coff => RelocationFlags::Coff { typ: pe::IMAGE_REL_ARM64_PAGEOFFSET_12L },
                _ => RelocationFlags::Elf { r_type: elf::R_AARCH64_LDST64_ABS_LO12_NC },
            }),
        }
    }

    /// The addend for the object file relocation, given the value stored in place.
    #[must_use]
    pub(crate) fn object_addend(&self, stored: i64) -> i64 {
        match self {
            // The object crate measures from the start of the field, REL32 from its end.
            Self::Rel32 => stored - 4,
            _ => stored,
        }
    }

    fn slice<'a>(&self, bytes: &'a [u8], offset: usize) -> Result<&'a [u8], RelocationError> {
        bytes.get(offset..offset + self.size())
            .ok_or(RelocationError::OutOfBounds { kind: *self, offset, length: bytes.len() })
    }

    fn slice_mut<'a>(&self, bytes: &'a mut [u8], offset: usize) -> Result<&'a mut [u8], RelocationError> {
        let length = bytes.len();
        bytes.get_mut(offset..offset + self.size())
            .ok_or(RelocationError::OutOfBounds { kind: *self, offset, length })
    }
}

#[must_use]
pub(crate) const fn take_bits(i: u32, n: u32) -> u32 {
    i & ((1 << n) - 1)
}

#[must_use]
pub(crate) const fn fits_signed(value: i64, bits: u32) -> bool {
    let limit = 1i64 << (bits - 1);
    value >= -limit && value < limit
}

#[must_use]
fn array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut bytes = [0; N];
    bytes.copy_from_slice(&slice[0..N]);
    bytes
}
