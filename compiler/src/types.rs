// Copyright (C) 2024 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use object::pe::{IMAGE_FILE_MACHINE_AMD64, IMAGE_FILE_MACHINE_ARM64, IMAGE_FILE_MACHINE_I386};
use strum::{AsRefStr, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString)]
pub enum Architecture {
    #[strum(serialize = "x86")]
    X86,

    #[strum(serialize = "x64")]
    X64,

    #[strum(serialize = "arm64")]
    AArch64,
}

impl Architecture {
    #[must_use]
    pub const fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    #[must_use]
    pub const fn is_64_bit(&self) -> bool {
        !matches!(self, Self::X86)
    }

    /// See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#machine-types>
    #[must_use]
    pub const fn windows_machine_type(&self) -> u16 {
        match self {
            Self::X86 => IMAGE_FILE_MACHINE_I386,
            Self::X64 => IMAGE_FILE_MACHINE_AMD64,
            Self::AArch64 => IMAGE_FILE_MACHINE_ARM64,
        }
    }

    #[must_use]
    fn try_detect() -> Option<Self> {
        if cfg!(target_arch = "aarch64") {
            return Some(Self::AArch64);
        }

        if cfg!(target_arch = "x86_64") {
            return Some(Self::X64);
        }

        if cfg!(target_arch = "x86") {
            return Some(Self::X86);
        }

        None
    }

    #[must_use]
    pub const fn pointer_size(&self) -> usize {
        match self {
            Self::X86 => 4,
            Self::X64 => 8,
            Self::AArch64 => 8,
        }
    }

    /// Every method body and stub starts at a multiple of this.
    #[must_use]
    pub const fn minimum_function_alignment(&self) -> usize {
        match self {
            Self::X86 => 16,
            Self::X64 => 16,
            Self::AArch64 => 4,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::AArch64 => "arm64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString)]
pub enum OperatingSystem {
    #[strum(serialize = "linux")]
    Linux,

    #[strum(serialize = "macos")]
    MacOs,

    #[strum(serialize = "windows")]
    Windows,
}

impl OperatingSystem {
    #[must_use]
    pub const fn object_extension(&self) -> &'static str {
        match self {
            Self::Linux => "o",
            Self::MacOs => "o",
            Self::Windows => "obj",
        }
    }

    #[must_use]
    pub const fn binary_format(&self) -> object::BinaryFormat {
        match self {
            Self::Linux => object::BinaryFormat::Elf,
            Self::MacOs => object::BinaryFormat::MachO,
            Self::Windows => object::BinaryFormat::Coff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    architecture: Architecture,
    operating_system: OperatingSystem,
}

impl Platform {
    /// Returns `None` when the host is not one of the supported targets.
    #[must_use]
    pub fn host_platform() -> Option<Self> {
        let operating_system = if cfg!(target_os = "macos") {
            OperatingSystem::MacOs
        } else if cfg!(target_os = "windows") {
            OperatingSystem::Windows
        } else if cfg!(target_os = "linux") {
            OperatingSystem::Linux
        } else {
            return None;
        };

        Some(Self {
            architecture: Architecture::try_detect()?,
            operating_system,
        })
    }

    #[must_use]
    pub const fn new(architecture: Architecture, operating_system: OperatingSystem) -> Self {
        Self {
            architecture,
            operating_system,
        }
    }

    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        self.architecture
    }

    #[must_use]
    pub const fn operating_system(&self) -> OperatingSystem {
        self.operating_system
    }

    #[must_use]
    pub const fn pointer_size(&self) -> usize {
        self.architecture.pointer_size()
    }

    #[must_use]
    pub const fn is_windows(&self) -> bool {
        matches!(self.operating_system, OperatingSystem::Windows)
    }

    /// Mach-O prefixes every C symbol with an underscore.
    #[must_use]
    pub const fn symbol_prefix(&self) -> &'static str {
        match self.operating_system {
            OperatingSystem::MacOs => "_",
            _ => "",
        }
    }
}

impl From<Architecture> for object::Architecture {
    fn from(value: Architecture) -> Self {
        match value {
            Architecture::X86 => object::Architecture::I386,
            Architecture::X64 => object::Architecture::X86_64,
            Architecture::AArch64 => object::Architecture::Aarch64,
        }
    }
}

impl From<Endianness> for object::Endianness {
    fn from(value: Endianness) -> Self {
        match value {
            Endianness::Big => object::Endianness::Big,
            Endianness::Little => object::Endianness::Little,
        }
    }
}
