//! Content type detection for candidate module files.
//!
//! Files are classified from their header bytes rather than their extension,
//! so a half-written artifact or a stray text file with a `.so` suffix is
//! never mistaken for a loadable library.
//!
//! | Variant | Header |
//! |---------|--------|
//! | [`ContentType::ElfSharedObject`] | ELF, `e_type == ET_DYN`, no `PT_INTERP` |
//! | [`ContentType::ElfExecutable`] | ELF, `ET_EXEC`, or `ET_DYN` with `PT_INTERP` (PIE) |
//! | [`ContentType::MachODylib`] | thin Mach-O, `filetype == MH_DYLIB` |
//! | [`ContentType::MachOExecutable`] | thin Mach-O, `filetype == MH_EXECUTE` |
//! | [`ContentType::PeDll`] | PE image with `IMAGE_FILE_DLL` |
//! | [`ContentType::PeExecutable`] | PE image without `IMAGE_FILE_DLL` |
//!
//! Universal (fat) Mach-O files are reported as [`ContentType::Other`].

use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of leading bytes inspected when sniffing a file.
pub const HEADER_WINDOW: usize = 4096;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const PT_INTERP: u32 = 3;

const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_EXECUTE: u32 = 0x2;
const MH_DYLIB: u32 = 0x6;

const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const IMAGE_FILE_DLL: u16 = 0x2000;

/// The kind of file a candidate module turned out to be.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ContentType {
    /// ELF shared object (Linux, BSD `.so`).
    ElfSharedObject,
    /// ELF executable, including position-independent executables.
    ElfExecutable,
    /// Mach-O dynamic library (macOS `.dylib`).
    MachODylib,
    /// Mach-O executable.
    MachOExecutable,
    /// PE dynamic-link library (Windows `.dll`).
    PeDll,
    /// PE executable.
    PeExecutable,
    /// Anything else, including empty and truncated files.
    Other,
}

impl ContentType {
    /// The dynamic library type of the platform this crate was compiled for.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_vendor = "apple") {
            Self::MachODylib
        } else if cfg!(windows) {
            Self::PeDll
        } else {
            Self::ElfSharedObject
        }
    }

    /// Returns `true` for the three dynamic library types.
    #[must_use]
    pub const fn is_dynamic_library(self) -> bool {
        matches!(self, Self::ElfSharedObject | Self::MachODylib | Self::PeDll)
    }

    /// Short identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ElfSharedObject => "elf-shared-object",
            Self::ElfExecutable => "elf-executable",
            Self::MachODylib => "mach-o-dylib",
            Self::MachOExecutable => "mach-o-executable",
            Self::PeDll => "pe-dll",
            Self::PeExecutable => "pe-executable",
            Self::Other => "other",
        }
    }

    /// Classifies a file from its leading bytes.
    ///
    /// Never panics; anything unrecognized or truncated is [`ContentType::Other`].
    #[must_use]
    pub fn sniff(header: &[u8]) -> Self {
        if header.starts_with(ELF_MAGIC) {
            return sniff_elf(header);
        }
        if header.starts_with(b"MZ") {
            return sniff_pe(header);
        }
        sniff_mach_o(header)
    }

    /// Reads up to [`HEADER_WINDOW`] bytes of `path` and classifies them.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened or read.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut header = Vec::with_capacity(HEADER_WINDOW);
        File::open(path)?
            .take(HEADER_WINDOW as u64)
            .read_to_end(&mut header)?;
        Ok(Self::sniff(&header))
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn read_u16(bytes: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u16::from_le_bytes(raw),
        Endian::Big => u16::from_be_bytes(raw),
    })
}

fn read_u32(bytes: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u32::from_le_bytes(raw),
        Endian::Big => u32::from_be_bytes(raw),
    })
}

fn read_u64(bytes: &[u8], offset: usize, endian: Endian) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u64::from_le_bytes(raw),
        Endian::Big => u64::from_be_bytes(raw),
    })
}

fn sniff_elf(header: &[u8]) -> ContentType {
    let is_64 = match header.get(4) {
        Some(1) => false,
        Some(2) => true,
        _ => return ContentType::Other,
    };
    let endian = match header.get(5) {
        Some(1) => Endian::Little,
        Some(2) => Endian::Big,
        _ => return ContentType::Other,
    };

    match read_u16(header, 16, endian) {
        Some(ET_EXEC) => ContentType::ElfExecutable,
        Some(ET_DYN) if has_interpreter(header, is_64, endian) => ContentType::ElfExecutable,
        Some(ET_DYN) => ContentType::ElfSharedObject,
        _ => ContentType::Other,
    }
}

/// Whether the program header table (as far as it lies inside the header
/// window) contains a `PT_INTERP` entry.
fn has_interpreter(header: &[u8], is_64: bool, endian: Endian) -> bool {
    let table = if is_64 {
        read_u64(header, 32, endian)
            .and_then(|off| usize::try_from(off).ok())
            .zip(read_u16(header, 54, endian))
            .zip(read_u16(header, 56, endian))
    } else {
        read_u32(header, 28, endian)
            .and_then(|off| usize::try_from(off).ok())
            .zip(read_u16(header, 42, endian))
            .zip(read_u16(header, 44, endian))
    };
    let Some(((phoff, phentsize), phnum)) = table else {
        return false;
    };
    if phoff == 0 || phentsize == 0 {
        return false;
    }

    (0..usize::from(phnum))
        .filter_map(|i| phoff.checked_add(i.checked_mul(usize::from(phentsize))?))
        .map_while(|entry| read_u32(header, entry, endian))
        .any(|p_type| p_type == PT_INTERP)
}

fn sniff_mach_o(header: &[u8]) -> ContentType {
    let endian = match read_u32(header, 0, Endian::Little) {
        Some(MH_MAGIC | MH_MAGIC_64) => Endian::Little,
        _ => match read_u32(header, 0, Endian::Big) {
            Some(MH_MAGIC | MH_MAGIC_64) => Endian::Big,
            _ => return ContentType::Other,
        },
    };

    match read_u32(header, 12, endian) {
        Some(MH_DYLIB) => ContentType::MachODylib,
        Some(MH_EXECUTE) => ContentType::MachOExecutable,
        _ => ContentType::Other,
    }
}

fn sniff_pe(header: &[u8]) -> ContentType {
    let Some(pe_offset) = read_u32(header, 0x3c, Endian::Little).and_then(|o| usize::try_from(o).ok())
    else {
        return ContentType::Other;
    };
    let signature = pe_offset
        .checked_add(4)
        .and_then(|end| header.get(pe_offset..end));
    if signature != Some(PE_SIGNATURE.as_slice()) {
        return ContentType::Other;
    }

    // COFF characteristics follow the signature and five other header fields.
    match pe_offset
        .checked_add(22)
        .and_then(|offset| read_u16(header, offset, Endian::Little))
    {
        Some(characteristics) if characteristics & IMAGE_FILE_DLL != 0 => ContentType::PeDll,
        Some(_) => ContentType::PeExecutable,
        None => ContentType::Other,
    }
}
