#![no_main]

use arbitrary::Arbitrary;
use hotdylib::ContentType;
use hotdylib::select::HEADER_WINDOW;
use libfuzzer_sys::fuzz_target;

/// Header bytes, optionally prefixed with a known magic number so the
/// fuzzer spends its time inside the format-specific parsers.
#[derive(Debug, Arbitrary)]
struct FuzzInput {
    magic: Option<Magic>,
    bytes: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum Magic {
    Elf,
    MachO64,
    MachO64Swapped,
    Pe,
}

impl Magic {
    fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Elf => b"\x7fELF",
            Self::MachO64 => &[0xcf, 0xfa, 0xed, 0xfe],
            Self::MachO64Swapped => &[0xfe, 0xed, 0xfa, 0xcf],
            Self::Pe => b"MZ",
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let mut header = input.magic.as_ref().map(|m| m.bytes().to_vec()).unwrap_or_default();
    header.extend_from_slice(&input.bytes);
    header.truncate(HEADER_WINDOW);

    let sniffed = ContentType::sniff(&header);

    // Deterministic.
    assert_eq!(sniffed, ContentType::sniff(&header));

    // Only the matching family can be reported.
    match sniffed {
        ContentType::ElfSharedObject | ContentType::ElfExecutable => {
            assert!(header.starts_with(b"\x7fELF"));
        }
        ContentType::PeDll | ContentType::PeExecutable => assert!(header.starts_with(b"MZ")),
        _ => {}
    }

    let _ = sniffed.as_str();
    let _ = sniffed.is_dynamic_library();
});
