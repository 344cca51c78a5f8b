//! Property-based tests for selection and content sniffing invariants.

#![allow(clippy::pedantic)]

use proptest::prelude::*;

// ============================================================================
// Content Sniffing Properties
// ============================================================================

mod sniff_properties {
    use super::*;
    use hotdylib::ContentType;

    proptest! {
        /// sniff never panics on arbitrary bytes
        #[test]
        fn sniff_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = ContentType::sniff(&bytes);
        }

        /// Anything without a known magic number is Other
        #[test]
        fn unknown_magic_is_other(mut bytes in prop::collection::vec(any::<u8>(), 4..256)) {
            bytes[0] = b'#';
            prop_assert_eq!(ContentType::sniff(&bytes), ContentType::Other);
        }

        /// An ELF header with ET_DYN and no program headers is a shared object,
        /// whatever follows the identification bytes
        #[test]
        fn elf_dyn_without_program_headers(tail in prop::collection::vec(any::<u8>(), 48..=48)) {
            let mut header = b"\x7fELF\x02\x01\x01".to_vec();
            header.extend_from_slice(&[0; 9]);
            header.extend_from_slice(&tail);
            header[16..18].copy_from_slice(&3u16.to_le_bytes());
            // No program header table.
            header[32..40].copy_from_slice(&0u64.to_le_bytes());

            prop_assert_eq!(ContentType::sniff(&header), ContentType::ElfSharedObject);
        }
    }
}

// ============================================================================
// Selection Properties
// ============================================================================

mod selection_properties {
    use super::*;
    use hotdylib::{CandidateModule, ContentType, ModuleSelector};
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    fn candidates() -> impl Strategy<Value = Vec<CandidateModule>> {
        prop::collection::vec(
            (0u8..20, 0u64..10, any::<bool>(), any::<bool>()),
            0..24,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(name, secs, matches, regular)| CandidateModule {
                    path: PathBuf::from(format!("/m/lib{name}.so")),
                    modified: UNIX_EPOCH + Duration::from_secs(secs),
                    content_type: if matches {
                        ContentType::ElfSharedObject
                    } else {
                        ContentType::ElfExecutable
                    },
                    is_regular_file: regular,
                })
                .collect()
        })
    }

    proptest! {
        /// The winner does not depend on listing order
        #[test]
        fn pick_is_order_independent(list in candidates()) {
            let selector = ModuleSelector::new(ContentType::ElfSharedObject);
            let mut reversed = list.clone();
            reversed.reverse();

            prop_assert_eq!(selector.pick(list), selector.pick(reversed));
        }

        /// The winner qualifies and no qualifying candidate is newer
        #[test]
        fn pick_is_newest_qualifying(list in candidates()) {
            let selector = ModuleSelector::new(ContentType::ElfSharedObject);
            let qualifying: Vec<_> = list
                .iter()
                .filter(|c| c.qualifies(ContentType::ElfSharedObject))
                .cloned()
                .collect();

            match selector.pick(list) {
                None => prop_assert!(qualifying.is_empty()),
                Some(winner) => {
                    prop_assert!(qualifying.iter().any(|c| c.path == winner.path()));
                    prop_assert!(qualifying.iter().all(|c| c.modified <= winner.modified()));
                    prop_assert!(qualifying
                        .iter()
                        .filter(|c| c.modified == winner.modified())
                        .all(|c| c.path.as_path() >= winner.path()));
                }
            }
        }
    }
}
