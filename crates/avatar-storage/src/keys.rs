//! Shared filename generation for avatar variants.
//!
//! Filename format: `{token}-{variant}.{ext}`, e.g. `3f2c...9a-full.png`.
//! Files written by older releases carry `-bpfull` / `-bpthumb` instead; they
//! are parsed so `delete` can clean them, but never written.

use avatar_core::SizeVariant;
use uuid::Uuid;

const LEGACY_MARKER: &str = "bp";

/// A filename recognized as one variant of an avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFile {
    pub token: String,
    pub variant: SizeVariant,
    pub extension: String,
    pub legacy: bool,
}

/// Build the filename of one variant of a generation batch.
pub fn variant_filename(token: &str, variant: SizeVariant, extension: &str) -> String {
    format!("{}-{}.{}", token, variant.as_str(), extension)
}

/// Fresh collision-resistant token (uuid v4, simple form).
pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Parse a filename written by `variant_filename` (or a legacy one).
///
/// Returns `None` for anything else, including names with an empty token or
/// extension.
pub fn parse_variant_filename(name: &str) -> Option<VariantFile> {
    let (stem, extension) = name.rsplit_once('.')?;
    if extension.is_empty() || extension.contains('/') {
        return None;
    }

    for variant in SizeVariant::ALL {
        let canonical = format!("-{}", variant.as_str());
        let legacy = format!("-{}{}", LEGACY_MARKER, variant.as_str());

        let (token, is_legacy) = if let Some(token) = stem.strip_suffix(&legacy) {
            (token, true)
        } else if let Some(token) = stem.strip_suffix(&canonical) {
            (token, false)
        } else {
            continue;
        };

        if token.is_empty() {
            return None;
        }

        return Some(VariantFile {
            token: token.to_string(),
            variant,
            extension: extension.to_lowercase(),
            legacy: is_legacy,
        });
    }

    None
}
