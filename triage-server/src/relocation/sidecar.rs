//! RAW and sidecar discovery by filename convention
//!
//! Companions share the original's basename (case-insensitive, extension
//! stripped) and live in the same folder: `IMG_0001.JPG` pairs with
//! `IMG_0001.CR2` and `img_0001.xmp`.

use shared::models::image::file_name;

/// Camera-RAW extensions
const RAW_EXTENSIONS: [&str; 26] = [
    "cr2", "cr3", "crw", "nef", "nrw", "arw", "srf", "sr2", "raf", "orf", "rw2", "pef", "dng",
    "raw", "rwl", "3fr", "fff", "iiq", "mos", "mef", "mrw", "x3f", "erf", "kdc", "dcr", "srw",
];

/// Edit/metadata sidecar extensions
const SIDECAR_EXTENSIONS: [&str; 5] = ["xmp", "dop", "pp3", "on1", "aae"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionKind {
    Raw,
    Sidecar,
}

/// Files found next to an original
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Companions {
    pub raw: Option<String>,
    pub related: Vec<String>,
}

/// Split `name.ext` into (`name`, `ext`); files without a dot have no extension
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

pub fn classify(path: &str) -> Option<CompanionKind> {
    let (_, ext) = split_extension(file_name(path));
    let ext = ext?.to_ascii_lowercase();
    if RAW_EXTENSIONS.contains(&ext.as_str()) {
        Some(CompanionKind::Raw)
    } else if SIDECAR_EXTENSIONS.contains(&ext.as_str()) {
        Some(CompanionKind::Sidecar)
    } else {
        None
    }
}

/// Pick the companions of `original` out of a folder listing.
///
/// The first RAW match wins; every sidecar match is kept in listing order.
pub fn find_companions<'a, I>(original: &str, listing: I) -> Companions
where
    I: IntoIterator<Item = &'a str>,
{
    let (stem, _) = split_extension(file_name(original));
    let stem = stem.to_lowercase();
    let mut found = Companions::default();

    for key in listing {
        if key == original {
            continue;
        }
        let (candidate, _) = split_extension(file_name(key));
        if candidate.to_lowercase() != stem {
            continue;
        }
        match classify(key) {
            Some(CompanionKind::Raw) if found.raw.is_none() => found.raw = Some(key.to_string()),
            Some(CompanionKind::Sidecar) => found.related.push(key.to_string()),
            _ => {}
        }
    }
    found
}
