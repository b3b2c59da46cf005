//! Text built from encoded bytes

use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    #[error("unknown encoding {0:?}")]
    UnknownEncoding(Box<str>),
    #[error("bytes are not valid {encoding}")]
    Malformed { encoding: &'static str },
}

/// Resolves an encoding label. Labels are matched as WHATWG labels first, then with
/// `-` and `_` removed so that spellings like `latin-1` are accepted.
fn encoding_for(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.as_bytes()).or_else(|| {
        let squashed = label.replace(['-', '_'], "");
        Encoding::for_label(squashed.as_bytes())
    })
}

/// Decodes `bytes`, as UTF-8 unless `label` names another encoding
pub(super) fn decode(bytes: &[u8], label: Option<&str>) -> Result<Box<str>, TextError> {
    let encoding = match label {
        Some(label) => {
            encoding_for(label).ok_or_else(|| TextError::UnknownEncoding(label.into()))?
        }
        None => UTF_8,
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned().into_boxed_str())
        .ok_or(TextError::Malformed {
            encoding: encoding.name(),
        })
}
