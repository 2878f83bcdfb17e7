//! Name normalization for remote directory segments and file names.
//!
//! Output is restricted to `[A-Za-z0-9._-]`, so it is safe as a single
//! FTP path segment on every server we talk to.

use crate::dropzone::error::{DropError, DropResult};

/// Longest segment most remote filesystems accept.
pub const MAX_SEGMENT_BYTES: usize = 255;

/// Extensions longer than this are treated as part of the name.
const MAX_EXTENSION_BYTES: usize = 16;

/// Normalize one user-supplied directory name into a safe path segment.
///
/// Umlauts become digraphs, other accented Latin letters lose their
/// accent, whitespace runs become `_`, anything else outside the safe set
/// is dropped. Leading/trailing `.` and `_` are trimmed.
pub fn normalize_segment(raw: &str) -> DropResult<String> {
    let cleaned = clean(raw);
    checked(raw, truncate(&cleaned))
}

/// Normalize an uploaded file name: keep only the base name (browsers
/// on some platforms send a full client path), then apply the segment rules.
/// Over-long names are cut in the stem so the extension survives.
pub fn sanitize_filename(raw: &str) -> DropResult<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned = clean(base);
    if cleaned.len() <= MAX_SEGMENT_BYTES {
        return checked(base, &cleaned);
    }
    match cleaned.rfind('.') {
        Some(dot) if dot > 0 && cleaned.len() - dot <= MAX_EXTENSION_BYTES => {
            let (stem, ext) = cleaned.split_at(dot);
            let stem = trim_edges(&stem[..MAX_SEGMENT_BYTES - ext.len()]);
            if stem.is_empty() {
                checked(base, truncate(&cleaned))
            } else {
                checked(base, &format!("{}{}", stem, ext))
            }
        }
        _ => checked(base, truncate(&cleaned)),
    }
}

fn clean(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
            continue;
        }
        in_space = false;

        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        } else if let Some(t) = transliterate(c) {
            out.push_str(t);
        }
    }
    trim_edges(&out).to_string()
}

fn truncate(cleaned: &str) -> &str {
    if cleaned.len() > MAX_SEGMENT_BYTES {
        // ASCII only at this point, any byte index is a char boundary.
        trim_edges(&cleaned[..MAX_SEGMENT_BYTES])
    } else {
        cleaned
    }
}

fn checked(raw: &str, name: &str) -> DropResult<String> {
    match name {
        "" => Err(DropError::validation(format!(
            "'{}' does not contain any usable characters",
            raw.trim()
        ))),
        "." | ".." => Err(DropError::validation("'.' and '..' are not valid names")),
        name => Ok(name.to_string()),
    }
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == '_')
}

fn transliterate(c: char) -> Option<&'static str> {
    let t = match c {
        'ä' => "ae",
        'ö' => "oe",
        'ü' => "ue",
        'Ä' => "Ae",
        'Ö' => "Oe",
        'Ü' => "Ue",
        'ß' => "ss",
        'à' | 'á' | 'â' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'æ' => "ae",
        'Æ' => "AE",
        'ç' | 'ć' | 'č' | 'ĉ' | 'ċ' => "c",
        'Ç' | 'Ć' | 'Č' | 'Ĉ' | 'Ċ' => "C",
        'ď' | 'đ' | 'ð' => "d",
        'Ď' | 'Đ' | 'Ð' => "D",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => "E",
        'ğ' | 'ģ' => "g",
        'Ğ' | 'Ģ' => "G",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'Į' | 'İ' => "I",
        'ķ' => "k",
        'Ķ' => "K",
        'ł' | 'ľ' | 'ĺ' | 'ļ' => "l",
        'Ł' | 'Ľ' | 'Ĺ' | 'Ļ' => "L",
        'ñ' | 'ń' | 'ň' | 'ņ' => "n",
        'Ñ' | 'Ń' | 'Ň' | 'Ņ' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ø' | 'ō' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' | 'Ō' | 'Ő' => "O",
        'œ' => "oe",
        'Œ' => "OE",
        'ŕ' | 'ř' => "r",
        'Ŕ' | 'Ř' => "R",
        'ś' | 'š' | 'ş' | 'ș' => "s",
        'Ś' | 'Š' | 'Ş' | 'Ș' => "S",
        'ť' | 'ţ' | 'ț' => "t",
        'Ť' | 'Ţ' | 'Ț' => "T",
        'þ' => "th",
        'Þ' => "Th",
        'ù' | 'ú' | 'û' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ū' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        _ => return None,
    };
    Some(t)
}
