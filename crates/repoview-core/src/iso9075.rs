//! # ISO 9075 Name Escaping
//!
//! Local names in the repository may contain characters that are not legal in
//! an XML element name (spaces, leading digits, punctuation). They are written
//! as `_xHHHH_` escapes of the UTF-16 code unit and decoded again on import.

/// Escape a local name so it is a valid XML name.
#[must_use]
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.char_indices() {
        let valid = if i == 0 {
            is_name_start(c)
        } else {
            is_name_char(c)
        };
        if valid && !(c == '_' && looks_escaped(&name[i..])) {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("_x{:04X}_", unit));
            }
        }
    }
    out
}

/// Reverse [`encode`]. Malformed escapes are kept literally.
#[must_use]
pub fn decode(name: &str) -> String {
    if !name.contains("_x") {
        return name.to_string();
    }
    let mut units: Vec<u16> = Vec::with_capacity(name.len());
    let mut rest = name;
    while !rest.is_empty() {
        if looks_escaped(rest) {
            if let Ok(unit) = u16::from_str_radix(&rest[2..6], 16) {
                units.push(unit);
                rest = &rest[7..];
                continue;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
        }
        rest = chars.as_str();
    }
    String::from_utf16_lossy(&units)
}

fn looks_escaped(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_numeric() || c == '-' || c == '.'
}
