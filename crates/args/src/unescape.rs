//! Unicode escape handling for the raw argument string.
//!
//! Operators embed emoji in `--name` values; depending on how the
//! configuration reached us those may arrive as literal `\uXXXX` (including
//! surrogate pairs) or `\u{...}` escapes rather than UTF-8. Valid UTF-8
//! passes through untouched, and malformed escapes are kept literally.

/// Decode `\uXXXX` and `\u{...}` escape sequences in `raw`.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\\' || !raw[i..].starts_with("\\u") {
            out.push(c);
            continue;
        }
        // Consume the 'u'.
        chars.next();
        let rest = &raw[i + 2..];

        if let Some(stripped) = rest.strip_prefix('{') {
            if let Some(end) = stripped.find('}') {
                if let Some(decoded) = u32::from_str_radix(&stripped[..end], 16)
                    .ok()
                    .and_then(char::from_u32)
                {
                    out.push(decoded);
                    advance(&mut chars, end + 2);
                    continue;
                }
            }
            out.push_str("\\u");
            continue;
        }

        match fixed_width_unit(rest) {
            Some(unit) if (0xD800..0xDC00).contains(&unit) => {
                // High surrogate; pair it with a following \uDCxx escape.
                let tail = &rest[4..];
                if let Some(low) = tail
                    .strip_prefix("\\u")
                    .and_then(fixed_width_unit)
                    .filter(|low| (0xDC00..0xE000).contains(low))
                {
                    let combined =
                        0x10000 + ((unit as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
                    if let Some(decoded) = char::from_u32(combined) {
                        out.push(decoded);
                        advance(&mut chars, 10);
                        continue;
                    }
                }
                out.push_str("\\u");
            }
            Some(unit) => match char::from_u32(unit as u32) {
                Some(decoded) => {
                    out.push(decoded);
                    advance(&mut chars, 4);
                }
                None => out.push_str("\\u"),
            },
            None => out.push_str("\\u"),
        }
    }
    out
}

/// Parse the leading four hex digits of a fixed-width escape.
fn fixed_width_unit(rest: &str) -> Option<u16> {
    let digits = rest.get(..4)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

fn advance(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, count: usize) {
    for _ in 0..count {
        chars.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_utf8_is_untouched_including_emoji() {
        assert_eq!(unescape("--name Alice 🚀"), "--name Alice 🚀");
    }

    #[test]
    fn bmp_escape_decodes() {
        assert_eq!(unescape("--name caf\\u00e9"), "--name café");
    }

    #[test]
    fn surrogate_pair_decodes_to_emoji() {
        assert_eq!(unescape("--name \\uD83D\\uDE80-node"), "--name 🚀-node");
    }

    #[test]
    fn braced_escape_decodes() {
        assert_eq!(unescape("--name \\u{1F680}"), "--name 🚀");
    }

    #[test]
    fn malformed_escape_is_kept_literal() {
        assert_eq!(unescape("ends with \\u12"), "ends with \\u12");
        assert_eq!(unescape("lone \\uD800 surrogate"), "lone \\uD800 surrogate");
    }
}
