//! Sanitizing of externally sourced question text.
//!
//! Provider question bodies arrive as HTML fragments. Clients render plain
//! text, so tags are stripped and the common named entities decoded.

/// Strip HTML tags and decode common named entities.
pub fn sanitize(raw: &str) -> String {
    decode_entities(&strip_tags(raw)).trim().to_string()
}

fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Tags act as soft separators so "<p>a</p><p>b</p>"
                // does not fuse words.
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let Some(end) = rest.find(';').filter(|&e| e <= 8) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[..=end];
        match entity {
            "&amp;" => out.push('&'),
            "&lt;" => out.push('<'),
            "&gt;" => out.push('>'),
            "&quot;" => out.push('"'),
            "&#39;" | "&apos;" => out.push('\''),
            "&nbsp;" => out.push(' '),
            _ => {
                // Unknown entity: keep it verbatim.
                out.push_str(entity);
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}
