use mailparse::MailHeader;

/// Decode a header value to text.
///
/// ASCII values go through RFC 2047 encoded-word decoding. Raw 8-bit values
/// are taken as UTF-8 when they validate, with any encoded-words inside still
/// decoded; otherwise mailparse's latin-1 reading is used. Never fails.
pub fn decode_header_value(header: &MailHeader) -> String {
    let raw = header.get_value_raw();
    if !raw.is_ascii()
        && let Ok(utf8) = std::str::from_utf8(raw)
    {
        if utf8.contains("=?") {
            return decode_mixed(utf8);
        }
        return collapse_whitespace(utf8);
    }
    collapse_whitespace(&header.get_value())
}

/// Raw UTF-8 text with encoded-words mixed in. Whitespace between two
/// adjacent encoded-words is dropped.
fn decode_mixed(s: &str) -> String {
    let mut out = String::new();
    let mut prev_encoded = false;
    for token in s.split_whitespace() {
        let encoded = token.is_ascii() && token.starts_with("=?") && token.ends_with("?=");
        if !out.is_empty() && !(encoded && prev_encoded) {
            out.push(' ');
        }
        if encoded {
            out.push_str(&decode_encoded_word(token));
        } else {
            out.push_str(token);
        }
        prev_encoded = encoded;
    }
    out
}

fn decode_encoded_word(word: &str) -> String {
    let line = format!("X: {word}\r\n");
    match mailparse::parse_header(line.as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => word.to_string(),
    }
}

/// Flatten body text into a single line of at most `max_chars` characters,
/// marking a cut with `...`.
pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut truncated = false;
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() > max_chars {
            truncated = true;
            break;
        }
    }
    if !truncated {
        return out;
    }
    let mut cut: String = out.chars().take(max_chars).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str("...");
    cut
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
