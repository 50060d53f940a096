/// Text cleanup shared by adapters and the run store.
pub mod text {
    /// Decode `bytes` as UTF-8, dropping every invalid sequence instead of
    /// replacing it.
    pub fn sanitize_utf8(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        for chunk in bytes.utf8_chunks() {
            out.push_str(chunk.valid());
        }
        out
    }

    /// Remove `\uXXXX` escapes naming an unpaired UTF-16 surrogate from a
    /// JSON document. Properly paired surrogates and every other escape are
    /// left alone.
    pub fn drop_lone_surrogate_escapes(json: &str) -> String {
        const HIGH: std::ops::Range<u32> = 0xD800..0xDC00;
        const LOW: std::ops::Range<u32> = 0xDC00..0xE000;

        let bytes = json.as_bytes();
        let mut out = String::with_capacity(json.len());
        let mut copied = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\\' {
                i += 1;
                continue;
            }
            match unicode_escape(bytes, i) {
                Some(unit) if HIGH.contains(&unit) => {
                    if unicode_escape(bytes, i + 6).is_some_and(|next| LOW.contains(&next)) {
                        i += 12;
                    } else {
                        out.push_str(&json[copied..i]);
                        i += 6;
                        copied = i;
                    }
                }
                Some(unit) if LOW.contains(&unit) => {
                    out.push_str(&json[copied..i]);
                    i += 6;
                    copied = i;
                }
                Some(_) => i += 6,
                // Any other escape, including `\\`, is two bytes long.
                None => i += 2,
            }
        }
        out.push_str(&json[copied..]);
        out
    }

    /// Response body ready for `serde_json`: invalid UTF-8 and lone
    /// surrogate escapes removed.
    pub fn sanitize_json(bytes: &[u8]) -> String {
        drop_lone_surrogate_escapes(&sanitize_utf8(bytes))
    }

    fn unicode_escape(bytes: &[u8], at: usize) -> Option<u32> {
        let escape = bytes.get(at..at + 6)?;
        if escape[0] != b'\\' || escape[1] != b'u' {
            return None;
        }
        let hex = std::str::from_utf8(&escape[2..]).ok()?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()
    }

    /// Collapse runs of whitespace (including newlines) into single spaces and trim.
    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Cut `text` after `max_chars` characters and mark the cut with `...`.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
            None => text.to_string(),
        }
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Resolve `href` against `base`. Absolute http(s) links pass through untouched.
    pub fn absolutize(base: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return Some(href.to_string());
        }
        base.join(href).ok().map(String::from)
    }

    pub fn is_valid_http_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => url.scheme() == "http" || url.scheme() == "https",
            Err(_) => false,
        }
    }
}
