/// Longest sanitized original filename kept in a blob name.
const MAX_SANITIZED_LEN: usize = 100;

/// Reduces a client-supplied filename to `[A-Za-z0-9._-]`.
///
/// Directory components are dropped, other characters become `_`, runs of
/// dots collapse to one, leading dots are stripped and the result is capped
/// in length. An empty result becomes `file`.
pub fn sanitize_upload_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut mapped = String::with_capacity(base.len());
    for c in base.chars() {
        let c = match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        };
        if c == '.' && mapped.ends_with('.') {
            continue;
        }
        mapped.push(c);
    }

    let trimmed: String = mapped
        .trim_start_matches('.')
        .chars()
        .take(MAX_SANITIZED_LEN)
        .collect();

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        "file".to_string()
    } else {
        trimmed
    }
}

/// Whether `name` could have been produced as a blob name.
///
/// Anything with separators, control characters, `..` or a leading dot is
/// rejected before touching the store.
pub fn is_valid_blob_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
