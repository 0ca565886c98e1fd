/// Quotes `name` as at most two parts, splitting on the last `.`.
pub fn quote_identifier(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((qualifier, column)) => format!("{}.{}", quote_part(qualifier), quote_part(column)),
        None => quote_part(name),
    }
}

/// Output label for a projected column; keeps the caller's casing.
pub fn quote_label(label: &str) -> String {
    format!("\"{}\"", label.replace('"', "\"\""))
}

pub fn sanitize_alias(name: &str, max_len: usize, fallback: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let truncated: String = replaced.trim_matches('_').chars().take(max_len).collect();

    if truncated.is_empty() {
        fallback.to_string()
    } else {
        truncated
    }
}

fn quote_part(part: &str) -> String {
    format!("\"{}\"", part.to_uppercase().replace('"', "\"\""))
}

fn qualified_column(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_part(alias), quote_part(column))
}

/// Token safe to use inside aliases and placeholder names.
fn name_token(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
