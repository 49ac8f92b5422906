/// Minimal `{placeholder}` expansion for branch names and review-request
/// text. Unknown placeholders are left in place so a typo is visible in
/// the rendered output instead of silently vanishing.
pub fn expand(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Reduce a value to characters that are safe inside a git ref segment.
pub fn ref_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect()
}
