use std::borrow::Cow;

/// Escape a value for use inside a quoted-string in a digest header.
///
/// Backslashes and double quotes get a leading backslash; anything else is passed through.
pub fn quote_for_digest(value: &str) -> Cow<'_, str> {
    if value.contains(|c| c == '\\' || c == '"') {
        Cow::Owned(value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        Cow::Borrowed(value)
    }
}
