//! JSON Pointer helpers (RFC 6901) for `$ref` strings and error locations.

use std::borrow::Cow;

/// Escape one segment (`~` → `~0`, `/` → `~1`). Definition names rarely
/// need it, so the segment is borrowed when nothing changes.
pub fn escape_pointer_segment(segment: &str) -> Cow<'_, str> {
    match segment.contains(['~', '/']) {
        true => Cow::Owned(segment.replace('~', "~0").replace('/', "~1")),
        false => Cow::Borrowed(segment),
    }
}

/// Reverse of [`escape_pointer_segment`]. `~1` is decoded before `~0` so
/// that `~01` stays `~1`.
pub fn unescape_pointer_segment(segment: &str) -> Cow<'_, str> {
    match segment.contains('~') {
        true => Cow::Owned(segment.replace("~1", "/").replace("~0", "~")),
        false => Cow::Borrowed(segment),
    }
}

/// Render a segment list as a `#/...` pointer.
///
/// # Example
/// ```
/// use xso_normalize_core::render_path;
/// assert_eq!(render_path(&["definitions", "a/b"]), "#/definitions/a~1b");
/// ```
pub fn render_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::from("#");
    for segment in segments {
        path.push('/');
        path.push_str(&escape_pointer_segment(segment.as_ref()));
    }
    path
}

/// Split a JSON Pointer path into decoded segments.
///
/// # Example
/// ```
/// use xso_normalize_core::split_path;
/// assert_eq!(split_path("#/definitions/a~1b/items"), vec!["definitions", "a/b", "items"]);
/// assert_eq!(split_path("#"), Vec::<String>::new());
/// ```
pub fn split_path(path: &str) -> Vec<String> {
    let pointer = path.strip_prefix('#').unwrap_or(path);
    let pointer = pointer.strip_prefix('/').unwrap_or(pointer);
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .split('/')
        .map(|segment| unescape_pointer_segment(segment).into_owned())
        .collect()
}
