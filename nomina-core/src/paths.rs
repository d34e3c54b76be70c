//! Lexical path handling for host-reported paths.
//!
//! Item paths come from the host's evaluation layer and may use either
//! separator (`C:\Src\App\Foo.cs`, `/src/app/Foo.cs`), independent of the
//! platform this code runs on. They are therefore handled as text: nothing
//! here touches the filesystem, and `..` is resolved lexically.

/// Separator the host used, inferred from the text.
fn separator_for(path: &str) -> char {
    if path.contains('\\') || drive_prefix(path).is_some() {
        '\\'
    } else {
        '/'
    }
}

/// `C:` style drive prefix, if any.
fn drive_prefix(path: &str) -> Option<&str> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        Some(&path[..2])
    } else {
        None
    }
}

fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

/// `true` for `/x`, `\x`, `C:\x` and `\\server\share`.
pub fn is_rooted(path: &str) -> bool {
    if path.starts_with(is_separator) {
        return true;
    }
    match drive_prefix(path) {
        Some(drive) => path[drive.len()..].starts_with(is_separator),
        None => false,
    }
}

/// Join `relative` onto `base`. A rooted `relative` is returned as is.
pub fn combine(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    if base.is_empty() || is_rooted(relative) {
        return relative.to_string();
    }
    let sep = separator_for(base);
    let mut joined = base.trim_end_matches(is_separator).to_string();
    joined.push(sep);
    joined.push_str(relative);
    joined
}

/// Collapse `.`/`..` segments and duplicate separators.
///
/// `..` above a rooted path's root is dropped; on relative paths it is kept.
pub fn canonicalize(path: &str) -> String {
    let sep = separator_for(path);
    let (root, rest) = split_root(path, sep);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(is_separator) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if !root.is_empty() => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut out = root;
    out.push_str(&segments.join(&sep.to_string()));
    out
}

/// `combine` then `canonicalize`.
pub fn resolve(base: &str, relative: &str) -> String {
    canonicalize(&combine(base, relative))
}

/// Everything before the last separator; empty when there is none.
pub fn directory_name(path: &str) -> &str {
    match path.rfind(is_separator) {
        Some(0) => &path[..1],
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn split_root(path: &str, sep: char) -> (String, &str) {
    if let Some(rest) = path.strip_prefix("\\\\") {
        return (String::from("\\\\"), rest);
    }
    if let Some(drive) = drive_prefix(path) {
        let rest = &path[drive.len()..];
        return match rest.strip_prefix(is_separator) {
            Some(after) => (format!("{drive}{sep}"), after),
            None => (drive.to_string(), rest),
        };
    }
    match path.strip_prefix(is_separator) {
        Some(rest) => (sep.to_string(), rest),
        None => (String::new(), path),
    }
}
