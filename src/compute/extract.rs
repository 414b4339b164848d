//! Scans formula text for `{Name}` variable tokens.

use smallvec::SmallVec;

/// Token names in left-to-right order, duplicates preserved.
pub type Tokens<'t> = SmallVec<[&'t str; 8]>;

/// Returns every name written between `{` and the next `}`, verbatim.
///
/// A token is the shortest `{...}` span with a non-empty body; the body may
/// contain spaces, punctuation, even a `{`. An opening brace with no closing
/// brace after it yields nothing, and `{}` is skipped. Existence of the name is
/// not checked here.
pub fn extract(text: &str) -> Tokens<'_> {
    let mut names = Tokens::new();
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else { break };
        if close == 0 {
            // `{}`: resume right after the opening brace.
            rest = after_open;
            continue;
        }
        names.push(&after_open[..close]);
        rest = &after_open[close + 1..];
    }
    names
}

/// Like [`extract`], but each name once, in order of first appearance.
pub fn distinct(text: &str) -> Tokens<'_> {
    let mut names = Tokens::new();
    for name in extract(text) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Whether `name` appears as a `{name}` token in `text`.
pub fn references(text: &str, name: &str) -> bool {
    extract(text).iter().any(|&n| n == name)
}
