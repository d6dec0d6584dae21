//! Text passes applied to everything that lands in a report.
//!
//! Each pass is a plain function over `&str`/`&[u8]`; the writer composes them.

/// Prefix every line with a tab so Markdown renders it as a code block.
///
/// A trailing newline yields a final tab-only line, and empty input yields a
/// single tab, so program output that ends without a newline is visibly
/// different from output that ends with one.
pub fn indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16 + 1);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push('\t');
        out.push_str(line);
    }
    out
}

/// Keep at most `limit` bytes of captured output.
///
/// The cut is byte-based; a multi-byte character split at the boundary is
/// rendered as U+FFFD.
pub fn truncate_output(output: &[u8], limit: usize) -> String {
    let kept = &output[..output.len().min(limit)];
    String::from_utf8_lossy(kept).into_owned()
}

/// True when script output has nothing worth showing.
///
/// Any whitespace counts as blank, so a script that prints only spaces and a
/// newline adds no section.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
