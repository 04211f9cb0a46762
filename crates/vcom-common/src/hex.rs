//! Short hex rendering of traffic chunks for debug logs.

use std::fmt::Write;

/// Number of leading bytes rendered by [`hex_preview`].
pub const HEX_PREVIEW_LEN: usize = 16;

/// Render up to the first [`HEX_PREVIEW_LEN`] bytes as upper-case hex pairs
/// separated by spaces. A trailing `..` marks a truncated chunk.
pub fn hex_preview(data: &[u8]) -> String {
    let shown = &data[..data.len().min(HEX_PREVIEW_LEN)];
    let mut out = String::with_capacity(shown.len() * 3 + 2);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    if data.len() > HEX_PREVIEW_LEN {
        out.push_str(" ..");
    }
    out
}
