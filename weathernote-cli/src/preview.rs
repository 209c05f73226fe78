//! Preview markers in rendered HTML.
//!
//! A marker is an element whose class list contains `weather_current_N`; its
//! inner content is replaced wholesale on every refresh. A slot whose class
//! shows up on more than one element is ambiguous and left alone.

use weathernote_core::SlotId;

#[derive(Debug)]
struct Marker {
    slot: SlotId,
    /// Byte range of the element's inner content.
    inner: std::ops::Range<usize>,
}

/// The quoted value of the next `class` attribute at or after `from`, and
/// the byte offset just past its closing quote.
fn next_class_attr(html: &str, from: usize) -> Option<(&str, usize)> {
    let mut cursor = from;
    loop {
        let name = cursor + html[cursor..].find("class=")?;
        let value_start = name + "class=".len();
        cursor = value_start;

        let named = html[..name].chars().next_back().is_some_and(char::is_whitespace);
        let quote = html[value_start..].chars().next();
        let Some(quote) = quote.filter(|c| named && matches!(c, '"' | '\'')) else {
            continue;
        };

        let start = value_start + 1;
        let len = html[start..].find(quote)?;
        return Some((&html[start..start + len], start + len + 1));
    }
}

fn find_markers(html: &str) -> Vec<Marker> {
    let mut found: Vec<Marker> = Vec::new();
    let mut cursor = 0;

    while let Some((classes, attr_end)) = next_class_attr(html, cursor) {
        cursor = attr_end;

        let Some(slot) = classes.split_whitespace().find_map(SlotId::from_marker_class) else {
            continue;
        };
        let Some(open_end) = html[attr_end..].find('>').map(|i| attr_end + i + 1) else {
            break;
        };
        let Some(close) = html[open_end..].find("</div>").map(|i| open_end + i) else {
            break;
        };

        found.push(Marker { slot, inner: open_end..close });
    }

    let slots: Vec<SlotId> = found.iter().map(|m| m.slot).collect();
    found.retain(|m| slots.iter().filter(|slot| **slot == m.slot).count() == 1);
    found
}

/// Slots mounted exactly once in `html`, in document order.
pub fn mounted_markers(html: &str) -> Vec<SlotId> {
    find_markers(html).into_iter().map(|m| m.slot).collect()
}

/// Replace the inner content of `slot`'s marker. `None` when it isn't mounted.
pub fn write_marker(html: &str, slot: SlotId, content: &str) -> Option<String> {
    let marker = find_markers(html).into_iter().find(|m| m.slot == slot)?;

    let mut out = String::with_capacity(html.len() + content.len());
    out.push_str(&html[..marker.inner.start]);
    out.push_str(content);
    out.push_str(&html[marker.inner.end..]);
    Some(out)
}
