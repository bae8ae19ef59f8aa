//! Depth-first search of a message's part tree.

use crate::gmail::types::MessagePart;
use tracing::debug;

/// Predicate matching parts whose MIME type equals `target` exactly.
pub fn content_type_is(target: &str) -> impl Fn(&MessagePart) -> bool + '_ {
    move |part| part.mime_type == target
}

/// Collect the parts under `root` (inclusive) accepted by `is_match`, in
/// pre-order, left to right. A matching part is not descended into.
pub fn find_parts<'a, F>(root: &'a MessagePart, is_match: F) -> Vec<&'a MessagePart>
where
    F: Fn(&MessagePart) -> bool,
{
    let mut found = Vec::new();
    walk(root, &is_match, 0, &mut found);
    found
}

fn walk<'a, F>(
    part: &'a MessagePart,
    is_match: &F,
    depth: usize,
    found: &mut Vec<&'a MessagePart>,
) where
    F: Fn(&MessagePart) -> bool,
{
    let indent = "-".repeat(depth * 4);
    debug!(
        "{}part {:?} mime type {} file name {:?}",
        indent, part.part_id, part.mime_type, part.filename
    );

    if is_match(part) {
        for header in &part.headers {
            debug!("{}header {}: {}", indent, header.name, header.value);
        }
        found.push(part);
        return;
    }

    for child in &part.parts {
        walk(child, is_match, depth + 1, found);
    }
}
