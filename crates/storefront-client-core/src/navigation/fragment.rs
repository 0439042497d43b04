use tracing::debug;

/// Anchor labels that identify the site's primary navigation bar.
pub const DEFAULT_PRIMARY_NAV_LABELS: [&str; 2] = ["Home", "Search Products"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentResponse {
    pub status: u16,
    pub title: Option<String>,
    pub body: String,
}

impl FragmentResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Removes `<nav>` elements whose anchors carry one of `labels`, so a fragment
/// that embeds the site header does not duplicate the one already on the page.
///
/// This is a label heuristic: it depends on the wording of the navigation bar
/// and misses it entirely if the labels change.
pub fn strip_primary_navigation<S: AsRef<str>>(html: &str, labels: &[S]) -> String {
    if labels.is_empty() {
        return html.to_string();
    }

    let lower = html.to_ascii_lowercase();
    let mut output = String::with_capacity(html.len());
    let mut cursor = 0;
    while let Some(start) = find_tag(&lower, "<nav", cursor) {
        let Some(end) = element_end(&lower, start) else {
            break;
        };
        output.push_str(&html[cursor..start]);
        let element = &html[start..end];
        let is_primary = anchor_texts(element)
            .iter()
            .any(|text| labels.iter().any(|label| text.contains(label.as_ref())));
        if is_primary {
            debug!(bytes = element.len(), "stripped duplicate primary navigation");
        } else {
            output.push_str(element);
        }
        cursor = end;
    }
    output.push_str(&html[cursor..]);
    output
}

/// Byte offset of the next `open` tag at or after `from`, ignoring longer tag
/// names that share the prefix (`<navbar>` is not `<nav>`).
fn find_tag(lower: &str, open: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(offset) = lower.get(search..)?.find(open) {
        let at = search + offset;
        let next = lower.as_bytes().get(at + open.len()).copied();
        if next.is_some_and(|byte| byte == b'>' || byte == b'/' || byte.is_ascii_whitespace()) {
            return Some(at);
        }
        search = at + open.len();
    }
    None
}

/// End offset (exclusive) of the `<nav>` element opening at `start`, honouring nesting.
fn element_end(lower: &str, start: usize) -> Option<usize> {
    let mut depth = 1_usize;
    let mut position = start + "<nav".len();
    loop {
        let close = find_tag(lower, "</nav", position)?;
        match find_tag(lower, "<nav", position) {
            Some(open) if open < close => {
                depth += 1;
                position = open + "<nav".len();
            }
            _ => {
                let after = close + lower.get(close..)?.find('>')? + 1;
                depth -= 1;
                if depth == 0 {
                    return Some(after);
                }
                position = after;
            }
        }
    }
}

fn anchor_texts(element: &str) -> Vec<String> {
    let lower = element.to_ascii_lowercase();
    let mut texts = Vec::new();
    let mut cursor = 0;
    while let Some(open) = find_tag(&lower, "<a", cursor) {
        let Some(body_start) = lower[open..].find('>').map(|offset| open + offset + 1) else {
            break;
        };
        let Some(close) = find_tag(&lower, "</a", body_start) else {
            break;
        };
        texts.push(visible_text(&element[body_start..close]));
        cursor = close;
    }
    texts
}

fn visible_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
