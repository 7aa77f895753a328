//! Plain-text rendering helpers shared by the tool surface.

/// `Error (CODE): message` with the generic code, for request-shape errors
/// caught in the dispatch layer.
pub fn error(msg: &str) -> String {
    format!("Error (ERROR): {msg}")
}

/// Thousands-separated count, matching the upstream site's rendering.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Clip to `max` characters with an ellipsis marker.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max).collect();
    format!("{clipped}...")
}
