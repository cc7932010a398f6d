//! Training corpus parsing.
//!
//! The corpus is plain text: each segment is one fault-to-fix chain, one
//! sentence per line. Segments are separated by one or more blank lines or
//! by a standalone `###` line.

/// Splits corpus text into segments of trimmed, non-empty lines.
///
/// ```
/// use faultgraph::training::split_segments;
///
/// let text = "robot won't boot\nlow battery\n\ncharging dock dark\n###\nAP offline\n";
/// let segments = split_segments(text);
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[0], vec!["robot won't boot", "low battery"]);
/// assert_eq!(segments[2], vec!["AP offline"]);
/// ```
#[must_use]
pub fn split_segments(text: &str) -> Vec<Vec<String>> {
    let mut segments: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "###" {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(trimmed.to_string());
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
