//! Output trimming for error messages and logs.

const MAX_LINE_CHARS: usize = 200;
const MAX_TOTAL_BYTES: usize = 1000;

/// Reduce tool output to a short excerpt fit for a status message.
///
/// Keeps at most `max_lines` lines of at most 200 characters each, and
/// stops once roughly 1000 bytes have been collected. apt-get and systemctl
/// can be chatty; the orchestration agent shows this text verbatim.
pub fn sanitize_output(output: &str, max_lines: usize) -> String {
    let trimmed = output.trim();
    let mut excerpt = String::new();

    for line in trimmed.lines().take(max_lines) {
        let line = match line.char_indices().nth(MAX_LINE_CHARS) {
            Some((cut, _)) => format!("{}...", &line[..cut]),
            None => line.to_string(),
        };

        if excerpt.len() + line.len() > MAX_TOTAL_BYTES {
            excerpt.push_str("...[truncated]");
            return excerpt;
        }
        if !excerpt.is_empty() {
            excerpt.push('\n');
        }
        excerpt.push_str(&line);
    }

    if trimmed.lines().nth(max_lines).is_some() {
        excerpt.push_str("\n...[additional output truncated]");
    }
    excerpt
}
