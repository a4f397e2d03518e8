//! Connect banner

/// Wrap banner text in a box drawn with double-line characters
///
/// Multi-line text is padded to its widest line. Empty text yields no lines.
pub fn build_banner(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = text.lines().collect();
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "═".repeat(width + 4);

    let mut banner = Vec::with_capacity(lines.len() + 2);
    banner.push(format!("╔{}╗", rule));
    for line in lines {
        banner.push(format!("║  {:<width$}  ║", line, width = width));
    }
    banner.push(format!("╚{}╝", rule));
    banner
}
