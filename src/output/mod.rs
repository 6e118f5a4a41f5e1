// Output formatting — colored terminal display for moderation activity.
//
// All terminal-specific formatting lives here: decision colors, the
// divider between analyses, startup banners. Log files get the same
// information through tracing, uncolored.

use colored::Colorize;

use crate::config::Config;

/// Escape newlines and tabs so a multi-line comment occupies one log line.
pub fn clean_text(text: &str) -> String {
    text.replace('\n', "\\n").replace('\t', "\\t")
}

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Unlike byte slicing (`&text[..120]`), this respects UTF-8 character boundaries
/// and will never panic on multi-byte characters like emoji or accented letters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Startup banner: what we're watching and in which mode.
pub fn print_startup(config: &Config) {
    println!("{}", "=== Warden starting ===".dimmed());
    println!(
        "{}",
        format!("Monitoring subreddit: r/{}", config.subreddit).dimmed()
    );
    println!(
        "{}",
        format!(
            "Adaptive delay: {:.0}s base, +{}% per empty poll, {:.0}s max",
            config.adaptive_base_interval.as_secs_f64(),
            config.adaptive_increase_percentage,
            config.adaptive_max_delay.as_secs_f64()
        )
        .dimmed()
    );
    println!(
        "{}",
        format!("LLM provider: {}", config.provider_backend.as_str()).dimmed()
    );
    if config.safe_mode {
        println!("{}", "SAFE MODE — no comments will actually be removed".yellow());
    } else {
        println!("{}", "LIVE MODE — flagged comments will be removed".red());
    }
}

/// Print one analyzed comment with its decision. Only REMOVE-class
/// decisions get console space; KEEP is routine and goes to tracing only.
pub fn print_decision(decision: &str, reason: &str, comment_text: &str, permalink: &str) {
    if !decision.contains("REMOVE") {
        return;
    }

    let clean = clean_text(comment_text);
    if permalink.is_empty() {
        println!("  {} \"{}\"", "Comment:".dimmed(), clean);
    } else {
        println!(
            "  {} https://reddit.com{} \"{}\"",
            "Comment:".dimmed(),
            permalink,
            clean
        );
    }
    println!(
        "  {} {} {}",
        "Decision:".dimmed(),
        decision.red(),
        reason.dimmed()
    );
}

/// Divider between comment analyses.
pub fn print_divider() {
    println!("{}", "=".repeat(80).dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_escapes_newlines_and_tabs() {
        assert_eq!(clean_text("a\nb\tc"), "a\\nb\\tc");
        assert_eq!(clean_text("plain"), "plain");
    }

    #[test]
    fn truncate_chars_respects_utf8_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
