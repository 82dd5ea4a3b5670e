//! Query extraction and reply composition.

use regex_lite::Regex;

const ELLIPSIS: char = '…';

/// Strip the bot's own `@handle` (any case) from mention text.
///
/// Other `@mentions` are kept. Whitespace is collapsed. Returns `None` when
/// nothing but the handle was sent.
pub fn extract_query(text: &str, handle: &str) -> Option<String> {
    let handle = handle.trim().trim_start_matches('@');
    let stripped = if handle.is_empty() {
        text.to_string()
    } else {
        let pattern = format!(r"(?i)@{}\b", regex_lite::escape(handle));
        match Regex::new(&pattern) {
            Ok(re) => re.replace_all(text, " ").into_owned(),
            Err(_) => text.to_string(),
        }
    };

    let query = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if query.is_empty() { None } else { Some(query) }
}

/// Build the reply text: `@{username} Answer: {answer}`, or `Answer: {answer}`
/// when the author could not be resolved.
///
/// The answer is trimmed and, when the whole reply would exceed `max_chars`,
/// cut short with an ellipsis.
pub fn compose_reply(username: Option<&str>, answer: &str, max_chars: usize) -> String {
    let prefix = match username {
        Some(name) => format!("@{name} Answer: "),
        None => "Answer: ".to_string(),
    };
    let answer = answer.trim();

    let budget = max_chars.saturating_sub(prefix.chars().count());
    if answer.chars().count() <= budget {
        return format!("{prefix}{answer}");
    }

    let kept: String = answer.chars().take(budget.saturating_sub(1)).collect();
    format!("{prefix}{}{ELLIPSIS}", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_with_username() {
        assert_eq!(
            compose_reply(Some("alice"), "a red car", 280),
            "@alice Answer: a red car"
        );
    }

    #[test]
    fn reply_without_username() {
        assert_eq!(compose_reply(None, "a red car", 280), "Answer: a red car");
    }

    #[test]
    fn answer_is_trimmed() {
        assert_eq!(compose_reply(None, "  two dogs \n", 280), "Answer: two dogs");
    }

    #[test]
    fn long_answer_truncated_to_limit() {
        let answer = "word ".repeat(100);
        let reply = compose_reply(Some("bob"), &answer, 280);
        assert!(reply.chars().count() <= 280);
        assert!(reply.starts_with("@bob Answer: word"));
        assert!(reply.ends_with('…'));
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let answer = "é".repeat(30);
        let reply = compose_reply(None, &answer, 20);
        assert_eq!(reply.chars().count(), 20);
    }

    #[test]
    fn strips_handle_case_insensitively() {
        assert_eq!(
            extract_query("@Optic_Agent what is this?", "optic_agent").as_deref(),
            Some("what is this?")
        );
        assert_eq!(
            extract_query("what breed @optic_agent is it", "@optic_agent").as_deref(),
            Some("what breed is it")
        );
    }

    #[test]
    fn other_mentions_survive() {
        assert_eq!(
            extract_query("@optic_agent ask @carol", "optic_agent").as_deref(),
            Some("ask @carol")
        );
        // A longer handle sharing the prefix is not ours
        assert_eq!(
            extract_query("@optic_agent_2 hi", "optic_agent").as_deref(),
            Some("@optic_agent_2 hi")
        );
    }

    #[test]
    fn handle_only_yields_none() {
        assert_eq!(extract_query("  @optic_agent  ", "optic_agent"), None);
    }
}
