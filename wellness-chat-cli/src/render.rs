use colored::*;
use std::fmt::Write;
use wellness_sdk_rs::normalize::normalize_markup;
use wellness_sdk_rs::transcript::AgentLogEntry;
use wellness_sdk_rs::ConversationTurnState;

#[derive(Debug, Default, Clone, Copy)]
struct Printed {
    text_len: usize,
    finalized: bool,
}

/// Turns successive state snapshots into incremental terminal output.
///
/// Entries only ever grow at the end, so each snapshot is rendered as the
/// suffix the terminal has not seen yet.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    turn_id: u64,
    printed: Vec<Printed>,
    status: String,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, state: &ConversationTurnState) -> String {
        if state.turn_id != self.turn_id {
            self.turn_id = state.turn_id;
            self.printed.clear();
            self.status.clear();
        }

        let mut out = String::new();
        if !state.status_message.is_empty() && state.status_message != self.status {
            let _ = writeln!(out, "{}", state.status_message.dimmed().italic());
        }
        self.status = state.status_message.clone();

        for (index, entry) in state.transcript.entries().iter().enumerate() {
            if index == self.printed.len() {
                let _ = write!(out, "\n{}\n", entry_header(index, entry));
                self.printed.push(Printed::default());
            }
            let printed = &mut self.printed[index];

            if let Some(fresh) = entry.accumulated_text.get(printed.text_len..) {
                out.push_str(fresh);
            }
            printed.text_len = entry.accumulated_text.len();

            if entry.finalized && !printed.finalized {
                let _ = writeln!(out, " {}", "done".dimmed());
                printed.finalized = true;
            }
        }
        out
    }
}

/// `[n] XY AgentName` in the agent's palette color.
pub fn entry_header(index: usize, entry: &AgentLogEntry) -> String {
    let label = format!("[{}] {} {}", index + 1, entry.initials(), entry.agent);
    match hex_to_rgb(entry.color) {
        Some((r, g, b)) => label.truecolor(r, g, b).bold().to_string(),
        None => label.bold().to_string(),
    }
}

pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// The closing block: normalized summary and the recommendation list.
pub fn render_result(state: &ConversationTurnState) -> String {
    let mut out = String::new();
    let summary = normalize_markup(state.summary());
    if !summary.is_empty() {
        let _ = write!(out, "\n{}\n{}\n", "Summary".green().bold(), summary);
    }
    if !state.recommendations.is_empty() {
        let _ = writeln!(out, "\n{}", "Recommendations".green().bold());
        for (index, item) in state.recommendations.iter().enumerate() {
            let _ = writeln!(out, "{:>2}. {}", index + 1, item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellness_sdk_rs::transcript::TranscriptAction;

    fn state_with(actions: Vec<TranscriptAction>) -> ConversationTurnState {
        let mut state = ConversationTurnState::begin(1, "headache", "");
        state.status_message.clear();
        for action in actions {
            state.transcript.apply(action);
        }
        state
    }

    fn append(agent: &str, chunk: &str) -> TranscriptAction {
        TranscriptAction::Append {
            agent: agent.to_string(),
            chunk: chunk.to_string(),
        }
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#8BAE66"), Some((0x8B, 0xAE, 0x66)));
        assert_eq!(hex_to_rgb("8BAE66"), None);
        assert_eq!(hex_to_rgb("#FFF"), None);
        assert_eq!(hex_to_rgb("#GG0000"), None);
    }

    #[test]
    fn test_render_prints_only_new_text() {
        colored::control::set_override(false);
        let mut printer = TranscriptPrinter::new();

        let first = printer.render(&state_with(vec![append("Symptom Agent", "Hel")]));
        assert_eq!(first, "\n[1] SA Symptom Agent\nHel");

        let second = printer.render(&state_with(vec![append("Symptom Agent", "Hello")]));
        assert_eq!(second, "lo");

        let third = printer.render(&state_with(vec![
            append("Symptom Agent", "Hello"),
            TranscriptAction::Finalize {
                agent: "Symptom Agent".to_string(),
            },
            append("Diet", "Greens"),
        ]));
        assert_eq!(third, " done\n\n[2] D Diet\nGreens");
    }

    #[test]
    fn test_new_turn_restarts_numbering() {
        colored::control::set_override(false);
        let mut printer = TranscriptPrinter::new();
        printer.render(&state_with(vec![append("A", "one")]));

        let mut next = ConversationTurnState::begin(2, "cough", "");
        next.transcript.apply(append("B", "two"));
        let out = printer.render(&next);
        assert!(out.starts_with("Preparing your wellness guidance…\n"));
        assert!(out.ends_with("\n[1] B B\ntwo"));
    }

    #[test]
    fn test_render_result() {
        colored::control::set_override(false);
        let mut state = state_with(vec![]);
        state.summary_text = Some("##Plan\nRest".to_string());
        state.recommendations = vec!["Drink water".to_string()];
        assert_eq!(
            render_result(&state),
            "\nSummary\n## Plan\n\nRest\n\nRecommendations\n 1. Drink water\n"
        );
    }
}
