use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref GLUED_CONNECTOR: Regex =
        Regex::new(r"([a-z0-9])(To|For|And|Of|With)([aeiou][a-z]{3,})").unwrap();
    static ref CAMEL_JOIN: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
    static ref PUNCT_GLUE: Regex = Regex::new(r"([.?!,])([A-Za-z])").unwrap();
    static ref HYPHEN_BREAK: Regex = Regex::new(r"-[ \t]*\n").unwrap();
    static ref MARKER_GLUE: Regex = Regex::new(r"(?m)(^|[ \t])([-*]|#+)([A-Za-z])").unwrap();
    static ref COLON_GLUE: Regex = Regex::new(r":([A-Za-z])").unwrap();
    static ref TRAILING_COLON: Regex = Regex::new(r"(?m)([A-Za-z]):[ \t]*$").unwrap();
    static ref OVER_EMPHASIS: Regex =
        Regex::new(r"\*{3,}[ \t]*([^*\n]+?)[ \t]*\*{2,}:?").unwrap();
    static ref NUMBERED_ITEM_START: Regex = Regex::new(r"^\d+[ \t]*[.)](\s|$)").unwrap();
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();

    static ref HEADING_MARKER: Regex = Regex::new(r"(?m)^[ \t]*(#+)[ \t]*").unwrap();
    static ref NUMBERED_ITEM: Regex =
        Regex::new(r"(?m)^([ \t]*\d+)[ \t]*\.[ \t]*([^\d\s])").unwrap();
    static ref EMPHASIS_PAIR: Regex =
        Regex::new(r"\*\*[ \t]*([^*\n]*?[^*\s])[ \t]*\*\*").unwrap();
    static ref DOUBLE_COLON: Regex = Regex::new(r"[ \t]*:{2,}[ \t]*").unwrap();
    static ref BULLET_MARKER: Regex = Regex::new(r"(?m)^([ \t]*[-*])[ \t]+").unwrap();
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"[ \t]+([,.!?;:])").unwrap();
    static ref HEADING_BREAK: Regex = Regex::new(r"(?:[ \t]*\n)+[ \t]*(#+[ \t])").unwrap();
}

/// Upper bound on pipeline passes when settling text to a fixed point.
const MAX_PASSES: usize = 4;

/// Repairs text that an upstream generator fused, hard-wrapped or emitted one
/// word per line, returning well-formed markdown-ish prose.
///
/// The repair runs as an ordered chain of small total functions and is applied
/// until the output stops changing, which makes it idempotent.
pub fn repair_fused_text(input: &str) -> String {
    until_stable(input, repair_pass)
}

/// Standardizes markup spacing on top of [`repair_fused_text`].
pub fn normalize_markup(input: &str) -> String {
    until_stable(input, |text| markup_pass(&repair_fused_text(text)))
}

fn until_stable(input: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(input);
    for _ in 1..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn repair_pass(text: &str) -> String {
    let t = text.replace("\r\n", "\n");
    let t = split_camel_case(&t);
    let t = space_after_punctuation(&t);
    let t = dehyphenate(&t);
    let t = join_wrapped_lines(&t);
    let t = space_after_markers(&t);
    let t = collapse_over_emphasis(&t);
    let t = rebuild_paragraphs(&t);
    collapse_blank_lines(&t)
}

fn markup_pass(text: &str) -> String {
    let t = HEADING_MARKER.replace_all(text, "$1 ");
    let t = NUMBERED_ITEM.replace_all(&t, "$1. $2");
    let t = EMPHASIS_PAIR.replace_all(&t, "**$1**");
    let t = DOUBLE_COLON.replace_all(&t, ": ");
    let t = BULLET_MARKER.replace_all(&t, "$1 ");
    let t = SPACE_BEFORE_PUNCT.replace_all(&t, "$1");
    let t = blank_line_before_headings(&t);
    t.trim().to_string()
}

/// Step 1: `PlanToaddress` -> `Plan To address`, `symptomsPlease` -> `symptoms Please`.
pub fn split_camel_case(text: &str) -> String {
    let t = GLUED_CONNECTOR.replace_all(text, "$1$2 $3");
    CAMEL_JOIN.replace_all(&t, "$1 $2").into_owned()
}

/// Step 2: `symptoms.Please` -> `symptoms. Please`.
pub fn space_after_punctuation(text: &str) -> String {
    PUNCT_GLUE.replace_all(text, "$1 $2").into_owned()
}

/// Step 3: drops a hyphen that ends a line so the wrapped word is rejoined.
pub fn dehyphenate(text: &str) -> String {
    HYPHEN_BREAK.replace_all(text, "").into_owned()
}

/// Step 4: folds a hard wrap between two alphanumeric characters into a space.
///
/// A break next to a structural line (heading, list item, code fence or a
/// colon-terminated label) is kept.
pub fn join_wrapped_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = String::with_capacity(text.len());
    for (idx, line) in lines.iter().enumerate() {
        out.push_str(line);
        let Some(next) = lines.get(idx + 1) else {
            break;
        };
        let joins = line.ends_with(|c: char| c.is_ascii_alphanumeric())
            && next.starts_with(|c: char| c.is_ascii_alphanumeric())
            && !is_structural_line(line.trim())
            && !is_structural_line(next.trim());
        out.push(if joins { ' ' } else { '\n' });
    }
    out
}

/// Step 5: `*Leafy` -> `* Leafy`, `Note:rest` -> `Note: rest`, and a colon
/// glued to the last word of a line gets a space before it.
pub fn space_after_markers(text: &str) -> String {
    let t = MARKER_GLUE.replace_all(text, "$1$2 $3");
    let t = COLON_GLUE.replace_all(&t, ": $1");
    TRAILING_COLON.replace_all(&t, "$1 :").into_owned()
}

/// Step 6: `***Leafy Greens**:` -> `**Leafy Greens**`.
pub fn collapse_over_emphasis(text: &str) -> String {
    OVER_EMPHASIS.replace_all(text, "**$1**").into_owned()
}

/// Step 7: rebuilds paragraphs from one-word-per-line output.
///
/// Only kicks in when more than half of the non-empty lines carry three words
/// or fewer. Structural lines stay on their own; runs of other lines are joined
/// with single spaces, and every block is separated by a blank line.
pub fn rebuild_paragraphs(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return text.to_string();
    }

    let short = lines
        .iter()
        .filter(|line| line.split_whitespace().count() <= 3)
        .count();
    if short * 2 <= lines.len() {
        return text.to_string();
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for line in lines {
        if is_structural_line(line) {
            if !pending.is_empty() {
                blocks.push(pending.join(" "));
                pending.clear();
            }
            blocks.push(line.to_string());
        } else {
            pending.push(line);
        }
    }
    if !pending.is_empty() {
        blocks.push(pending.join(" "));
    }
    blocks.join("\n\n")
}

/// Step 8.
pub fn collapse_blank_lines(text: &str) -> String {
    EXCESS_NEWLINES
        .replace_all(text, "\n\n")
        .trim()
        .to_string()
}

/// Ensures every heading that follows other content is preceded by exactly one
/// blank line.
pub fn blank_line_before_headings(text: &str) -> String {
    HEADING_BREAK.replace_all(text, "\n\n$1").into_owned()
}

/// A trimmed line that must keep its own line: headings, bullets, code fences,
/// numbered items and colon-terminated labels.
pub fn is_structural_line(line: &str) -> bool {
    line.starts_with(['#', '*', '-', '`'])
        || line.ends_with(':')
        || NUMBERED_ITEM_START.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_splits_fused_words() {
        assert_eq!(
            repair_fused_text("WellnessPlanToaddress"),
            "Wellness Plan To address"
        );
    }

    #[test]
    fn test_repair_spaces_after_sentence_punctuation() {
        assert_eq!(
            repair_fused_text("symptoms.Please rest"),
            "symptoms. Please rest"
        );
    }

    #[test]
    fn test_split_camel_case_keeps_real_words() {
        assert_eq!(split_camel_case("LeafyGreens"), "Leafy Greens");
        assert_eq!(split_camel_case("Tomorrow is fine"), "Tomorrow is fine");
        assert_eq!(split_camel_case("goTogether"), "go Together");
    }

    #[test]
    fn test_dehyphenate() {
        assert_eq!(dehyphenate("well-\nbeing"), "wellbeing");
        assert_eq!(dehyphenate("self-care"), "self-care");
    }

    #[test]
    fn test_join_wrapped_lines() {
        assert_eq!(
            join_wrapped_lines("drink more\nwater daily"),
            "drink more water daily"
        );
        assert_eq!(join_wrapped_lines("Intro:\nfoo"), "Intro:\nfoo");
        assert_eq!(join_wrapped_lines("steps\n1. rest"), "steps\n1. rest");
        assert_eq!(join_wrapped_lines("# Diet\nEat greens"), "# Diet\nEat greens");
        assert_eq!(join_wrapped_lines("end.\nNext"), "end.\nNext");
    }

    #[test]
    fn test_space_after_markers() {
        assert_eq!(space_after_markers("*LeafyGreens"), "* LeafyGreens");
        assert_eq!(space_after_markers("##Intro"), "## Intro");
        assert_eq!(space_after_markers("Note:rest"), "Note: rest");
        assert_eq!(space_after_markers("Leafy Greens:"), "Leafy Greens :");
        assert_eq!(space_after_markers("well-being"), "well-being");
        assert_eq!(space_after_markers("**Bold**"), "**Bold**");
    }

    #[test]
    fn test_collapse_over_emphasis() {
        assert_eq!(
            collapse_over_emphasis("***Leafy Greens**:"),
            "**Leafy Greens**"
        );
        assert_eq!(collapse_over_emphasis("**Fine**"), "**Fine**");
    }

    #[test]
    fn test_rebuild_paragraphs_from_single_words() {
        let input = "Drink\nwater\nslowly\n# Sleep\nRest\nearly";
        assert_eq!(
            rebuild_paragraphs(input),
            "Drink water slowly\n\n# Sleep\n\nRest early"
        );
    }

    #[test]
    fn test_rebuild_paragraphs_leaves_prose_alone() {
        let input = "This line has plenty of words\nAnother long line with words\nok";
        assert_eq!(rebuild_paragraphs(input), input);
    }

    #[test]
    fn test_repair_one_word_per_line() {
        assert_eq!(
            repair_fused_text("Stay\nhydrated.\nEat\nwell."),
            "Stay hydrated. Eat well."
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("\n\na\n\n\n\nb  "), "a\n\nb");
    }

    #[test]
    fn test_normalize_heading_gets_its_own_paragraph() {
        assert_eq!(
            normalize_markup("##Introduction\nText here"),
            "## Introduction\n\nText here"
        );
    }

    #[test]
    fn test_normalize_numbered_list() {
        assert_eq!(
            normalize_markup("1 . Drink water\n2 . Rest"),
            "1. Drink water\n\n2. Rest"
        );
    }

    #[test]
    fn test_normalize_emphasis_and_punctuation() {
        assert_eq!(normalize_markup("**  Sleep well **"), "**Sleep well**");
        assert_eq!(normalize_markup("Rest::recover"), "Rest: recover");
        assert_eq!(
            normalize_markup("Drink water , rest well ."),
            "Drink water, rest well."
        );
        assert_eq!(
            normalize_markup("Leafy Greens:\n- spinach\n- kale"),
            "Leafy Greens:\n\n- spinach\n\n- kale"
        );
    }

    #[test]
    fn test_blank_line_before_headings() {
        assert_eq!(blank_line_before_headings("Intro\n## Diet"), "Intro\n\n## Diet");
        assert_eq!(
            blank_line_before_headings("Intro\n\n\n## Diet"),
            "Intro\n\n## Diet"
        );
    }

    #[test]
    fn test_clean_input_is_unchanged() {
        let clean = "# Daily Plan\n\nDrink plenty of water throughout the day.\n\n- Rest for at least eight hours.\n- Eat leafy greens with every meal.";
        assert_eq!(normalize_markup(clean), clean);

        let prose = "Drink plenty of water, rest well, and see a doctor if symptoms persist.";
        assert_eq!(normalize_markup(&format!("  {prose}\n")), prose);
    }

    #[test]
    fn test_idempotent_on_messy_input() {
        let samples = [
            "WellnessPlanToaddress your symptoms.Please rest",
            "***Leafy Greens**:\n*Spinach\n*Kale\nEat\nthem\ndaily",
            "##Sleep\nGo\nto\nbed\nearly.\n\n\n\n1 . Dim lights\n2 . No screens",
            "Hydration::drink water ,often.Avoid sugary-\ndrinks",
            "",
        ];
        for sample in samples {
            let repaired = repair_fused_text(sample);
            assert_eq!(repair_fused_text(&repaired), repaired, "repair: {sample:?}");
            let normalized = normalize_markup(sample);
            assert_eq!(normalize_markup(&normalized), normalized, "normalize: {sample:?}");
        }
    }

    #[test]
    fn test_structural_lines() {
        assert!(is_structural_line("# Title"));
        assert!(is_structural_line("- item"));
        assert!(is_structural_line("```"));
        assert!(is_structural_line("Symptoms:"));
        assert!(is_structural_line("2. Rest"));
        assert!(!is_structural_line("2024 was a good year"));
    }
}
