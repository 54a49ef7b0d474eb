use crate::lexer::SourceLine;
use std::collections::HashMap;

pub type CodeLabels = HashMap<String, u16>;

/// A single linear walk over `.text`: every non-label line advances the
/// instruction counter by one, and every `label:` line records
/// `counter - 1` — the branch target a later `jmp`/`beq`/`bne` can use
/// directly, since the CPU increments `PC` after executing.
pub fn pre_pass(lines: &[SourceLine]) -> CodeLabels {
    let mut labels = CodeLabels::new();
    let mut counter: u16 = 0;

    for line in lines {
        if let Some(label) = line.text.strip_suffix(':') {
            labels.insert(label.trim().to_string(), counter.wrapping_sub(1));
        } else {
            counter = counter.wrapping_add(1);
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Section;

    fn line(text: &str) -> SourceLine {
        SourceLine {
            line: 0,
            section: Section::Text,
            text: text.to_string(),
        }
    }

    #[test]
    fn label_stores_counter_minus_one() {
        let lines = vec![
            line("li r0, #1"),
            line("loop:"),
            line("add r0, r0"),
            line("jmp loop"),
        ];
        let labels = pre_pass(&lines);
        assert_eq!(labels["loop"], 0);
    }

    #[test]
    fn label_at_start_wraps_to_max() {
        let lines = vec![line("start:"), line("li r0, #1")];
        let labels = pre_pass(&lines);
        assert_eq!(labels["start"], u16::MAX);
    }
}
