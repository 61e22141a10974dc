/// Pulls runnable commands out of a markdown model response.
///
/// A command is the body of a triple-backtick fence. Fences are paired in
/// document order; an opening fence with no partner is left as prose.

const FENCE: &str = "```";

/// One span of a response, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Prose(&'a str),
    /// Raw text between a pair of fences (language tag not yet removed).
    Block(&'a str),
}

/// Split a response into prose and fenced blocks.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let Some(close) = after_open.find(FENCE) else {
            break;
        };
        if open > 0 {
            out.push(Segment::Prose(&rest[..open]));
        }
        out.push(Segment::Block(&after_open[..close]));
        rest = &after_open[close + FENCE.len()..];
    }

    if !rest.is_empty() {
        out.push(Segment::Prose(rest));
    }
    out
}

/// Extract the commands of every fenced block, in document order.
pub fn extract(text: &str) -> Vec<String> {
    segments(text)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Block(raw) => Some(clean_block(raw)),
            Segment::Prose(_) => None,
        })
        .collect()
}

/// Trim a block and drop a leading language tag (`bash`, `sh`, ...).
pub fn clean_block(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((first, rest)) = trimmed.split_once('\n') {
        if !first.trim_end_matches('\r').contains(char::is_whitespace) {
            return rest.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// The command selected when a response first arrives: the last one.
pub fn initial_active(count: usize) -> Option<usize> {
    count.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block_with_language_tag() {
        assert_eq!(extract("```bash\nls -la\n```"), vec!["ls -la"]);
    }

    #[test]
    fn test_no_fence_yields_nothing() {
        assert!(extract("Just use your file manager.").is_empty());
        assert_eq!(initial_active(0), None);
    }

    #[test]
    fn test_blocks_in_document_order() {
        let text = "First:\n```sh\nls\n```\nor better:\n```bash\nls -la\n```\ndone";
        assert_eq!(extract(text), vec!["ls", "ls -la"]);
        assert_eq!(initial_active(2), Some(1));
    }

    #[test]
    fn test_first_line_with_space_is_kept() {
        // The first line is itself a command, not a language tag.
        let text = "```\nfind . -name '*.log'\nrm -f old.log\n```";
        assert_eq!(extract(text), vec!["find . -name '*.log'\nrm -f old.log"]);
    }

    #[test]
    fn test_single_line_block_is_not_stripped() {
        assert_eq!(extract("run ```uptime``` now"), vec!["uptime"]);
    }

    #[test]
    fn test_unclosed_fence_is_prose() {
        let text = "```bash\ndf -h\n``` and then ```du -sh";
        assert_eq!(extract(text), vec!["df -h"]);
        let segs = segments(text);
        assert_eq!(segs.last(), Some(&Segment::Prose(" and then ```du -sh")));
    }

    #[test]
    fn test_n_blocks_yield_n_commands() {
        for n in 0..5 {
            let text: String = (0..n)
                .map(|i| format!("step {i}\n```bash\necho {i}\n```\n"))
                .collect();
            let cmds = extract(&text);
            assert_eq!(cmds.len(), n);
            for (i, cmd) in cmds.iter().enumerate() {
                assert_eq!(cmd, &format!("echo {i}"));
            }
        }
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "a\n```zsh\ngit status\n```\nb\n```\ngit log --oneline\n```";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_segments_interleave_prose_and_blocks() {
        let segs = segments("intro ```x``` mid ```y``` end");
        assert_eq!(
            segs,
            vec![
                Segment::Prose("intro "),
                Segment::Block("x"),
                Segment::Prose(" mid "),
                Segment::Block("y"),
                Segment::Prose(" end"),
            ]
        );
    }
}
