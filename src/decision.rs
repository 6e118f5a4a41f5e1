// Decision extraction from free-text model output.
//
// Models are prompted to end their response with "DECISION: REMOVE" or
// "DECISION: KEEP", but smaller models drift from the format often enough
// that a single regex is not usable in practice. The parser runs a fixed
// sequence of tiers, from the most explicit signal to the loosest, and the
// first tier that matches wins:
//
//   1. a formal "DECISION[:] <verb>" line
//   2. a verb anchored at the end of the response
//   3. a verb anywhere in the last line
//   4. latest-statement-wins scan over the whole response
//   5. modal phrases ("should be removed", "can stay", ...)
//
// A formal decision short-circuits everything below it, so an incidental
// mention of the opposite verb earlier in the reasoning cannot override an
// explicit decision line. Tier rules are data (ordered pattern tables),
// not cascading conditionals.

use regex_lite::Regex;

/// The engine's classification of a single comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Remove,
    Keep,
    /// No decision signal found anywhere in the response.
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Remove => "REMOVE",
            Verdict::Keep => "KEEP",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

/// Morphological verb families, matched against an uppercased copy of the
/// response. Covers the inflections observed in real model output.
const REMOVE_FAMILIES: &[&str] = &[
    r"REMOV(E|ED|ING|AL|ES)",
    r"DELET(E|ED|ING|ION)",
    r"BAN(NED|NING)?",
    r"BLOCK(ED|ING)?",
    r"ELIMINAT(E|ED|ING|ION)",
];

const KEEP_FAMILIES: &[&str] = &[
    r"KEEP(S|ING|ER)?",
    r"KEPT",
    r"RETAIN(ED|ING|S)?",
    r"ALLOW(ED|ING|S)?",
    r"APPROV(E|ED|ING|AL)",
    r"ACCEPT(ED|ING|S)?",
    r"PERMIT(TED|TING|S)?",
];

/// Modal and phrasal fallbacks for responses that never use a bare verb.
/// REMOVE phrases are checked before KEEP phrases.
const MODAL_REMOVE: &[&str] = &[
    r"(SHOULD|MUST|WILL|NEED TO|OUGHT TO)\s+(BE\s+)?(REMOV|DELET|BAN)",
    r"(BEEN|WAS|IS)\s+(REMOV|DELET|BAN)",
    r"(REMOV|DELET|BAN)\s+(IT|THIS|THAT)",
    r"\b(NEEDS?|REQUIRES?)\s+(REMOV|DELET)",
    r"\b(GET\s+RID\s+OF|TAKE\s+DOWN|PULL\s+DOWN)\b",
];

const MODAL_KEEP: &[&str] = &[
    r"(SHOULD|MUST|WILL|CAN|OUGHT TO)\s+(BE\s+)?(KEEP|RETAIN|ALLOW|STAY)",
    r"(BEEN|WAS|IS)\s+(KEEP|RETAIN|ALLOW)",
    r"(KEEP|RETAIN|ALLOW)\s+(IT|THIS|THAT)",
    r"\b(LET\s+IT\s+STAY|LEAVE\s+IT|CAN\s+STAY)\b",
    r"\b(NO\s+NEED\s+TO\s+REMOV|DOES\s+NOT\s+NEED\s+REMOV)",
];

struct Rule {
    re: Regex,
    verdict: Verdict,
}

/// Parses a moderation verdict out of a model response.
///
/// Compiling the pattern tables is not free, so the orchestrator builds
/// one parser and reuses it for every comment.
pub struct DecisionParser {
    formal: Vec<Rule>,
    end_anchored: Vec<Rule>,
    word: Vec<Rule>,
    modal: Vec<Rule>,
}

impl Default for DecisionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionParser {
    pub fn new() -> Self {
        let rules = |families: &[&str], verdict: Verdict, wrap: &dyn Fn(&str) -> String| -> Vec<Rule> {
            families
                .iter()
                .map(|&family| Rule {
                    re: Regex::new(&wrap(family)).expect("hardcoded pattern is valid"),
                    verdict,
                })
                .collect()
        };

        let mut formal = rules(REMOVE_FAMILIES, Verdict::Remove, &|f| {
            format!(r"DECISION\s*:?\s*({f})")
        });
        formal.extend(rules(KEEP_FAMILIES, Verdict::Keep, &|f| {
            format!(r"DECISION\s*:?\s*({f})")
        }));

        let mut end_anchored = rules(REMOVE_FAMILIES, Verdict::Remove, &|f| {
            format!(r"\b({f})\s*$")
        });
        end_anchored.extend(rules(KEEP_FAMILIES, Verdict::Keep, &|f| {
            format!(r"\b({f})\s*$")
        }));

        let mut word = rules(REMOVE_FAMILIES, Verdict::Remove, &|f| format!(r"\b({f})\b"));
        word.extend(rules(KEEP_FAMILIES, Verdict::Keep, &|f| {
            format!(r"\b({f})\b")
        }));

        let mut modal = rules(MODAL_REMOVE, Verdict::Remove, &|p| p.to_string());
        modal.extend(rules(MODAL_KEEP, Verdict::Keep, &|p| p.to_string()));

        Self {
            formal,
            end_anchored,
            word,
            modal,
        }
    }

    /// Extract a verdict from a model response. Never fails — a response
    /// with no recognizable signal is `Verdict::Unknown`.
    pub fn parse(&self, response_text: &str) -> Verdict {
        let text = response_text.trim().to_uppercase();
        if text.is_empty() {
            return Verdict::Unknown;
        }

        // Tier 1: formal decision line. A match here is authoritative.
        for rule in &self.formal {
            if rule.re.is_match(&text) {
                return rule.verdict;
            }
        }

        // Tier 2: verb family anchored at the end of the response.
        for rule in &self.end_anchored {
            if rule.re.is_match(&text) {
                return rule.verdict;
            }
        }

        // Tier 3: verb family anywhere in the last line.
        if let Some(last_line) = text.lines().last() {
            for rule in &self.word {
                if rule.re.is_match(last_line) {
                    return rule.verdict;
                }
            }
        }

        // Tier 4: whole-text scan. Runs only when no formal decision line
        // matched above; when both families occur, the later statement wins.
        let latest_offset = |verdict: Verdict| -> Option<usize> {
            self.word
                .iter()
                .filter(|r| r.verdict == verdict)
                .flat_map(|r| r.re.find_iter(&text))
                .map(|m| m.start())
                .max()
        };
        match (latest_offset(Verdict::Remove), latest_offset(Verdict::Keep)) {
            (Some(remove_at), Some(keep_at)) => {
                return if remove_at > keep_at {
                    Verdict::Remove
                } else {
                    Verdict::Keep
                };
            }
            (Some(_), None) => return Verdict::Remove,
            (None, Some(_)) => return Verdict::Keep,
            (None, None) => {}
        }

        // Tier 5: modal and phrasal patterns.
        for rule in &self.modal {
            if rule.re.is_match(&text) {
                return rule.verdict;
            }
        }

        Verdict::Unknown
    }
}
