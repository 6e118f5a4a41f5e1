// Decision parser tests — tier precedence and verb-family coverage.
//
// These exercise the parser against the kinds of responses real models
// produce: well-formed decision lines, decisions buried in reasoning,
// bare verbs, hedging, and text with no signal at all.

use warden::decision::{DecisionParser, Verdict};

fn parse(text: &str) -> Verdict {
    DecisionParser::new().parse(text)
}

// ============================================================
// Tier 1: formal decision lines
// ============================================================

#[test]
fn formal_decision_remove() {
    assert_eq!(
        parse("This is promotional spam. DECISION: REMOVE"),
        Verdict::Remove
    );
}

#[test]
fn formal_decision_keep() {
    assert_eq!(
        parse("Constructive contribution to the thread. DECISION: KEEP"),
        Verdict::Keep
    );
}

#[test]
fn formal_decision_is_case_insensitive() {
    assert_eq!(parse("reasoning... decision: remove"), Verdict::Remove);
    assert_eq!(parse("reasoning... Decision: Keep"), Verdict::Keep);
}

#[test]
fn formal_decision_without_colon() {
    assert_eq!(parse("DECISION REMOVE"), Verdict::Remove);
    assert_eq!(parse("DECISION KEEP"), Verdict::Keep);
}

#[test]
fn formal_decision_accepts_verb_variants() {
    assert_eq!(parse("DECISION: REMOVED"), Verdict::Remove);
    assert_eq!(parse("DECISION: REMOVAL"), Verdict::Remove);
    assert_eq!(parse("DECISION: DELETE"), Verdict::Remove);
    assert_eq!(parse("DECISION: BAN"), Verdict::Remove);
    assert_eq!(parse("DECISION: APPROVE"), Verdict::Keep);
    assert_eq!(parse("DECISION: RETAIN"), Verdict::Keep);
    assert_eq!(parse("DECISION: ALLOWED"), Verdict::Keep);
    assert_eq!(parse("DECISION: KEPT"), Verdict::Keep);
}

#[test]
fn formal_decision_beats_earlier_opposite_verbs() {
    // Property from the engine contract: an explicit decision line wins
    // regardless of other verb-family words appearing earlier
    let text = "Some people would remove this kind of comment, and deleting \
                it was considered. On balance it follows the rules.\nDECISION: KEEP";
    assert_eq!(parse(text), Verdict::Keep);

    let text = "The author asks us to keep it and allowing it was tempting.\nDECISION: REMOVE";
    assert_eq!(parse(text), Verdict::Remove);
}

#[test]
fn formal_decision_beats_later_opposite_verbs() {
    let text = "DECISION: KEEP\nAlthough a stricter moderator might remove it.";
    assert_eq!(parse(text), Verdict::Keep);
}

// ============================================================
// Tier 2: verb anchored at the end of the response
// ============================================================

#[test]
fn trailing_verb_wins_without_formal_line() {
    assert_eq!(parse("After careful thought: REMOVE"), Verdict::Remove);
    assert_eq!(parse("My conclusion is to keep"), Verdict::Keep);
}

#[test]
fn trailing_verb_tolerates_whitespace() {
    assert_eq!(parse("Verdict below.\nREMOVE   "), Verdict::Remove);
}

// ============================================================
// Tier 3: verb anywhere in the last line
// ============================================================

#[test]
fn last_line_verb_wins() {
    let text = "Long reasoning paragraph without a verdict.\n\
                I would keep this one around.";
    assert_eq!(parse(text), Verdict::Keep);

    let text = "Long reasoning paragraph without a verdict.\n\
                Removing it is the right call here.";
    assert_eq!(parse(text), Verdict::Remove);
}

// ============================================================
// Tier 4: latest statement wins across the whole text
// ============================================================

#[test]
fn later_statement_wins_when_both_families_occur() {
    // REMOVE appears first, KEEP-family later; neither in the last line
    let text = "I considered removal at first.\n\
                But users should see we allow debate.\n\
                That is the whole of it.";
    assert_eq!(parse(text), Verdict::Keep);

    // Reversed order
    let text = "My instinct was to approve this.\n\
                Yet the spam links mean deleting is warranted.\n\
                That is the whole of it.";
    assert_eq!(parse(text), Verdict::Remove);
}

#[test]
fn single_family_anywhere_wins() {
    let text = "This was banned content in the old rules.\nNothing more to add.";
    assert_eq!(parse(text), Verdict::Remove);

    let text = "Retained under the civility guideline.\nNothing more to add.";
    assert_eq!(parse(text), Verdict::Keep);
}

// ============================================================
// Tier 5: modal and phrasal fallbacks
// ============================================================

#[test]
fn modal_remove_phrases() {
    assert_eq!(parse("Please take down this post.\nThanks."), Verdict::Remove);
    assert_eq!(parse("We should get rid of it.\nDone."), Verdict::Remove);
}

#[test]
fn modal_keep_phrases() {
    assert_eq!(parse("It can stay.\nEnd of analysis."), Verdict::Keep);
    assert_eq!(parse("Just leave it.\nEnd of analysis."), Verdict::Keep);
}

#[test]
fn modal_remove_checked_before_keep() {
    // Ambiguous text matching both modal families resolves to remove
    let text = "You must take down the comment even though it can stay archived.\nOk.";
    assert_eq!(parse(text), Verdict::Remove);
}

// ============================================================
// Unknown
// ============================================================

#[test]
fn no_signal_is_unknown() {
    assert_eq!(parse("I'm not sure about this one."), Verdict::Unknown);
    assert_eq!(parse("The sentiment here is ambiguous."), Verdict::Unknown);
}

#[test]
fn empty_and_whitespace_are_unknown() {
    assert_eq!(parse(""), Verdict::Unknown);
    assert_eq!(parse("   \n\t  "), Verdict::Unknown);
}

#[test]
fn parser_never_panics_on_odd_input() {
    for text in [
        "🤖🤖🤖",
        "DECISION:",
        "DECISION: MAYBE",
        "removekeep",
        "a\nb\nc\nd\ne\nf",
        "DECISION DECISION DECISION",
    ] {
        // Any verdict is acceptable; the contract is that parse returns
        let _ = parse(text);
    }
}

#[test]
fn unrelated_words_do_not_trigger_families() {
    // "all", "keeper of records" style near-misses
    assert_eq!(parse("That is all."), Verdict::Unknown);
    assert_eq!(parse("The banner image is unrelated."), Verdict::Unknown);
}
