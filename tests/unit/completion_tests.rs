//! Unit tests for candidate post-processing and query extraction.

use shell_native::completion::{
    complete_position, post_process, CompletionContext, CompletionItem, Dialect, EditorMode,
};

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_owned()).collect()
}

// ── Dialects ─────────────────────────────────────────────────────────────────

#[test]
fn dialect_is_chosen_by_shell_name() {
    assert_eq!(Dialect::for_shell("zsh"), Dialect::Zsh);
    assert_eq!(Dialect::for_shell("/usr/bin/fish"), Dialect::Fish);
    assert_eq!(Dialect::for_shell("bash"), Dialect::Plain);
    assert_eq!(Dialect::for_shell(""), Dialect::Plain);
}

#[test]
fn dialect_delimiters() {
    assert_eq!(Dialect::Zsh.delimiter(), Some(" -- "));
    assert_eq!(Dialect::Fish.delimiter(), Some("\t"));
    assert_eq!(Dialect::Plain.delimiter(), None);
}

// ── Line post-processing ─────────────────────────────────────────────────────

#[test]
fn tab_separated_lines_split_into_word_and_info() {
    let items = post_process(&lines(&["file1\tinfo1", "file2"]), Dialect::Fish);

    assert_eq!(
        items,
        vec![
            CompletionItem::with_info("file1", "info1"),
            CompletionItem::word("file2"),
        ]
    );
}

#[test]
fn zsh_lines_split_on_double_dash() {
    let items = post_process(
        &lines(&["checkout -- Switch branches", "--force"]),
        Dialect::Zsh,
    );

    assert_eq!(items[0], CompletionItem::with_info("checkout", "Switch branches"));
    assert_eq!(items[1], CompletionItem::word("--force"));
}

/// Only the first delimiter separates; the rest stays in `info`.
#[test]
fn split_happens_at_first_delimiter_only() {
    let item = CompletionItem::from_line("a\tb\tc", Dialect::Fish).expect("non-empty");
    assert_eq!(item, CompletionItem::with_info("a", "b\tc"));
}

#[test]
fn trailing_double_slash_collapses() {
    let item = CompletionItem::from_line("dir//", Dialect::Plain).expect("non-empty");
    assert_eq!(item.word, "dir/");

    let single = CompletionItem::from_line("dir/", Dialect::Plain).expect("non-empty");
    assert_eq!(single.word, "dir/");
}

#[test]
fn empty_lines_are_dropped() {
    let items = post_process(&lines(&["", "a", ""]), Dialect::Plain);
    assert_eq!(items, vec![CompletionItem::word("a")]);
}

#[test]
fn plain_dialect_keeps_tabs_in_word() {
    let item = CompletionItem::from_line("file1\tinfo1", Dialect::Plain).expect("non-empty");
    assert_eq!(item, CompletionItem::word("file1\tinfo1"));
}

#[test]
fn info_is_omitted_from_json_when_absent() {
    let json = serde_json::to_string(&CompletionItem::word("ls")).unwrap();
    assert_eq!(json, r#"{"word":"ls"}"#);

    let json = serde_json::to_string(&CompletionItem::with_info("ls", "list")).unwrap();
    assert_eq!(json, r#"{"word":"ls","info":"list"}"#);
}

// ── Complete position ────────────────────────────────────────────────────────

#[test]
fn complete_position_is_start_of_last_word() {
    assert_eq!(complete_position("git che"), 4);
    assert_eq!(complete_position("ls"), 0);
    assert_eq!(complete_position(""), 0);
    assert_eq!(complete_position("ls "), 3);
}

#[test]
fn complete_position_is_a_byte_offset() {
    assert_eq!(complete_position("écho fi"), 6);
    assert_eq!(complete_position("a\u{3000}b"), 4);
}

// ── Query extraction ─────────────────────────────────────────────────────────

#[test]
fn command_line_bang_is_stripped() {
    let ctx = CompletionContext::new("!ls /tmp/", EditorMode::CommandLine);
    assert_eq!(ctx.query(), "ls /tmp/");
}

#[test]
fn insert_mode_keeps_bang() {
    let ctx = CompletionContext::new("!ls", EditorMode::Insert);
    assert_eq!(ctx.query(), "!ls");
}

#[test]
fn insert_mode_prefers_prompt_override() {
    let mut ctx = CompletionContext::new("$ git ch", EditorMode::Insert);
    ctx.input_override = Some("git ch".to_owned());
    assert_eq!(ctx.query(), "git ch");
}

#[test]
fn command_line_ignores_prompt_override() {
    let mut ctx = CompletionContext::new("!make", EditorMode::CommandLine);
    ctx.input_override = Some("other".to_owned());
    assert_eq!(ctx.query(), "make");
}
