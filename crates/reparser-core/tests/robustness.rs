//! Malformed and arbitrary input never breaks the scan.

use proptest::prelude::*;
use reparser_core::{CaptureRef, Fragment, Parser, Span, TokenDefinition};

fn parser() -> Parser {
    Parser::new([
        TokenDefinition::paired("bold", r"\*\*", r"\*\*").with_attr("weight", "bold"),
        TokenDefinition::paired("italic", r"\*", r"\*").with_attr("style", "italic"),
        TokenDefinition::paired("code", "`", "`")
            .with_skip(true)
            .with_attr("code", true),
        TokenDefinition::paired("color", r"\[c=(?P<c>[a-z]*)\]", r"\[/c\]")
            .with_attr("color", CaptureRef::new("c")),
        TokenDefinition::single("link", r"<(?P<url>[^>]*)>")
            .with_text(CaptureRef::new("url"))
            .with_attr("link", true),
        TokenDefinition::single("smile", ":\\)").with_text("☺"),
    ])
    .unwrap()
}

/// Spans must be ordered, disjoint and inside the input.
fn check_spans(input: &str, fragments: &[Fragment]) {
    let mut last_end = 0;
    for fragment in fragments {
        assert!(fragment.span.start >= last_end, "overlapping span {:?}", fragment.span);
        assert!(fragment.span.end <= input.len());
        last_end = fragment.span.end;
    }
}

#[test]
fn test_malformed_inputs_do_not_fail() {
    let parser = parser();
    let inputs = [
        "*",
        "**",
        "***",
        "****",
        "`",
        "``",
        "[/c]",
        "[c=red]",
        "[c=red][c=blue]x[/c]",
        "**a *b** c*",
        "`**`**`",
        "<",
        "<>",
        ":)x:)",
        "\u{1F600}*\u{1F600}*",
        "\n\n**\n",
    ];
    for input in inputs {
        let fragments = parser.parse_to_vec(input).unwrap();
        check_spans(input, &fragments);
    }
}

#[test]
fn test_empty_matching_token_does_not_stall() {
    let parser = Parser::new([
        TokenDefinition::paired("bold", r"\*\*", r"\*\*").with_attr("weight", "bold"),
        TokenDefinition::single("maybe", "x*").with_attr("x", true),
    ])
    .unwrap();

    let input = "ab**xx**c\u{e9}";
    let fragments = parser.parse_to_vec(input).unwrap();
    check_spans(input, &fragments);
    let joined: String = fragments.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(joined, "abxxc\u{e9}");
    let xs: Vec<_> = fragments.iter().filter(|f| f.text == "xx").collect();
    assert_eq!(xs.len(), 1);
    assert!(xs[0].attr("weight").is_some());
}

#[test]
fn test_unclosed_color_keeps_styling() {
    let parser = parser();
    let fragments = parser.parse_to_vec("[c=red]a [c=blue]b").unwrap();
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[1].attr("color").and_then(|v| v.as_str()), Some("blue"));
    assert_eq!(fragments[1].span, Span::new(17, 18));
}

proptest! {
    #[test]
    fn prop_markup_free_text_round_trips(input in "[a-w0-9 .,!?\n]{0,64}") {
        let fragments = parser().parse_to_vec(&input).unwrap();
        let joined: String = fragments.iter().map(|f| f.text.as_str()).collect();
        prop_assert_eq!(joined, input);
    }

    #[test]
    fn prop_arbitrary_markup_never_fails(input in "[ab*`<>:)\\[\\]/c=x\n]{0,64}") {
        let parser = parser();
        let fragments = parser.parse_to_vec(&input).unwrap();
        check_spans(&input, &fragments);
        for fragment in &fragments {
            if !fragment.attributes.contains_key("link") && fragment.text != "☺" {
                let source = fragment.span.slice(&input).unwrap();
                prop_assert_eq!(source, fragment.text.as_str());
            }
        }
    }

    #[test]
    fn prop_plain_spans_cover_all_unmatched_text(input in "[ab\\*]{0,48}") {
        let parser = parser();
        let fragments = parser.parse_to_vec(&input).unwrap();
        let covered: usize = fragments.iter().map(|f| f.span.len()).sum();
        let stars = input.matches('*').count();
        prop_assert_eq!(covered + stars, input.len());
    }
}
