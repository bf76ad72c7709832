use chumsky::prelude::{Parser, Rich, any, end, extra, just};
use fg_core::{FeynError, ReactionTree, Span, Step, Token};
use tracing::trace;

/// Characters that end a bare particle name.
/// Closing delimiters are ordinary name characters.
const PARTICLE_TERMINATORS: &[char] = &['(', '[', '{', '@'];
/// Characters that end an anchor body. `@` is allowed inside the body.
const ANCHOR_TERMINATORS: &[char] = &['(', '[', '{'];

pub(crate) fn parse_reaction(source: &str) -> Result<ReactionTree, FeynError> {
    ReactionParser { source }.parse_range(0, source.len())
}

/// Recursive-descent reader over one source string. Every range it works on
/// is a byte range of `source`, so error spans point into the full input.
struct ReactionParser<'a> {
    source: &'a str,
}

impl ReactionParser<'_> {
    fn parse_range(&self, start: usize, end: usize) -> Result<ReactionTree, FeynError> {
        let text = &self.source[start..end];
        if text.trim().is_empty() {
            return Err(self.error("Reaction string is empty", start, end));
        }
        if let Err(message) = check_balance(text) {
            return Err(self.error(message, start, end));
        }

        let mut steps = Vec::new();
        for (step_start, step_end) in split_steps(text) {
            steps.push(self.parse_step(start + step_start, start + step_end)?);
        }

        trace!(start, end, steps = steps.len(), "parsed reaction range");
        Ok(ReactionTree::new(steps))
    }

    fn parse_step(&self, start: usize, end: usize) -> Result<Step, FeynError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut cursor = start;

        while let Some(ch) = self.source[cursor..end].chars().next() {
            match ch {
                c if c.is_whitespace() => cursor += c.len_utf8(),
                '(' => {
                    let close = self.closing(cursor, end, '(', ')')?;
                    tokens.push(Token::Cascade(self.parse_range(cursor + 1, close)?));
                    cursor = close + 1;
                }
                '[' => {
                    let close = self.closing(cursor, end, '[', ']')?;
                    let particles: Vec<String> = self.source[cursor + 1..close]
                        .split_whitespace()
                        .map(str::to_string)
                        .collect();
                    tokens.push(Token::Loop(particles));
                    cursor = close + 1;
                }
                '{' => {
                    let close = self.closing(cursor, end, '{', '}')?;
                    let tag = self.source[cursor + 1..close].trim();
                    let Some(previous) = tokens.pop() else {
                        return Err(self.error(
                            "Style tag has no preceding token in its step",
                            cursor,
                            close + 1,
                        ));
                    };
                    tokens.push(previous.with_style(tag));
                    cursor = close + 1;
                }
                '@' => {
                    let body_end = scan_word(self.source, cursor + 1, end, ANCHOR_TERMINATORS);
                    tokens.push(self.anchor(cursor, body_end)?);
                    cursor = body_end;
                }
                _ => {
                    let word_end = scan_word(self.source, cursor, end, PARTICLE_TERMINATORS);
                    tokens.push(Token::particle(&self.source[cursor..word_end]));
                    cursor = word_end;
                }
            }
        }

        Ok(Step::new(tokens))
    }

    /// Byte index of the delimiter closing the one at `open_at`, within the step.
    fn closing(
        &self,
        open_at: usize,
        end: usize,
        open: char,
        close: char,
    ) -> Result<usize, FeynError> {
        let mut depth = 0_usize;
        for (offset, ch) in self.source[open_at..end].char_indices() {
            if ch == open {
                depth = depth.saturating_add(1);
            } else if ch == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(open_at + offset);
                }
            }
        }
        Err(self.error(
            format!("'{open}' is not closed before the end of its step"),
            open_at,
            end,
        ))
    }

    fn anchor(&self, at: usize, body_end: usize) -> Result<Token, FeynError> {
        let body = &self.source[at + 1..body_end];
        let (name, particle) = anchor_body_parser()
            .parse(body)
            .into_result()
            .map_err(|errors| {
                let detail = errors
                    .into_iter()
                    .next()
                    .map(|error| error.to_string())
                    .unwrap_or_default();
                self.error(format!("Malformed anchor: {detail}"), at, body_end)
            })?;

        Ok(Token::Anchor {
            name: name.to_string(),
            particle: particle.filter(|p| !p.is_empty()).map(str::to_string),
        })
    }

    fn error(&self, message: impl Into<String>, start: usize, end: usize) -> FeynError {
        FeynError::syntax(message, Span::from_bytes(self.source, start, end))
    }
}

/// `name` or `name:particle`; the split happens at the first colon.
fn anchor_body_parser<'a>()
-> impl Parser<'a, &'a str, (&'a str, Option<&'a str>), extra::Err<Rich<'a, char>>> {
    let name = any().filter(|c: &char| *c != ':').repeated().to_slice();
    let particle = just(':').ignore_then(any().repeated().to_slice());
    name.then(particle.or_not()).then_ignore(end())
}

fn check_balance(text: &str) -> Result<(), &'static str> {
    let count = |target: char| text.chars().filter(|ch| *ch == target).count();
    if count('(') != count(')') {
        return Err("Unbalanced parentheses");
    }
    if count('[') != count(']') {
        return Err("Unbalanced brackets");
    }
    if count('{') != count('}') {
        return Err("Unbalanced braces");
    }
    Ok(())
}

/// Trimmed, non-empty step ranges split on `>` at parenthesis depth zero.
/// A stray `)` drives the depth negative and suppresses splitting until
/// a `(` brings it back.
fn split_steps(text: &str) -> Vec<(usize, usize)> {
    let mut steps = Vec::new();
    let mut current_start = 0;
    let mut paren_depth = 0_isize;

    let mut push_step = |from: usize, to: usize| {
        let raw = &text[from..to];
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let lead = raw.len() - raw.trim_start().len();
            steps.push((from + lead, from + lead + trimmed.len()));
        }
    };

    for (i, c) in text.char_indices() {
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth -= 1,
            '>' if paren_depth == 0 => {
                push_step(current_start, i);
                current_start = i + 1;
            }
            _ => {}
        }
    }
    push_step(current_start, text.len());

    steps
}

fn scan_word(source: &str, start: usize, end: usize, terminators: &[char]) -> usize {
    source[start..end]
        .char_indices()
        .find(|(_, ch)| ch.is_whitespace() || terminators.contains(ch))
        .map_or(end, |(offset, _)| start + offset)
}

#[cfg(test)]
mod tests {
    use super::{parse_reaction, split_steps};
    use fg_core::{FeynError, FeynErrorCode, ReactionTree, Step, Token};

    fn particles(names: &[&str]) -> Step {
        Step::new(names.iter().map(|name| Token::particle(*name)).collect())
    }

    fn syntax_message(input: &str) -> String {
        match parse_reaction(input) {
            Err(FeynError::Syntax { message, .. }) => message,
            other => panic!("expected syntax error for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn splits_simple_reaction_into_steps() {
        let tree = parse_reaction("e+ e- > Z0 > mu+ mu-").expect("parse");
        assert_eq!(
            tree,
            ReactionTree::new(vec![
                particles(&["e+", "e-"]),
                particles(&["Z0"]),
                particles(&["mu+", "mu-"]),
            ])
        );
    }

    #[test]
    fn arrows_inside_parentheses_do_not_split() {
        assert_eq!(split_steps("a > (b > c) d").len(), 2);
        assert_eq!(split_steps("a > > b").len(), 2);
        assert_eq!(split_steps("  a  "), vec![(2, 3)]);
    }

    #[test]
    fn parses_nested_cascades() {
        let tree = parse_reaction("u ubar > H > (Z0 > e+ e-) (Z0 > mu+ mu-)").expect("parse");
        assert_eq!(tree.len(), 3);
        let last = &tree.steps[2];
        assert_eq!(last.tokens.len(), 2);
        match &last.tokens[1] {
            Token::Cascade(inner) => {
                assert_eq!(
                    inner,
                    &ReactionTree::new(vec![particles(&["Z0"]), particles(&["mu+", "mu-"])])
                );
            }
            other => panic!("expected cascade, got {other:?}"),
        }
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn parses_loops_anchors_and_styles() {
        let tree = parse_reaction("a b > [g g]{blob} @top:gamma @bare @empty: > c").expect("parse");
        let step = &tree.steps[1];
        assert_eq!(
            step.tokens,
            vec![
                Token::Loop(vec!["g".to_string(), "g".to_string()]).with_style("blob"),
                Token::Anchor {
                    name: "top".to_string(),
                    particle: Some("gamma".to_string()),
                },
                Token::Anchor {
                    name: "bare".to_string(),
                    particle: None,
                },
                Token::Anchor {
                    name: "empty".to_string(),
                    particle: None,
                },
            ]
        );
    }

    #[test]
    fn style_applies_to_the_token_right_before_it() {
        let tree = parse_reaction("a b > c (Z0 > d e){ blob } > f").expect("parse");
        let step = &tree.steps[1];
        assert_eq!(step.tokens[0], Token::particle("c"));
        assert_eq!(step.tokens[1].style(), Some("blob"));
        assert!(matches!(step.tokens[1].unstyled(), Token::Cascade(_)));
    }

    #[test]
    fn identifiers_stop_at_delimiters() {
        let tree = parse_reaction("a@x b(c > d)").expect("parse");
        let tokens = &tree.steps[0].tokens;
        assert_eq!(tokens[0], Token::particle("a"));
        assert!(matches!(&tokens[1], Token::Anchor { name, .. } if name == "x"));
        assert_eq!(tokens[2], Token::particle("b"));
        assert!(matches!(tokens[3], Token::Cascade(_)));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(syntax_message(""), "Reaction string is empty");
        assert_eq!(syntax_message("   \t"), "Reaction string is empty");
        assert_eq!(syntax_message("a > ()"), "Reaction string is empty");
    }

    #[test]
    fn rejects_unbalanced_counts_in_order() {
        assert_eq!(syntax_message("(a > b"), "Unbalanced parentheses");
        assert_eq!(syntax_message("a [b"), "Unbalanced brackets");
        assert_eq!(syntax_message("a{blob"), "Unbalanced braces");
        assert_eq!(syntax_message("(a [b > c"), "Unbalanced parentheses");
    }

    #[test]
    fn rejects_style_without_preceding_token() {
        assert_eq!(
            syntax_message("a > {blob} b"),
            "Style tag has no preceding token in its step"
        );
    }

    #[test]
    fn stray_closer_keeps_the_arrow_inside_one_step() {
        assert_eq!(split_steps("a ) > ( b"), vec![(0, 9)]);
        assert_eq!(
            syntax_message("a ) > ( b"),
            "'(' is not closed before the end of its step"
        );
    }

    #[test]
    fn closing_delimiters_are_name_characters() {
        let tree = parse_reaction("a) b] > c}").expect("parse");
        assert_eq!(
            tree,
            ReactionTree::new(vec![particles(&["a)", "b]"]), particles(&["c}"])])
        );
    }

    #[test]
    fn interleaved_nesting_surfaces_inside_the_cascade() {
        // Global counts balance; the cut cascade body does not.
        assert_eq!(syntax_message("(a [b) c]"), "Unbalanced brackets");
    }

    #[test]
    fn empty_groups_and_nameless_anchors_parse() {
        let tree = parse_reaction("a b > [] > c{} @:g @ > d").expect("parse");
        assert_eq!(tree.steps[1].tokens, vec![Token::Loop(Vec::new())]);
        assert_eq!(
            tree.steps[2].tokens,
            vec![
                Token::particle("c").with_style(""),
                Token::Anchor {
                    name: String::new(),
                    particle: Some("g".to_string()),
                },
                Token::Anchor {
                    name: String::new(),
                    particle: None,
                },
            ]
        );
    }

    #[test]
    fn error_spans_point_into_the_full_input() {
        let err = parse_reaction("a b > c {blob} > {x} d").expect_err("style without token");
        assert_eq!(err.code(), FeynErrorCode::Syntax);
        let span = err.span().expect("syntax errors carry spans");
        assert_eq!(span.start.byte, 17);
        assert_eq!(span.end.byte, 20);
        assert_eq!(span.start.col, 18);
    }
}
