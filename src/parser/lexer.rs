//! Lexer for template source using logos
//!
//! Template source is literal text interleaved with `{{ output }}` and
//! `{% tag %}` markup. [`scan`] splits the source into segments and lexes the
//! inside of each markup segment into [`Token`]s.

use logos::Logos;

use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Tag keywords
    #[token("if")]
    If,
    #[token("elsif")]
    Elsif,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("endfor")]
    EndFor,
    #[token("liquefy")]
    Liquefy,

    // Literal keywords
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // Logical operators
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("contains")]
    Contains,

    // Comparison operators (longer first)
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<=")]
    LessOrEqual,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,

    // Delimiters
    #[token("|")]
    Pipe,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
}

/// Strip quotes and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Which kind of markup a segment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    /// `{{ ... }}`
    Output,
    /// `{% ... %}`
    Tag,
}

impl MarkupKind {
    fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            MarkupKind::Output => ("{{", "}}"),
            MarkupKind::Tag => ("{%", "%}"),
        }
    }
}

/// A piece of template source
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text copied to the output
    Text(String),
    /// Lexed contents of an output or tag block
    Markup {
        kind: MarkupKind,
        tokens: Vec<(Token, Span)>,
        /// Span of the whole block, delimiters included
        span: Span,
    },
}

/// Lex a code fragment into tokens with spans relative to the fragment
pub fn lex(input: &str) -> impl Iterator<Item = (Result<Token, ()>, Span)> + '_ {
    Token::lexer(input).spanned()
}

/// Split template source into text and lexed markup segments
///
/// A `-` just inside a delimiter (`{{-`, `-%}`) trims the whitespace of the
/// neighbouring text on that side.
pub fn scan(source: &str) -> Result<Vec<Segment>, ParseError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut trim_next_text = false;

    while cursor < source.len() {
        let rest = &source[cursor..];
        let Some((offset, kind)) = next_markup(rest) else {
            push_text(&mut segments, rest, trim_next_text, false);
            break;
        };

        let start = cursor + offset;
        let (open, close) = kind.delimiters();
        let mut code_start = start + open.len();
        let trim_before = source[code_start..].starts_with('-');
        if trim_before {
            code_start += 1;
        }
        push_text(&mut segments, &source[cursor..start], trim_next_text, trim_before);

        let Some(close_offset) = find_close(&source[code_start..], close) else {
            return Err(ParseError::syntax(
                start..source.len(),
                format!("Unclosed '{}' block", open),
                vec![format!("'{}'", close)],
            ));
        };
        let end = code_start + close_offset + close.len();
        let mut code_end = code_start + close_offset;
        trim_next_text = source[code_start..code_end].ends_with('-');
        if trim_next_text {
            code_end -= 1;
        }

        let tokens = lex_markup(&source[code_start..code_end], code_start)?;
        segments.push(Segment::Markup {
            kind,
            tokens,
            span: start..end,
        });
        cursor = end;
    }

    Ok(segments)
}

fn next_markup(text: &str) -> Option<(usize, MarkupKind)> {
    let output = text.find("{{").map(|i| (i, MarkupKind::Output));
    let tag = text.find("{%").map(|i| (i, MarkupKind::Tag));
    match (output, tag) {
        (Some(o), Some(t)) => Some(if o.0 < t.0 { o } else { t }),
        (o, t) => o.or(t),
    }
}

/// Offset of `close` in `code`, ignoring quoted string literals
///
/// An unterminated quote hides everything after it, so the block is reported
/// as unclosed.
fn find_close(code: &str, close: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in code.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None if code[i..].starts_with(close) => return Some(i),
            None => {}
        }
    }
    None
}

fn push_text(segments: &mut Vec<Segment>, text: &str, trim_start: bool, trim_end: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    let text = if trim_end { text.trim_end() } else { text };
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}

fn lex_markup(code: &str, offset: usize) -> Result<Vec<(Token, Span)>, ParseError> {
    lex(code)
        .map(|(tok, span)| {
            let span = span.start + offset..span.end + offset;
            match tok {
                Ok(t) => Ok((t, span)),
                Err(()) => Err(ParseError::syntax(
                    span.clone(),
                    format!("Unexpected character '{}'", &code[span.start - offset..span.end - offset]),
                    Vec::new(),
                )),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).filter_map(|(t, _)| t.ok()).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("if person.name endif"),
            vec![
                Token::If,
                Token::Ident("person".to_string()),
                Token::Dot,
                Token::Ident("name".to_string()),
                Token::EndIf
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(tokens("index"), vec![Token::Ident("index".to_string())]);
    }

    #[test]
    fn test_strings_and_numbers() {
        assert_eq!(
            tokens(r#""a\"b" 'c' -3 1.5"#),
            vec![
                Token::String("a\"b".to_string()),
                Token::String("c".to_string()),
                Token::Number(-3.0),
                Token::Number(1.5)
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokens("== != <= >= < >"),
            vec![
                Token::Equal,
                Token::NotEqual,
                Token::LessOrEqual,
                Token::GreaterOrEqual,
                Token::Less,
                Token::Greater
            ]
        );
    }

    #[test]
    fn test_scan_segments() {
        let segments = scan("Hi {{ name }}!{% if x %}y{% endif %}").expect("Should scan");
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[0], Segment::Text("Hi ".to_string()));
        match &segments[1] {
            Segment::Markup { kind, tokens, span } => {
                assert_eq!(*kind, MarkupKind::Output);
                assert_eq!(tokens[0], (Token::Ident("name".to_string()), 6..10));
                assert_eq!(*span, 3..13);
            }
            other => panic!("Expected markup, got {:?}", other),
        }
        assert_eq!(segments[2], Segment::Text("!".to_string()));
    }

    #[test]
    fn test_scan_trim_markers() {
        let segments = scan("a  \n{%- if x -%}\n  b").expect("Should scan");
        assert_eq!(segments[0], Segment::Text("a".to_string()));
        assert_eq!(segments[2], Segment::Text("b".to_string()));
    }

    #[test]
    fn test_scan_unclosed_block() {
        let err = scan("Hello {{ name").unwrap_err();
        assert!(err.to_string().contains("Unclosed"));
    }

    #[test]
    fn test_scan_delimiters_inside_strings() {
        let segments = scan(r#"{{ x | append: '}}' }}{% if s == "%}" %}"#).expect("Should scan");
        assert_eq!(segments.len(), 2);
        match &segments[0] {
            Segment::Markup { tokens, .. } => {
                assert_eq!(tokens.last().map(|(t, _)| t), Some(&Token::String("}}".to_string())));
            }
            other => panic!("Expected markup, got {:?}", other),
        }
        match &segments[1] {
            Segment::Markup { kind, tokens, .. } => {
                assert_eq!(*kind, MarkupKind::Tag);
                assert_eq!(tokens.last().map(|(t, _)| t), Some(&Token::String("%}".to_string())));
            }
            other => panic!("Expected markup, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_escaped_quote_inside_string() {
        let segments = scan(r#"{{ 'it\'s }}' }}!"#).expect("Should scan");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], Segment::Text("!".to_string()));
    }

    #[test]
    fn test_scan_unterminated_string_is_unclosed() {
        let err = scan("{{ 'oops }}").unwrap_err();
        assert!(err.to_string().contains("Unclosed"));
    }

    #[test]
    fn test_scan_bad_character() {
        let err = scan("{{ name ; }}").unwrap_err();
        assert!(err.to_string().contains("Unexpected character"));
    }
}
