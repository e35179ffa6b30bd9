//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::config::ParserOptions;
use crate::parser::lexer::{scan, MarkupKind, Segment, Span, Token};

type ParserExtra<'a> = extra::Err<Rich<'a, Token>>;

/// Contents of a `{% ... %}` block
#[derive(Debug, Clone)]
enum Tag {
    If(Expr),
    Elsif(Expr),
    Else,
    EndIf,
    For { variable: String, iterable: Expr },
    EndFor,
    Liquefy(Output),
}

impl Tag {
    fn keyword(&self) -> &'static str {
        match self {
            Tag::If(_) => "if",
            Tag::Elsif(_) => "elsif",
            Tag::Else => "else",
            Tag::EndIf => "endif",
            Tag::For { .. } => "for",
            Tag::EndFor => "endfor",
            Tag::Liquefy(_) => "liquefy",
        }
    }
}

/// A segment after its markup has been parsed, before blocks are nested
enum Item {
    Text(String),
    Output(Output),
    Tag(Tag, Span),
}

/// Parse template source with default options
pub fn parse(source: &str) -> Result<Template, Vec<ParseError>> {
    parse_with_options(source, &ParserOptions::default())
}

/// Parse template source into a [`Template`]
///
/// Every markup block is parsed even after a failure, so all syntax errors
/// are reported at once.
pub fn parse_with_options(
    source: &str,
    options: &ParserOptions,
) -> Result<Template, Vec<ParseError>> {
    let segments = scan(source).map_err(|e| vec![e])?;

    let mut items = Vec::with_capacity(segments.len());
    let mut errors = Vec::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => items.push(Item::Text(text)),
            Segment::Markup {
                kind: MarkupKind::Output,
                tokens,
                span,
            } => match parse_output(tokens, span.end) {
                Ok(output) => items.push(Item::Output(output)),
                Err(errs) => errors.extend(errs),
            },
            Segment::Markup {
                kind: MarkupKind::Tag,
                tokens,
                span,
            } => match parse_tag(tokens, span.end, options.liquefy_tag) {
                Ok(tag) => items.push(Item::Tag(tag, span)),
                Err(errs) => errors.extend(errs),
            },
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut items = items.into_iter();
    let (nodes, stray) = build_block(&mut items).map_err(|e| vec![e])?;
    if let Some((tag, span)) = stray {
        return Err(vec![ParseError::syntax(
            span,
            format!("Unexpected '{}' without a matching opening tag", tag.keyword()),
            Vec::new(),
        )]);
    }

    Ok(Template { nodes })
}

fn parse_output(tokens: Vec<(Token, Span)>, eoi: usize) -> Result<Output, Vec<ParseError>> {
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    output_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

fn parse_tag(
    tokens: Vec<(Token, Span)>,
    eoi: usize,
    liquefy_tag: bool,
) -> Result<Tag, Vec<ParseError>> {
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter).map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

    tag_parser(liquefy_tag)
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Literals and variable paths
fn atom_parser<'a, I>() -> impl Parser<'a, I, Expr, ParserExtra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => s,
    };

    let literal = select! {
        Token::String(s) => Literal::String(s),
        Token::Number(n) => Literal::Number(n),
        Token::True => Literal::Bool(true),
        Token::False => Literal::Bool(false),
        Token::Nil => Literal::Nil,
    };

    // [0], [-1] or ["name"]
    let index = select! {
        Token::Number(n) => PathSegment::Index(n as i64),
        Token::String(s) => PathSegment::Field(s),
    }
    .delimited_by(just(Token::BracketOpen), just(Token::BracketClose));

    let path = identifier
        .clone()
        .map(PathSegment::Field)
        .then(
            choice((
                just(Token::Dot)
                    .ignore_then(identifier)
                    .map(PathSegment::Field),
                index,
            ))
            .repeated()
            .collect::<Vec<_>>(),
        )
        .map(|(head, rest)| {
            let mut segments = Vec::with_capacity(rest.len() + 1);
            segments.push(head);
            segments.extend(rest);
            Expr::Path(segments)
        });

    choice((literal.map(Expr::Literal), path))
}

/// Comparisons joined by `and`/`or`
fn expr_parser<'a, I>() -> impl Parser<'a, I, Expr, ParserExtra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let comparison_op = select! {
        Token::Equal => BinaryOp::Equal,
        Token::NotEqual => BinaryOp::NotEqual,
        Token::Less => BinaryOp::Less,
        Token::LessOrEqual => BinaryOp::LessOrEqual,
        Token::Greater => BinaryOp::Greater,
        Token::GreaterOrEqual => BinaryOp::GreaterOrEqual,
        Token::Contains => BinaryOp::Contains,
    };

    let logical_op = select! {
        Token::And => BinaryOp::And,
        Token::Or => BinaryOp::Or,
    };

    let comparison = atom_parser()
        .then(comparison_op.then(atom_parser()).or_not())
        .map(|(lhs, rest)| match rest {
            Some((op, rhs)) => Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            None => lhs,
        });

    comparison
        .clone()
        .then(logical_op.then(comparison).repeated().collect::<Vec<_>>())
        .map(|(first, rest)| fold_logical(first, rest))
}

/// `and`/`or` have equal precedence and group from the right
fn fold_logical(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    let mut iter = rest.into_iter().rev();
    let Some((mut op, mut acc)) = iter.next() else {
        return first;
    };
    for (prev_op, operand) in iter {
        acc = Expr::Binary {
            op,
            lhs: Box::new(operand),
            rhs: Box::new(acc),
        };
        op = prev_op;
    }
    Expr::Binary {
        op,
        lhs: Box::new(first),
        rhs: Box::new(acc),
    }
}

/// An expression followed by `| filter: args` applications
fn output_parser<'a, I>() -> impl Parser<'a, I, Output, ParserExtra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => s,
    };

    let filter = just(Token::Pipe)
        .ignore_then(identifier)
        .then(
            just(Token::Colon)
                .ignore_then(
                    atom_parser()
                        .separated_by(just(Token::Comma))
                        .at_least(1)
                        .collect::<Vec<_>>(),
                )
                .or_not(),
        )
        .map(|(name, args)| FilterCall {
            name,
            args: args.unwrap_or_default(),
        });

    expr_parser()
        .then(filter.repeated().collect::<Vec<_>>())
        .map(|(expr, filters)| Output { expr, filters })
}

fn tag_parser<'a, I>(liquefy_tag: bool) -> impl Parser<'a, I, Tag, ParserExtra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => s,
    };

    let liquefy = just(Token::Liquefy)
        .ignore_then(output_parser())
        .try_map(move |output, span: SimpleSpan| {
            if liquefy_tag {
                Ok(Tag::Liquefy(output))
            } else {
                Err(Rich::custom(span, "The 'liquefy' tag is disabled"))
            }
        });

    let for_tag = just(Token::For)
        .ignore_then(identifier)
        .then_ignore(just(Token::In))
        .then(expr_parser())
        .map(|(variable, iterable)| Tag::For { variable, iterable });

    choice((
        just(Token::If).ignore_then(expr_parser()).map(Tag::If),
        just(Token::Elsif).ignore_then(expr_parser()).map(Tag::Elsif),
        just(Token::Else).to(Tag::Else),
        just(Token::EndIf).to(Tag::EndIf),
        for_tag,
        just(Token::EndFor).to(Tag::EndFor),
        liquefy,
    ))
    .then_ignore(end())
}

/// Collect nodes until a tag that closes or continues an enclosing block
fn build_block(
    items: &mut impl Iterator<Item = Item>,
) -> Result<(Vec<Node>, Option<(Tag, Span)>), ParseError> {
    let mut nodes = Vec::new();
    while let Some(item) = items.next() {
        match item {
            Item::Text(text) => nodes.push(Node::Text(text)),
            Item::Output(output) => nodes.push(Node::Output(output)),
            Item::Tag(Tag::Liquefy(output), _) => nodes.push(Node::Liquefy(output)),
            Item::Tag(Tag::If(condition), span) => nodes.push(build_if(items, condition, &span)?),
            Item::Tag(Tag::For { variable, iterable }, span) => {
                let (body, closing) = build_block(items)?;
                match closing {
                    Some((Tag::EndFor, _)) => nodes.push(Node::For {
                        variable,
                        iterable,
                        body,
                    }),
                    Some((tag, at)) => return Err(unexpected(&tag, at, "endfor")),
                    None => return Err(unclosed("for", &span)),
                }
            }
            Item::Tag(tag, span) => return Ok((nodes, Some((tag, span)))),
        }
    }
    Ok((nodes, None))
}

fn build_if(
    items: &mut impl Iterator<Item = Item>,
    first: Expr,
    span: &Span,
) -> Result<Node, ParseError> {
    let mut branches = Vec::new();
    let mut condition = first;
    loop {
        let (body, closing) = build_block(items)?;
        branches.push(Branch { condition, body });
        match closing {
            Some((Tag::Elsif(next), _)) => condition = next,
            Some((Tag::Else, _)) => {
                let (otherwise, closing) = build_block(items)?;
                return match closing {
                    Some((Tag::EndIf, _)) => Ok(Node::If {
                        branches,
                        otherwise: Some(otherwise),
                    }),
                    Some((tag, at)) => Err(unexpected(&tag, at, "endif")),
                    None => Err(unclosed("if", span)),
                };
            }
            Some((Tag::EndIf, _)) => {
                return Ok(Node::If {
                    branches,
                    otherwise: None,
                })
            }
            Some((tag, at)) => return Err(unexpected(&tag, at, "endif")),
            None => return Err(unclosed("if", span)),
        }
    }
}

fn unexpected(tag: &Tag, span: Span, expected: &str) -> ParseError {
    ParseError::syntax(
        span,
        format!("Unexpected '{}'", tag.keyword()),
        vec![format!("'{}'", expected)],
    )
}

fn unclosed(keyword: &str, span: &Span) -> ParseError {
    ParseError::syntax(
        span.clone(),
        format!("'{}' block is never closed", keyword),
        vec![format!("'end{}'", keyword)],
    )
}
