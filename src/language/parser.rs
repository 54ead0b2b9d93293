//! Textual syntax for types and abstraction patterns.
//!
//! ```text
//! Int                   named type
//! Array<$T>             named type with arguments
//! $T                    generic parameter (an opaque position in a pattern)
//! any Shape             existential
//! (Int, label: $T)      tuple; `()` is unit and `(Int,)` a one-element tuple
//! (Int, Bool) -> Int    function
//! ```

use crate::language::{
    abstraction::AbstractionPattern,
    errors::SyntaxError,
    span::Span,
    types::{TupleElement, TypeExpr},
};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

const TYPE_HELP: &str =
    "types are written like `Int`, `(Int, $T)`, `any Shape`, `Array<$T>` or `(Int) -> Int`";

pub fn parse_type(source: &str) -> Result<TypeExpr, SyntaxError> {
    match all_consuming(terminated(type_expr, multispace0))(source) {
        Ok((_, ty)) => Ok(ty),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
            let offset = source.len() - err.input.len();
            let end = (offset + 1).min(source.len()).max(offset);
            let message = if err.input.trim().is_empty() {
                "unexpected end of type".to_string()
            } else {
                format!("unexpected `{}` in type", first_token(err.input))
            };
            Err(SyntaxError::new(message, Span::new(offset, end))
                .with_label("not a valid type here")
                .with_help(TYPE_HELP))
        }
        Err(nom::Err::Incomplete(_)) => Err(SyntaxError::new(
            "unexpected end of type",
            Span::new(source.len(), source.len()),
        )
        .with_help(TYPE_HELP)),
    }
}

/// Parses a type and reads it as the declared (pre-substitution) result shape.
pub fn parse_pattern(source: &str) -> Result<AbstractionPattern, SyntaxError> {
    parse_type(source).map(|ty| AbstractionPattern::of(&ty))
}

fn first_token(input: &str) -> &str {
    let trimmed = input.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(idx, ch)| *idx > 0 && (ch.is_whitespace() || "(),<>:".contains(*ch)))
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn type_expr(input: &str) -> IResult<&str, TypeExpr> {
    let (input, _) = multispace0(input)?;
    if input.starts_with('(') {
        return paren_type(input);
    }
    alt((existential, param, named))(input)
}

fn paren_type(input: &str) -> IResult<&str, TypeExpr> {
    let (input, (elements, trailing_comma)) = paren_group(input)?;
    let (input, arrow) = opt(preceded(multispace0, tag("->")))(input)?;
    if arrow.is_some() {
        let (input, result) = type_expr(input)?;
        let params = elements.into_iter().map(|element| element.ty).collect();
        return Ok((input, TypeExpr::function(params, result)));
    }
    let mut elements = elements;
    if !trailing_comma && elements.len() == 1 && elements[0].label.is_none() {
        return Ok((input, elements.remove(0).ty));
    }
    Ok((input, TypeExpr::Tuple(elements)))
}

fn paren_group(input: &str) -> IResult<&str, (Vec<TupleElement>, bool)> {
    let (input, _) = char('(')(input)?;
    let (input, elements) = separated_list0(
        delimited(multispace0, char(','), multispace0),
        tuple_element,
    )(input)?;
    let (input, trailing) = opt(preceded(multispace0, char(',')))(input)?;
    let (input, _) = preceded(multispace0, char(')'))(input)?;
    Ok((input, (elements, trailing.is_some())))
}

fn tuple_element(input: &str) -> IResult<&str, TupleElement> {
    let (input, label) = opt(terminated(
        preceded(multispace0, identifier),
        preceded(multispace0, char(':')),
    ))(input)?;
    let (input, ty) = type_expr(input)?;
    Ok((
        input,
        TupleElement {
            label: label.map(str::to_string),
            ty,
        },
    ))
}

fn existential(input: &str) -> IResult<&str, TypeExpr> {
    map(preceded(pair(tag("any"), multispace1), identifier), |name| {
        TypeExpr::Existential(name.to_string())
    })(input)
}

fn param(input: &str) -> IResult<&str, TypeExpr> {
    map(preceded(char('$'), identifier), |name| {
        TypeExpr::param(name)
    })(input)
}

fn named(input: &str) -> IResult<&str, TypeExpr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        preceded(multispace0, char('<')),
        separated_list1(delimited(multispace0, char(','), multispace0), type_expr),
        preceded(multispace0, char('>')),
    ))(input)?;
    Ok((
        input,
        TypeExpr::Named(name.to_string(), args.unwrap_or_default()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_tuples_with_labels() {
        let ty = parse_type("(first: Int, ($T, any Shape))").expect("parse");
        assert_eq!(ty.canonical_name(), "(first: Int, ($T, any Shape))");
        let elements = ty.tuple_elements().expect("tuple");
        assert_eq!(elements[0].label.as_deref(), Some("first"));
    }

    #[test]
    fn parenthesized_single_type_is_not_a_tuple() {
        assert_eq!(parse_type("(Int)").expect("parse"), TypeExpr::named("Int"));
        assert_eq!(
            parse_type("(Int,)").expect("parse"),
            TypeExpr::tuple([TypeExpr::named("Int")])
        );
        assert_eq!(parse_type("()").expect("parse"), TypeExpr::unit());
    }

    #[test]
    fn parses_function_and_generic_arguments() {
        let ty = parse_type("(Int, Array<$T>) -> (Bool, String)").expect("parse");
        match ty {
            TypeExpr::Function { params, result } => {
                assert_eq!(params.len(), 2);
                assert_eq!(params[1].canonical_name(), "Array<$T>");
                assert!(result.is_tuple());
            }
            other => panic!("expected function, got {other}"),
        }
    }

    #[test]
    fn any_prefix_without_space_is_a_name() {
        assert_eq!(parse_type("anything").expect("parse"), TypeExpr::named("anything"));
    }

    #[test]
    fn pattern_treats_params_as_opaque() {
        let pattern = parse_pattern("($T, Int)").expect("parse");
        assert!(pattern.tuple_element(0).is_opaque());
        assert_eq!(
            pattern.tuple_element(1),
            &AbstractionPattern::Type(TypeExpr::named("Int"))
        );
    }

    #[test]
    fn reports_offset_of_bad_token() {
        let err = parse_type("(Int, %)").expect_err("should fail");
        assert_eq!(err.span.start, 6);
        assert!(err.message.contains('%'), "{}", err.message);
        assert!(err.help.is_some());
    }

    #[test]
    fn reports_unclosed_tuple() {
        let err = parse_type("(Int, Bool").expect_err("should fail");
        assert!(err.span.start >= 10 || err.message.contains("end"), "{err}");
    }
}
