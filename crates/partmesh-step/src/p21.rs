//! nom grammar for the ISO 10303-21 exchange structure.
//!
//! Only the DATA section is parsed. Entity instances come out as untyped
//! parameter trees; [`super::entities`] gives them meaning.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, multispace1, one_of, satisfy},
    combinator::{map, map_res, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

/// One `#id = TYPE(...);` line of the DATA section.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    pub id: u64,
    /// Upper-case entity name. For complex instances, the first partial type.
    pub type_name: String,
    pub params: Vec<StepValue>,
}

/// A parameter value, possibly nested.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    Integer(i64),
    Real(f64),
    String(String),
    /// `#id`
    Reference(u64),
    /// `.NAME.`, stored without the dots.
    Enum(String),
    List(Vec<StepValue>),
    /// `$`
    Omitted,
    /// `*`, redeclared by a supertype.
    Derived,
    /// `LENGTH_MEASURE(2.)` and other defined-type wrappers.
    Typed {
        type_name: String,
        value: Box<StepValue>,
    },
}

impl StepValue {
    /// Numeric value; typed wrappers such as `LENGTH_MEASURE(2.)` unwrap.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(r) => Some(*r),
            Self::Integer(i) => Some(*i as f64),
            Self::Typed { value, .. } => value.as_real(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<u64> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// `.T.` / `.F.` logicals. `.U.` and anything else is `None`.
    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Self::Enum(e) if e == "T" || e == "TRUE" => Some(true),
            Self::Enum(e) if e == "F" || e == "FALSE" => Some(false),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[StepValue] {
        match self {
            Self::List(items) => items,
            _ => &[],
        }
    }
}

/// Skip a `/* ... */` comment.
fn comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

/// Skip whitespace and comments.
fn sp(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

/// `#123`
fn entity_id(input: &str) -> IResult<&str, u64> {
    preceded(char('#'), map_res(digit1, str::parse::<u64>))(input)
}

/// Parse an integer or real number.
fn number(input: &str) -> IResult<&str, StepValue> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), opt(digit1))), // Allow "0." without trailing digits
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let parsed = if text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        text.parse::<f64>().ok().map(StepValue::Real)
    } else {
        text.parse::<i64>().ok().map(StepValue::Integer)
    };

    match parsed {
        Some(v) => Ok((rest, v)),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::Float))),
    }
}

/// A quoted string, with `''` and the `\X`, `\X2` escapes decoded.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut raw = String::new();

    loop {
        let Some(pos) = rest.find('\'') else {
            return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char)));
        };
        raw.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        // A doubled quote is an escaped quote
        match rest.strip_prefix('\'') {
            Some(after) => {
                raw.push('\'');
                rest = after;
            }
            None => return Ok((rest, decode_step_string(&raw))),
        }
    }
}

/// Decode STEP control directives (`\\`, `\X\HH`, `\X2\HHHH...\X0\`).
fn decode_step_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('\\') {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(body) = tail.strip_prefix("\\X2\\") {
            // UTF-16 code units, four hex digits each
            let end = body.find("\\X0\\").unwrap_or(body.len());
            let units: Vec<u16> = body[..end]
                .as_bytes()
                .chunks(4)
                .filter_map(|chunk| std::str::from_utf8(chunk).ok())
                .filter_map(|hex| u16::from_str_radix(hex, 16).ok())
                .collect();
            result.extend(
                char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
            );
            rest = body.get(end + 4..).unwrap_or("");
        } else if let Some(body) = tail.strip_prefix("\\X\\") {
            // Single ISO 8859-1 byte
            match body.get(..2).and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                Some(byte) => {
                    result.push(char::from(byte));
                    rest = &body[2..];
                }
                None => {
                    result.push_str("\\X\\");
                    rest = body;
                }
            }
        } else if let Some(body) = tail.strip_prefix("\\\\") {
            result.push('\\');
            rest = body;
        } else {
            result.push('\\');
            rest = &tail[1..];
        }
    }

    result.push_str(rest);
    result
}

fn enumeration(input: &str) -> IResult<&str, String> {
    delimited(
        char('.'),
        map(
            recognize(pair(
                satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
                take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            )),
            String::from,
        ),
        char('.'),
    )(input)
}

/// Parse an entity or type keyword.
fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse a parenthesised, comma-separated parameter list.
fn parameter_list(input: &str) -> IResult<&str, Vec<StepValue>> {
    delimited(
        pair(char('('), sp),
        separated_list0(tuple((sp, char(','), sp)), step_value),
        pair(sp, char(')')),
    )(input)
}

/// A defined-type wrapper. Several arguments are kept as a list.
fn typed_parameter(input: &str) -> IResult<&str, StepValue> {
    let (input, type_name) = keyword(input)?;
    let (input, _) = sp(input)?;
    let (input, mut values) = parameter_list(input)?;

    let inner = match values.len() {
        1 => values.remove(0),
        _ => StepValue::List(values),
    };

    Ok((
        input,
        StepValue::Typed {
            type_name: type_name.to_ascii_uppercase(),
            value: Box::new(inner),
        },
    ))
}

fn step_value(input: &str) -> IResult<&str, StepValue> {
    let (input, _) = sp(input)?;

    alt((
        value(StepValue::Omitted, char('$')),
        value(StepValue::Derived, char('*')),
        map(entity_id, StepValue::Reference),
        map(enumeration, StepValue::Enum),
        map(string_literal, StepValue::String),
        typed_parameter,
        number,
        map(parameter_list, StepValue::List),
    ))(input)
}

/// `NAME ( params )`, one partial type of an instance.
fn typed_value(input: &str) -> IResult<&str, (String, Vec<StepValue>)> {
    let (input, _) = sp(input)?;
    let (input, type_name) = keyword(input)?;
    let (input, _) = sp(input)?;
    let (input, params) = parameter_list(input)?;
    Ok((input, (type_name.to_ascii_uppercase(), params)))
}

/// A simple or complex (`#1 = ( A(..) B(..) );`) instance.
pub fn entity_instance(input: &str) -> IResult<&str, EntityInstance> {
    let (input, _) = sp(input)?;
    let (input, id) = entity_id(input)?;
    let (input, _) = sp(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = sp(input)?;

    // Complex entity instance: =( TYPE1(...) TYPE2(...) ... )
    let (input, type_name, params) = if input.starts_with('(') {
        let (input, typed_values) =
            delimited(char('('), many0(typed_value), pair(sp, char(')')))(input)?;

        // The first type names the entity; parameters are flattened in order
        let mut parts = typed_values.into_iter();
        let (primary, mut params) = parts
            .next()
            .unwrap_or_else(|| ("COMPLEX".to_string(), Vec::new()));
        params.extend(parts.flat_map(|(_, p)| p));
        (input, primary, params)
    } else {
        let (input, (type_name, params)) = typed_value(input)?;
        (input, type_name, params)
    };

    let (input, _) = sp(input)?;
    let (input, _) = char(';')(input)?;

    Ok((
        input,
        EntityInstance {
            id,
            type_name,
            params,
        },
    ))
}

/// Every instance between `DATA;` and `ENDSEC;`.
pub fn parse_data_section(input: &str) -> IResult<&str, Vec<EntityInstance>> {
    let (input, _) = take_until("DATA;")(input)?;
    let (input, _) = tag("DATA;")(input)?;
    let (input, _) = sp(input)?;

    let (input, entities) = many0(terminated(entity_instance, sp))(input)?;

    let (input, _) = tag("ENDSEC;")(input)?;

    Ok((input, entities))
}
