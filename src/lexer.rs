//! Transforms source text into a flat sequence of [`TaggedTerm`]s, stripped
//! of comments and blank lines. This is a pure, total function of the
//! input text: it never consults the ISA's arity table (that's the
//! translator's job in its shape-validation pass).

use crate::errors::{ParseError, SourceLocation};
use crate::isa::Opcode;
use regex::Regex;
use std::sync::OnceLock;

/// An operand as written in the source, before the translator resolves
/// identifiers to addresses or register kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Ident(String),
    Number(i32),
    Char(char),
}

/// One lexical term, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    SectionText,
    SectionData,
    Label(String),
    WordDecl(RawValue),
    IntVectorDecl(RawValue, RawValue),
    Instr(String, Vec<RawValue>),
}

/// A term plus the source position it came from, so the translator can
/// build diagnostics that cite the offending line.
#[derive(Debug, Clone)]
pub struct TaggedTerm {
    pub term: Term,
    pub line_number: usize,
    pub line: String,
}

fn operand_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'[^']*'|[^,\s]+").unwrap())
}

fn ident_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+$").unwrap())
}

/// Tokenise a full program into its term sequence. Section headers are
/// recognised by their `section` keyword prefix, not by indentation;
/// labels and instructions may be written at any column.
pub fn tokenize(source: &str) -> Result<Vec<TaggedTerm>, ParseError> {
    let mut terms = Vec::new();
    let mut in_section = false;

    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let stripped = strip_comment(raw_line);
        let content = stripped.trim();
        if content.is_empty() {
            continue;
        }

        let here = || SourceLocation::new(line_number, raw_line.to_string());

        let mut words = content.split_whitespace();
        if words.next() == Some("section") {
            let term = match words.next() {
                Some("text") if words.next().is_none() => Term::SectionText,
                Some("data") if words.next().is_none() => Term::SectionData,
                _ => {
                    return Err(ParseError::UnknownSectionDirective {
                        directive: content.to_string(),
                        at: here(),
                    });
                }
            };
            in_section = true;
            terms.push(TaggedTerm { term, line_number, line: raw_line.to_string() });
            continue;
        }

        if !in_section {
            return Err(ParseError::ContentBeforeSection { at: here() });
        }

        let term = parse_content_line(content, &here)?;
        terms.push(TaggedTerm { term, line_number, line: raw_line.to_string() });
    }

    Ok(terms)
}

/// Cut a line at its first `;` that isn't inside a character literal.
fn strip_comment(line: &str) -> &str {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (pos, ch) = chars[i];
        if ch == '\'' {
            if let Some(rel) = chars[i + 1..].iter().position(|&(_, c)| c == '\'') {
                i = i + 1 + rel + 1;
                continue;
            } else {
                return line;
            }
        }
        if ch == ';' {
            return &line[..pos];
        }
        i += 1;
    }
    line
}

fn parse_content_line(
    content: &str,
    here: &dyn Fn() -> SourceLocation,
) -> Result<Term, ParseError> {
    if content.ends_with(':') {
        let name = &content[..content.len() - 1];
        if ident_regex().is_match(name) {
            return Ok(Term::Label(name.to_string()));
        }
        return Err(ParseError::MalformedLabel { text: content.to_string(), at: here() });
    }

    let tokens: Vec<&str> = operand_regex().find_iter(content).map(|m| m.as_str()).collect();
    let (head, rest) = tokens.split_first().expect("non-empty trimmed content yields a token");

    match *head {
        "word" => {
            if rest.len() != 1 {
                return Err(ParseError::WrongDeclArity {
                    keyword: "word".to_string(),
                    expected: 1,
                    found: rest.len(),
                    at: here(),
                });
            }
            Ok(Term::WordDecl(parse_raw_value(rest[0], here)?))
        }
        "int" => {
            if rest.len() != 2 {
                return Err(ParseError::WrongDeclArity {
                    keyword: "int".to_string(),
                    expected: 2,
                    found: rest.len(),
                    at: here(),
                });
            }
            let vector_index = parse_raw_value(rest[0], here)?;
            let target = parse_raw_value(rest[1], here)?;
            Ok(Term::IntVectorDecl(vector_index, target))
        }
        mnemonic => {
            if Opcode::from_mnemonic(mnemonic).is_none() {
                return Err(ParseError::UnknownMnemonic { mnemonic: mnemonic.to_string(), at: here() });
            }
            let operands = rest
                .iter()
                .map(|tok| parse_raw_value(tok, here))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Term::Instr(mnemonic.to_string(), operands))
        }
    }
}

fn parse_raw_value(token: &str, here: &dyn Fn() -> SourceLocation) -> Result<RawValue, ParseError> {
    if let Some(rest) = token.strip_prefix('\'') {
        if let Some(inner) = rest.strip_suffix('\'') {
            let mut chars = inner.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(RawValue::Char(c)),
                _ => Err(ParseError::InvalidCharLiteral { text: token.to_string(), at: here() }),
            };
        }
        return Err(ParseError::UnterminatedCharLiteral { text: token.to_string(), at: here() });
    }

    if number_regex().is_match(token) {
        return match token.parse::<i64>() {
            Ok(n) if n >= i32::MIN as i64 && n <= i32::MAX as i64 => Ok(RawValue::Number(n as i32)),
            _ => Err(ParseError::NumericOverflow { text: token.to_string(), at: here() }),
        };
    }

    if ident_regex().is_match(token) {
        return Ok(RawValue::Ident(token.to_string()));
    }

    Err(ParseError::InvalidOperand { text: token.to_string(), at: here() })
}
