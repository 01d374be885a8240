//! # N-Triples Parser
//!
//! Line-oriented parser for the N-Triples serialization: one triple per
//! line, `#` comments, absolute IRIs in angle brackets, `_:`-prefixed blank
//! nodes, and plain / language-tagged / datatyped literals with the
//! standard string escapes (`\"`, `\\`, `\n`, `\t`, `\r`, `\uXXXX`,
//! `\UXXXXXXXX`).
//!
//! Errors carry the 1-based line number of the offending statement.

use super::Parser;
use crate::types::{GraphSnapshot, Literal, StoreError, Term, Triple};
use std::io::Read;

/// The built-in N-Triples parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NTriplesParser;

impl Parser for NTriplesParser {
    /// N-Triples IRIs are absolute, so `base_iri` is ignored.
    fn parse(
        &self,
        reader: &mut dyn Read,
        _base_iri: Option<&str>,
    ) -> Result<GraphSnapshot, StoreError> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| StoreError::Io(e.to_string()))?;

        let mut snapshot = GraphSnapshot::new();
        for (idx, line) in source.lines().enumerate() {
            if let Some(triple) = parse_line(line, idx + 1)? {
                snapshot.triples.push(triple);
            }
        }
        snapshot.triples.sort();
        snapshot.triples.dedup();
        Ok(snapshot)
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<Option<Triple>, StoreError> {
    let mut scanner = Scanner::new(line, line_no);
    scanner.skip_whitespace();
    if scanner.at_end() || scanner.peek() == Some('#') {
        return Ok(None);
    }

    let subject = scanner.subject()?;
    scanner.skip_whitespace();
    let predicate = Term::Iri(scanner.iri()?);
    scanner.skip_whitespace();
    let object = scanner.object()?;
    scanner.skip_whitespace();
    scanner.expect('.')?;
    scanner.skip_whitespace();
    if !scanner.at_end() && scanner.peek() != Some('#') {
        return Err(scanner.error("trailing content after '.'"));
    }

    Ok(Some(Triple::new(subject, predicate, object)))
}

/// Character cursor over one statement line.
struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line_no: usize,
}

impl<'a> Scanner<'a> {
    fn new(line: &'a str, line_no: usize) -> Self {
        Self {
            chars: line.chars().peekable(),
            line_no,
        }
    }

    fn error(&self, message: &str) -> StoreError {
        StoreError::Format(format!("line {}: {message}", self.line_no))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), StoreError> {
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(&format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(&format!("expected '{expected}', found end of line"))),
        }
    }

    fn subject(&mut self) -> Result<Term, StoreError> {
        match self.peek() {
            Some('<') => Ok(Term::Iri(self.iri()?)),
            Some('_') => Ok(Term::Blank(self.blank_label()?)),
            Some(c) => Err(self.error(&format!("invalid subject start '{c}'"))),
            None => Err(self.error("missing subject")),
        }
    }

    fn object(&mut self) -> Result<Term, StoreError> {
        match self.peek() {
            Some('<') => Ok(Term::Iri(self.iri()?)),
            Some('_') => Ok(Term::Blank(self.blank_label()?)),
            Some('"') => Ok(Term::Literal(self.literal()?)),
            Some(c) => Err(self.error(&format!("invalid object start '{c}'"))),
            None => Err(self.error("missing object")),
        }
    }

    fn iri(&mut self) -> Result<String, StoreError> {
        self.expect('<')?;
        let mut iri = String::new();
        loop {
            match self.advance() {
                Some('>') => return Ok(iri),
                Some(c) if c.is_whitespace() => {
                    return Err(self.error("whitespace inside IRI"));
                }
                Some(c) => iri.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
    }

    fn blank_label(&mut self) -> Result<String, StoreError> {
        self.expect('_')?;
        self.expect(':')?;
        let mut label = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '.' {
                break;
            }
            label.push(c);
            self.advance();
        }
        if label.is_empty() {
            return Err(self.error("empty blank node label"));
        }
        Ok(label)
    }

    fn literal(&mut self) -> Result<Literal, StoreError> {
        self.expect('"')?;
        let mut lexical = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => lexical.push(self.escape()?),
                Some(c) => lexical.push(c),
                None => return Err(self.error("unterminated literal")),
            }
        }

        match self.peek() {
            Some('@') => {
                self.advance();
                let mut tag = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        tag.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                if tag.is_empty() {
                    return Err(self.error("empty language tag"));
                }
                Ok(Literal::lang(lexical, tag))
            }
            Some('^') => {
                self.expect('^')?;
                self.expect('^')?;
                Ok(Literal::typed(lexical, self.iri()?))
            }
            _ => Ok(Literal::plain(lexical)),
        }
    }

    fn escape(&mut self) -> Result<char, StoreError> {
        match self.advance() {
            Some('"') => Ok('"'),
            Some('\\') => Ok('\\'),
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('u') => self.unicode_escape(4),
            Some('U') => self.unicode_escape(8),
            Some(c) => Err(self.error(&format!("invalid escape '\\{c}'"))),
            None => Err(self.error("dangling escape")),
        }
    }

    fn unicode_escape(&mut self, digits: usize) -> Result<char, StoreError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.advance() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                Some(c) => return Err(self.error(&format!("invalid hex digit '{c}'"))),
                None => return Err(self.error("truncated unicode escape")),
            }
        }
        let code = u32::from_str_radix(&hex, 16)
            .map_err(|_| self.error("invalid unicode escape"))?;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid scalar value"))
    }
}

// =============================================================================
// TESTS
// =============================================================================
