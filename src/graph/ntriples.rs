//! N-Triples reader and writer.
//!
//! The writer emits one statement per line, sorted, so two equal graphs
//! serialize to identical bytes. The reader accepts the subset produced by
//! common linked-data tooling: IRIs, plain and language-tagged literals, and
//! datatyped literals (the datatype is dropped and the lexical value kept).

use std::io::{BufRead, Write};

use super::{Graph, Literal, Term, Triple, Vocabulary};
use crate::error::GraphError;

fn escape_literal(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
}

fn format_term(term: &Term, out: &mut String) {
    match term {
        Term::Iri { iri } => {
            out.push('<');
            out.push_str(iri);
            out.push('>');
        }
        Term::Literal(lit) => {
            out.push('"');
            escape_literal(&lit.value, out);
            out.push('"');
            if let Some(lang) = &lit.lang {
                out.push('@');
                out.push_str(lang);
            }
        }
    }
}

fn format_triple(triple: &Triple, vocab: &Vocabulary) -> String {
    let mut line = String::with_capacity(128);
    line.push('<');
    line.push_str(&triple.subject);
    line.push_str("> <");
    line.push_str(&vocab.predicate_iri(&triple.predicate));
    line.push_str("> ");
    format_term(&triple.object, &mut line);
    line.push_str(" .");
    line
}

/// Serializes `graph` as sorted N-Triples.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn write_ntriples<W: Write>(graph: &Graph, vocab: &Vocabulary, mut out: W) -> std::io::Result<()> {
    let mut lines: Vec<String> = graph.iter().map(|t| format_triple(t, vocab)).collect();
    lines.sort_unstable();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Serializes `graph` as sorted N-Triples into a string.
#[must_use]
pub fn to_ntriples_string(graph: &Graph, vocab: &Vocabulary) -> String {
    let mut lines: Vec<String> = graph.iter().map(|t| format_triple(t, vocab)).collect();
    lines.sort_unstable();
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Parses N-Triples from `input` into a graph, preserving statement order.
///
/// # Errors
/// Returns [`GraphError::Syntax`] with the 1-based line number on malformed
/// input, or [`GraphError::Io`] if reading fails.
pub fn read_ntriples<R: BufRead>(input: R, vocab: &Vocabulary) -> Result<Graph, GraphError> {
    let mut graph = Graph::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if let Some(triple) = parse_line(&line, vocab)
            .map_err(|reason| GraphError::Syntax { line: line_no, reason })?
        {
            graph.insert(triple);
        }
    }
    Ok(graph)
}

fn parse_line(line: &str, vocab: &Vocabulary) -> Result<Option<Triple>, String> {
    let mut cur = Cursor::new(line);
    cur.skip_ws();
    if cur.at_end() || cur.peek() == Some('#') {
        return Ok(None);
    }

    let subject = cur.iri()?;
    cur.skip_ws();
    let predicate = cur.iri()?;
    cur.skip_ws();
    let object = match cur.peek() {
        Some('<') => Term::iri(cur.iri()?),
        Some('"') => Term::Literal(cur.literal()?),
        Some(c) => return Err(format!("unexpected character {c:?} in object position")),
        None => return Err("missing object".to_string()),
    };
    cur.skip_ws();
    if cur.peek() != Some('.') {
        return Err("expected '.' after object".to_string());
    }
    cur.bump();
    cur.skip_ws();
    if !cur.at_end() && cur.peek() != Some('#') {
        return Err("trailing content after '.'".to_string());
    }

    Ok(Some(Triple::new(subject, vocab.predicate_from_iri(&predicate), object)))
}

struct Cursor<'a> {
    rest: std::str::Chars<'a>,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s.chars() }
    }

    fn peek(&self) -> Option<char> {
        self.rest.clone().next()
    }

    fn bump(&mut self) -> Option<char> {
        self.rest.next()
    }

    fn at_end(&self) -> bool {
        self.peek().is_none()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), String> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(format!("expected {want:?}, found {c:?}")),
            None => Err(format!("expected {want:?}, found end of line")),
        }
    }

    fn iri(&mut self) -> Result<String, String> {
        self.expect('<')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some('\\') => out.push(self.unicode_escape()?),
                Some(c) if c == '<' || c == '"' || c.is_whitespace() => {
                    return Err(format!("invalid character {c:?} in IRI"));
                }
                Some(c) => out.push(c),
                None => return Err("unterminated IRI".to_string()),
            }
        }
        if out.is_empty() {
            return Err("empty IRI".to_string());
        }
        Ok(out)
    }

    fn literal(&mut self) -> Result<Literal, String> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.peek() {
                    Some('u' | 'U') => value.push(self.unicode_escape()?),
                    Some(c) => {
                        self.bump();
                        value.push(match c {
                            't' => '\t',
                            'b' => '\u{8}',
                            'n' => '\n',
                            'r' => '\r',
                            'f' => '\u{c}',
                            '"' => '"',
                            '\'' => '\'',
                            '\\' => '\\',
                            other => return Err(format!("unknown escape \\{other}")),
                        });
                    }
                    None => return Err("dangling escape".to_string()),
                },
                Some(c) => value.push(c),
                None => return Err("unterminated literal".to_string()),
            }
        }

        match self.peek() {
            Some('@') => {
                self.bump();
                let mut lang = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        lang.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if lang.is_empty() {
                    return Err("empty language tag".to_string());
                }
                Ok(Literal { value, lang: Some(lang) })
            }
            Some('^') => {
                self.bump();
                self.expect('^')?;
                self.iri()?;
                Ok(Literal::plain(value))
            }
            _ => Ok(Literal::plain(value)),
        }
    }

    /// Decodes `\uXXXX` / `\UXXXXXXXX`; the backslash is already consumed.
    fn unicode_escape(&mut self) -> Result<char, String> {
        let width = match self.bump() {
            Some('u') => 4,
            Some('U') => 8,
            Some(c) => return Err(format!("unknown escape \\{c}")),
            None => return Err("dangling escape".to_string()),
        };
        let mut hex = String::with_capacity(width);
        for _ in 0..width {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err("truncated unicode escape".to_string()),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("invalid code point U+{hex}"))
    }
}
