//! Parser for build.hm manifests.
//!
//! The format is line oriented and borrows ninja's shape: top-level
//! `name = value` bindings, `mode` and `default` statements, and indented
//! `key = value` attributes under each `target` header.
//!
//! To avoid allocations parsing uses references into the input text, marked
//! with the lifetime `'text`.

use crate::eval::{EvalPart, EvalString};
use crate::scanner::{ParseError, ParseResult, Scanner};
use std::path::Path;

/// One whitespace-separated word of a value.
#[derive(Debug, PartialEq)]
pub enum Word<'text> {
    /// Literal text with optional `$var` references.
    Text(EvalString<&'text str>),
    /// `$[pattern]`: a filesystem glob, expanded when the action starts.
    Glob(&'text str),
    /// `$(prog args...)`: a helper program whose stdout becomes tokens.
    Run(Vec<EvalString<&'text str>>),
}

/// A `key = value` line within a target block.
#[derive(Debug)]
pub struct Attr<'text> {
    pub key: &'text str,
    pub line: usize,
    pub words: Vec<Word<'text>>,
}

#[derive(Debug)]
pub struct Target<'text> {
    pub name: &'text str,
    pub line: usize,
    pub attrs: Vec<Attr<'text>>,
}

#[derive(Debug)]
pub enum Statement<'text> {
    VarDef(&'text str, Vec<Word<'text>>),
    Mode(&'text str, Vec<Word<'text>>),
    Default(Vec<&'text str>),
    Target(Target<'text>),
}

pub struct Parser<'text> {
    scanner: Scanner<'text>,
}

fn is_ident_char(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.')
}

fn is_var_char(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-')
}

fn is_name_char(c: char) -> bool {
    matches!(
      c,
      'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' | '/' | ',' | '+' | '@' | ':'
    )
}

fn is_word_end(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\0')
}

impl<'text> Parser<'text> {
    /// The buffer must end with a nul byte.
    pub fn new(buf: &'text [u8]) -> Parser<'text> {
        Parser {
            scanner: Scanner::new(buf),
        }
    }

    pub fn format_parse_error(&self, filename: &Path, err: ParseError) -> String {
        self.scanner.format_parse_error(filename, err)
    }

    pub fn read(&mut self) -> ParseResult<Option<Statement<'text>>> {
        loop {
            match self.scanner.peek() {
                '\0' => return Ok(None),
                '\n' | '\r' => self.scanner.next(),
                '#' => self.skip_comment(),
                ' ' | '\t' => {
                    // Blank lines may still carry whitespace.
                    self.scanner.skip_spaces();
                    match self.scanner.peek() {
                        '\n' | '\r' | '\0' => {}
                        '#' => self.skip_comment(),
                        _ => return self.scanner.parse_error("unexpected indentation"),
                    }
                }
                _ => {
                    let ident = self.read_ident()?;
                    self.scanner.skip_spaces();
                    let stmt = match ident {
                        "target" => Statement::Target(self.read_target()?),
                        "mode" => {
                            let name = self.read_ident()?;
                            Statement::Mode(name, self.read_vardef()?)
                        }
                        "default" => Statement::Default(self.read_default()?),
                        name => Statement::VarDef(name, self.read_vardef()?),
                    };
                    return Ok(Some(stmt));
                }
            }
        }
    }

    fn read_vardef(&mut self) -> ParseResult<Vec<Word<'text>>> {
        self.scanner.skip_spaces();
        self.scanner.expect('=')?;
        let words = self.read_words()?;
        self.scanner.expect_eol()?;
        Ok(words)
    }

    fn read_target(&mut self) -> ParseResult<Target<'text>> {
        let line = self.scanner.line;
        let name = self.read_name()?;
        self.scanner.skip_spaces();
        self.scanner.expect_eol()?;

        let mut attrs = Vec::new();
        while matches!(self.scanner.peek(), ' ' | '\t') {
            self.scanner.skip_spaces();
            match self.scanner.peek() {
                '\n' | '\r' => {
                    self.scanner.expect_eol()?;
                    continue;
                }
                '#' => {
                    self.skip_comment();
                    continue;
                }
                '\0' => break,
                _ => {}
            }
            let line = self.scanner.line;
            let key = self.read_ident()?;
            let words = self.read_vardef()?;
            attrs.push(Attr { key, line, words });
        }
        Ok(Target { name, line, attrs })
    }

    fn read_default(&mut self) -> ParseResult<Vec<&'text str>> {
        let mut defaults = Vec::new();
        while !is_word_end(self.scanner.peek()) {
            defaults.push(self.read_name()?);
            self.scanner.skip_spaces();
        }
        if defaults.is_empty() {
            return self.scanner.parse_error("expected target name");
        }
        self.scanner.expect_eol()?;
        Ok(defaults)
    }

    fn skip_comment(&mut self) {
        loop {
            match self.scanner.read() {
                '\0' | '\n' => return,
                _ => {}
            }
        }
    }

    fn read_ident(&mut self) -> ParseResult<&'text str> {
        self.read_while(is_ident_char, "failed to scan ident")
    }

    fn read_name(&mut self) -> ParseResult<&'text str> {
        self.read_while(is_name_char, "expected target name")
    }

    fn read_while(&mut self, pred: fn(char) -> bool, what: &str) -> ParseResult<&'text str> {
        let start = self.scanner.ofs;
        while pred(self.scanner.peek()) {
            self.scanner.next();
        }
        let end = self.scanner.ofs;
        if end == start {
            return self.scanner.parse_error(what);
        }
        Ok(self.scanner.slice(start, end))
    }

    /// Read words up to (not including) the end of the line.
    fn read_words(&mut self) -> ParseResult<Vec<Word<'text>>> {
        let mut words = Vec::new();
        loop {
            self.scanner.skip_spaces();
            match self.scanner.peek() {
                '\n' | '\r' | '\0' => break,
                '$' if matches!(self.scanner.peek_next(), '\n' | '\r') => {
                    // Line continuation.
                    self.scanner.next();
                    self.scanner.skip('\r');
                    self.scanner.skip('\n');
                }
                _ => words.push(self.read_word()?),
            }
        }
        Ok(words)
    }

    fn read_word(&mut self) -> ParseResult<Word<'text>> {
        if self.scanner.peek() == '$' && matches!(self.scanner.peek_next(), '(' | '[') {
            self.scanner.next();
            let word = if self.scanner.read() == '(' {
                Word::Run(self.read_run()?)
            } else {
                Word::Glob(self.read_glob()?)
            };
            if !is_word_end(self.scanner.peek()) {
                return self
                    .scanner
                    .parse_error("expected whitespace after $(...) or $[...]");
            }
            return Ok(word);
        }
        Ok(Word::Text(self.read_text(false)?))
    }

    fn read_text(&mut self, in_run: bool) -> ParseResult<EvalString<&'text str>> {
        let mut parts = Vec::with_capacity(1);
        let mut ofs = self.scanner.ofs;
        loop {
            match self.scanner.peek() {
                c if is_word_end(c) => break,
                ')' if in_run => break,
                '$' => {
                    if matches!(self.scanner.peek_next(), '\n' | '\r') {
                        break;
                    }
                    let end = self.scanner.ofs;
                    if end > ofs {
                        parts.push(EvalPart::Literal(self.scanner.slice(ofs, end)));
                    }
                    self.scanner.next();
                    parts.push(self.read_escape()?);
                    ofs = self.scanner.ofs;
                }
                _ => self.scanner.next(),
            }
        }
        let end = self.scanner.ofs;
        if end > ofs {
            parts.push(EvalPart::Literal(self.scanner.slice(ofs, end)));
        }
        Ok(EvalString::new(parts))
    }

    /// Read the part after a `$`.
    fn read_escape(&mut self) -> ParseResult<EvalPart<&'text str>> {
        Ok(match self.scanner.peek() {
            '$' | ' ' => {
                self.scanner.next();
                EvalPart::Literal(self.scanner.slice(self.scanner.ofs - 1, self.scanner.ofs))
            }
            '{' => {
                self.scanner.next();
                let start = self.scanner.ofs;
                loop {
                    match self.scanner.read() {
                        '\0' | '\n' => return self.scanner.parse_error("unterminated ${"),
                        '}' => break,
                        _ => {}
                    }
                }
                EvalPart::VarRef(self.scanner.slice(start, self.scanner.ofs - 1))
            }
            '(' | '[' => return self.scanner.parse_error("$( and $[ must start a word"),
            _ => EvalPart::VarRef(self.read_while(is_var_char, "bad $-escape")?),
        })
    }

    fn read_run(&mut self) -> ParseResult<Vec<EvalString<&'text str>>> {
        let mut args = Vec::new();
        loop {
            self.scanner.skip_spaces();
            match self.scanner.peek() {
                ')' => {
                    self.scanner.next();
                    break;
                }
                '\n' | '\r' | '\0' => return self.scanner.parse_error("unterminated $("),
                '$' if matches!(self.scanner.peek_next(), '(' | '[' | '\n' | '\r') => {
                    return self.scanner.parse_error("unexpected $ inside $(...)");
                }
                _ => args.push(self.read_text(true)?),
            }
        }
        if args.is_empty() {
            return self.scanner.parse_error("empty $()");
        }
        Ok(args)
    }

    fn read_glob(&mut self) -> ParseResult<&'text str> {
        let start = self.scanner.ofs;
        let mut depth = 0;
        loop {
            match self.scanner.peek() {
                '\n' | '\r' | '\0' => return self.scanner.parse_error("unterminated $["),
                '[' => depth += 1,
                ']' if depth == 0 => break,
                ']' => depth -= 1,
                _ => {}
            }
            self.scanner.next();
        }
        let pattern = self.scanner.slice(start, self.scanner.ofs);
        self.scanner.next();
        if pattern.is_empty() {
            return self.scanner.parse_error("empty $[]");
        }
        Ok(pattern)
    }
}
