//! Scans manifest text byte by byte, tracking lines for error reporting.

use std::path::Path;

#[derive(Debug)]
pub struct ParseError {
    msg: String,
    ofs: usize,
}
pub type ParseResult<T> = Result<T, ParseError>;

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at offset {})", self.msg, self.ofs)
    }
}

/// Cursor over a nul-terminated manifest buffer.
/// The trailing nul lets every lookahead avoid a bounds check against EOF.
pub struct Scanner<'a> {
    buf: &'a [u8],
    pub ofs: usize,
    pub line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        if !buf.ends_with(b"\0") {
            panic!("Scanner requires nul-terminated buf");
        }
        Scanner {
            buf,
            ofs: 0,
            line: 1,
        }
    }

    /// Text between two offsets.  Input is validated as UTF-8 by the loader,
    /// and the parser only splits at ASCII delimiters.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.buf[start..end]).unwrap_or("")
    }

    pub fn peek(&self) -> char {
        self.buf[self.ofs] as char
    }

    /// The character after peek(), or nul at the end of input.
    pub fn peek_next(&self) -> char {
        self.buf.get(self.ofs + 1).map_or('\0', |&c| c as char)
    }

    pub fn next(&mut self) {
        if self.peek() == '\n' {
            self.line += 1;
        }
        if self.ofs == self.buf.len() - 1 {
            panic!("scanned past end")
        }
        self.ofs += 1;
    }

    pub fn back(&mut self) {
        if self.ofs == 0 {
            panic!("back at start")
        }
        self.ofs -= 1;
        if self.peek() == '\n' {
            self.line -= 1;
        }
    }

    pub fn read(&mut self) -> char {
        let c = self.peek();
        if c != '\0' {
            self.next();
        }
        c
    }

    pub fn skip(&mut self, ch: char) -> bool {
        if self.peek() == ch {
            self.next();
            return true;
        }
        false
    }

    pub fn skip_spaces(&mut self) {
        while self.skip(' ') || self.skip('\t') {}
    }

    /// Accept a line ending, tolerating a trailing \r and end of input.
    pub fn expect_eol(&mut self) -> ParseResult<()> {
        self.skip('\r');
        match self.peek() {
            '\n' => {
                self.next();
                Ok(())
            }
            '\0' => Ok(()),
            c => self.parse_error(format!("expected end of line, got {:?}", c)),
        }
    }

    pub fn expect(&mut self, ch: char) -> ParseResult<()> {
        let r = self.peek();
        if r != ch {
            return self.parse_error(format!("expected {:?}, got {:?}", ch, r));
        }
        self.next();
        Ok(())
    }

    pub fn parse_error<T, S: Into<String>>(&self, msg: S) -> ParseResult<T> {
        Err(ParseError {
            msg: msg.into(),
            ofs: self.ofs,
        })
    }

    pub fn format_parse_error(&self, filename: &Path, err: ParseError) -> String {
        let mut ofs = 0;
        let lines = self.buf.split(|&c| c == b'\n');
        for (line_number, line) in lines.enumerate() {
            if ofs + line.len() >= err.ofs {
                let mut msg = "parse error: ".to_string();
                msg.push_str(&err.msg);
                msg.push('\n');

                let prefix = format!("{}:{}: ", filename.display(), line_number + 1);
                msg.push_str(&prefix);

                let line = line.strip_suffix(b"\0").unwrap_or(line);
                let mut context = String::from_utf8_lossy(line).into_owned();
                let mut col = err.ofs - ofs;
                if col > 40 {
                    // Trim beginning of line to fit it on screen.
                    msg.push_str("...");
                    context = context.chars().skip(col - 20).collect();
                    col = 3 + 20;
                }
                if context.len() > 40 {
                    let head: String = context.chars().take(40).collect();
                    msg.push_str(&head);
                    msg.push_str("...");
                } else {
                    msg.push_str(&context);
                }
                msg.push('\n');

                msg.push_str(&" ".repeat(prefix.len() + col));
                msg.push_str("^\n");
                return msg;
            }
            ofs += line.len() + 1;
        }
        format!("parse error: {}\n{}: at end of file\n", err.msg, filename.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines() {
        let buf = b"ab\ncd\0";
        let mut scanner = Scanner::new(buf);
        while scanner.read() != '\0' {}
        assert_eq!(scanner.line, 2);
    }

    #[test]
    fn error_points_at_column() {
        let buf = b"target a\n  bogus = 1\0";
        let mut scanner = Scanner::new(buf);
        while scanner.peek() != 'b' {
            scanner.next();
        }
        let err: ParseResult<()> = scanner.parse_error("unknown attribute");
        let msg = scanner.format_parse_error(Path::new("build.hm"), err.unwrap_err());
        assert_eq!(
            msg,
            "parse error: unknown attribute\nbuild.hm:2:   bogus = 1\n              ^\n"
        );
    }
}
