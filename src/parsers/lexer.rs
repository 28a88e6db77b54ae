//! Comment and literal stripping for lexical extraction.
//!
//! The stripped text has exactly the byte length and newline layout of the
//! input, so any offset found in it can be used to slice the original source
//! or to compute a line number.

/// What the stripper blanks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripMode {
    /// Blank comments and the bodies of string and template literals.
    /// Literal delimiters are kept so extractors can locate specifiers.
    CommentsAndLiterals,
    /// Blank comments only; literals pass through untouched (JSONC input).
    CommentsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    LineComment,
    BlockComment,
    Str(u8),
    Template,
}

/// Single-use scanner. Each call site builds its own, so no scan position is
/// ever shared between analyses.
pub struct Stripper<'a> {
    source: &'a [u8],
    mode: StripMode,
    state: State,
    out: Vec<u8>,
}

impl<'a> Stripper<'a> {
    pub fn new(source: &'a str, mode: StripMode) -> Self {
        Self {
            source: source.as_bytes(),
            mode,
            state: State::Normal,
            out: Vec::with_capacity(source.len()),
        }
    }

    pub fn run(mut self) -> String {
        let bytes = self.source;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            let next = bytes.get(i + 1).copied();

            match self.state {
                State::Normal => match (b, next) {
                    (b'/', Some(b'/')) => {
                        self.state = State::LineComment;
                        self.blank(b);
                        self.blank(b'/');
                        i += 2;
                        continue;
                    }
                    (b'/', Some(b'*')) => {
                        self.state = State::BlockComment;
                        self.blank(b);
                        self.blank(b'*');
                        i += 2;
                        continue;
                    }
                    (b'"' | b'\'', _) => {
                        self.state = State::Str(b);
                        self.out.push(b);
                    }
                    (b'`', _) => {
                        self.state = State::Template;
                        self.out.push(b);
                    }
                    _ => self.out.push(b),
                },
                State::LineComment => {
                    if b == b'\n' {
                        self.state = State::Normal;
                    }
                    self.blank(b);
                }
                State::BlockComment => {
                    if b == b'*' && next == Some(b'/') {
                        self.state = State::Normal;
                        self.blank(b);
                        self.blank(b'/');
                        i += 2;
                        continue;
                    }
                    self.blank(b);
                }
                State::Str(quote) => {
                    if b == b'\\' {
                        self.literal(b);
                        if let Some(escaped) = next {
                            self.literal(escaped);
                        }
                        i += 2;
                        continue;
                    }
                    if b == quote {
                        self.state = State::Normal;
                        self.out.push(b);
                    } else if b == b'\n' {
                        // Unterminated: plain strings cannot span lines.
                        self.state = State::Normal;
                        self.out.push(b);
                    } else {
                        self.literal(b);
                    }
                }
                State::Template => {
                    if b == b'\\' {
                        self.literal(b);
                        if let Some(escaped) = next {
                            self.literal(escaped);
                        }
                        i += 2;
                        continue;
                    }
                    if b == b'`' {
                        self.state = State::Normal;
                        self.out.push(b);
                    } else {
                        self.literal(b);
                    }
                }
            }

            i += 1;
        }

        // Only ASCII bytes are ever substituted and whole UTF-8 sequences are
        // either copied or fully replaced, so this never actually loses data.
        String::from_utf8(self.out)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
    }

    fn blank(&mut self, b: u8) {
        self.out.push(if b == b'\n' { b'\n' } else { b' ' });
    }

    fn literal(&mut self, b: u8) {
        match self.mode {
            StripMode::CommentsAndLiterals => self.blank(b),
            StripMode::CommentsOnly => self.out.push(b),
        }
    }
}

/// Blank comments and literal bodies, keeping offsets and line structure.
pub fn strip_source(source: &str) -> String {
    Stripper::new(source, StripMode::CommentsAndLiterals).run()
}

/// Blank comments only.
pub fn strip_comments(source: &str) -> String {
    Stripper::new(source, StripMode::CommentsOnly).run()
}

/// Byte offset to 1-based line lookup over the original text.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { line_starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

/// Read the body of the string literal whose opening delimiter sits at
/// `open` in `stripped`, returning the matching slice of `original`.
pub fn literal_body(stripped: &str, original: &str, open: usize) -> Option<String> {
    let bytes = stripped.as_bytes();
    let quote = *bytes.get(open)?;
    let mut idx = open + 1;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b == quote {
            return original.get(open + 1..idx).map(str::to_string);
        }
        if b == b'\n' && quote != b'`' {
            return None;
        }
        idx += 1;
    }
    None
}
