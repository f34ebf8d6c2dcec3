//! YANG statement tokenizer.
//!
//! Produces a flat token stream over the canonical text form: punctuation
//! (`{`, `}`, `;`, `+`), unquoted strings, and single/double-quoted strings.
//! Line (`//`) and block (`/* */`) comments are skipped. Escape processing
//! and `+`-concatenation of quoted fragments happen in [`string_value`] so
//! token spans always point at raw source.

pub mod keyword;
mod token;

pub use keyword::{Section, StmtKind};
pub use token::{ByteOffset, Diagnostic, Severity, Span, Token, TokenKind};

/// YANG tokenizer.
pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over source bytes.
    #[must_use]
    pub fn new(source: &'src [u8]) -> Self {
        Self {
            source,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the whole input, returning tokens (ending in `Eof`) and any
    /// diagnostics.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // source length bounded by u32 spans
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let start = self.pos as u32;
            let Some(byte) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, Span::new(start, start)));
                break;
            };

            let kind = match byte {
                b'{' => {
                    self.pos += 1;
                    TokenKind::LBrace
                }
                b'}' => {
                    self.pos += 1;
                    TokenKind::RBrace
                }
                b';' => {
                    self.pos += 1;
                    TokenKind::Semicolon
                }
                b'+' if self.plus_is_concat() => {
                    self.pos += 1;
                    TokenKind::Plus
                }
                b'"' => self.scan_quoted(b'"'),
                b'\'' => self.scan_quoted(b'\''),
                _ => self.scan_bare(),
            };

            tokens.push(Token::new(kind, Span::new(start, self.pos as u32)));
        }

        (tokens, self.diagnostics)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    /// `+` is concatenation only between quoted strings; inside unquoted
    /// strings (e.g. range expressions) it is ordinary content. A `+` that is
    /// followed by whitespace or a quote starts concatenation.
    fn plus_is_concat(&self) -> bool {
        matches!(
            self.peek_at(1),
            None | Some(b' ' | b'\t' | b'\r' | b'\n' | b'"' | b'\'')
        )
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos as u32;
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            None => {
                                self.diagnostics.push(Diagnostic {
                                    severity: Severity::Error,
                                    span: Span::new(start, self.pos as u32),
                                    message: "unterminated block comment".into(),
                                });
                                break;
                            }
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_quoted(&mut self, quote: u8) -> TokenKind {
        let start = self.pos as u32;
        self.pos += 1; // opening quote
        loop {
            match self.peek() {
                None => {
                    self.diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        span: Span::new(start, self.pos as u32),
                        message: "unterminated string literal".into(),
                    });
                    return TokenKind::Error;
                }
                Some(b'\\') if quote == b'"' => self.pos += 2.min(self.source.len() - self.pos),
                Some(byte) if byte == quote => {
                    self.pos += 1;
                    return if quote == b'"' {
                        TokenKind::DoubleQuoted
                    } else {
                        TokenKind::SingleQuoted
                    };
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn scan_bare(&mut self) -> TokenKind {
        loop {
            match self.peek() {
                None | Some(b' ' | b'\t' | b'\r' | b'\n' | b'{' | b'}' | b';' | b'"' | b'\'') => {
                    break
                }
                Some(b'/') if matches!(self.peek_at(1), Some(b'/' | b'*')) => break,
                Some(_) => self.pos += 1,
            }
        }
        TokenKind::BareString
    }
}

/// Decode the value of a single string token.
///
/// Double-quoted strings process the four YANG escapes (`\n`, `\t`, `\"`,
/// `\\`); single-quoted and bare strings are taken verbatim.
#[must_use]
pub fn string_value(source: &[u8], token: Token) -> String {
    let raw = &source[token.span.start as usize..token.span.end as usize];
    let raw = core::str::from_utf8(raw).unwrap_or("");

    match token.kind {
        TokenKind::SingleQuoted => raw[1..raw.len() - 1].to_owned(),
        TokenKind::DoubleQuoted => {
            let inner = &raw[1..raw.len() - 1];
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(ch) = chars.next() {
                if ch == '\\' {
                    match chars.next() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('"') => out.push('"'),
                        Some('\\') => out.push('\\'),
                        Some(other) => {
                            out.push('\\');
                            out.push(other);
                        }
                        None => out.push('\\'),
                    }
                } else {
                    out.push(ch);
                }
            }
            out
        }
        _ => raw.to_owned(),
    }
}

/// 1-based line number of a byte offset, for diagnostics.
#[must_use]
pub fn line_at(source: &[u8], offset: ByteOffset) -> u32 {
    let end = (offset as usize).min(source.len());
    1 + source[..end].iter().filter(|&&b| b == b'\n').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = Lexer::new(source.as_bytes()).tokenize();
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("leaf x { type string; }"),
            vec![
                TokenKind::BareString,
                TokenKind::BareString,
                TokenKind::LBrace,
                TokenKind::BareString,
                TokenKind::BareString,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("// header\nmodule /* inline */ a;"),
            vec![
                TokenKind::BareString,
                TokenKind::BareString,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_quoted_strings() {
        let source = r#"pattern "[a-z]+" + 'suffix';"#;
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::BareString,
                TokenKind::DoubleQuoted,
                TokenKind::Plus,
                TokenKind::SingleQuoted,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_plus_inside_bare_string_is_content() {
        // A '+' inside an unquoted argument (e.g. a pattern) is not the
        // concatenation operator.
        let (tokens, _) = Lexer::new(b"range 1..+10;").tokenize();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::BareString,
                TokenKind::BareString,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_double_quoted_escapes() {
        let source = br#""a\"b\n\\c""#;
        let (tokens, _) = Lexer::new(source).tokenize();
        assert_eq!(string_value(source, tokens[0]), "a\"b\n\\c");
    }

    #[test]
    fn test_single_quoted_verbatim() {
        let source = br"'a\nb'";
        let (tokens, _) = Lexer::new(source).tokenize();
        assert_eq!(string_value(source, tokens[0]), r"a\nb");
    }

    #[test]
    fn test_unterminated_string_reported() {
        let (_, diagnostics) = Lexer::new(b"leaf \"oops").tokenize();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("unterminated"));
    }

    #[test]
    fn test_line_at() {
        let source = b"a\nb\nc";
        assert_eq!(line_at(source, 0), 1);
        assert_eq!(line_at(source, 2), 2);
        assert_eq!(line_at(source, 4), 3);
    }
}
