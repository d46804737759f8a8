use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// All lexemes in the IR surface syntax.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Let,
    If,
    Switch,
    Case,
    Default,
    For,
    Break,
    Continue,
    Leave,
    Function,

    // Symbols
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    Comma,    // ,
    Arrow,    // ->
    ColonEq,  // :=

    // Literals
    Integer(u64),
    Ident(String),

    Eof,
}

impl Lexeme {
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "let" => Some(Lexeme::Let),
            "if" => Some(Lexeme::If),
            "switch" => Some(Lexeme::Switch),
            "case" => Some(Lexeme::Case),
            "default" => Some(Lexeme::Default),
            "for" => Some(Lexeme::For),
            "break" => Some(Lexeme::Break),
            "continue" => Some(Lexeme::Continue),
            "leave" => Some(Lexeme::Leave),
            "function" => Some(Lexeme::Function),
            _ => None,
        }
    }

    /// Human-readable description for diagnostics.
    pub fn description(&self) -> String {
        match self {
            Lexeme::Let => "'let'".to_string(),
            Lexeme::If => "'if'".to_string(),
            Lexeme::Switch => "'switch'".to_string(),
            Lexeme::Case => "'case'".to_string(),
            Lexeme::Default => "'default'".to_string(),
            Lexeme::For => "'for'".to_string(),
            Lexeme::Break => "'break'".to_string(),
            Lexeme::Continue => "'continue'".to_string(),
            Lexeme::Leave => "'leave'".to_string(),
            Lexeme::Function => "'function'".to_string(),
            Lexeme::LParen => "'('".to_string(),
            Lexeme::RParen => "')'".to_string(),
            Lexeme::LBrace => "'{'".to_string(),
            Lexeme::RBrace => "'}'".to_string(),
            Lexeme::Comma => "','".to_string(),
            Lexeme::Arrow => "'->'".to_string(),
            Lexeme::ColonEq => "':='".to_string(),
            Lexeme::Integer(n) => format!("integer '{}'", n),
            Lexeme::Ident(name) => format!("identifier '{}'", name),
            Lexeme::Eof => "end of file".to_string(),
        }
    }
}

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() {
                return self.scan_number();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None — error was recorded, try again
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let token = Lexeme::from_keyword(text).unwrap_or_else(|| Lexeme::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;

        // Hex literal
        if self.source[self.pos] == b'0'
            && self.pos + 1 < self.source.len()
            && (self.source[self.pos + 1] == b'x' || self.source[self.pos + 1] == b'X')
        {
            self.pos += 2;
            let digits_start = self.pos;
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_hexdigit() {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap();
            let value = u64::from_str_radix(text, 16).unwrap_or_else(|_| {
                self.error(start, "hex literal does not fit in a 64-bit word");
                0
            });
            return self.make_token(Lexeme::Integer(value), start, self.pos);
        }

        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let value = text.parse::<u64>().unwrap_or_else(|_| {
            self.error(start, "integer literal does not fit in a 64-bit word");
            0
        });
        self.make_token(Lexeme::Integer(value), start, self.pos)
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        let next = self.source.get(self.pos + 1).copied();

        let (token, len) = match (ch, next) {
            (b':', Some(b'=')) => (Lexeme::ColonEq, 2),
            (b'-', Some(b'>')) => (Lexeme::Arrow, 2),
            (b'(', _) => (Lexeme::LParen, 1),
            (b')', _) => (Lexeme::RParen, 1),
            (b'{', _) => (Lexeme::LBrace, 1),
            (b'}', _) => (Lexeme::RBrace, 1),
            (b',', _) => (Lexeme::Comma, 1),
            _ => {
                self.error(start, &format!("unexpected character '{}'", ch as char));
                self.pos += 1;
                return None;
            }
        };
        self.pos += len;
        Some(self.make_token(token, start, self.pos))
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }

    fn error(&mut self, at: usize, message: &str) {
        self.diagnostics.push(Diagnostic::error(
            message.to_string(),
            Span::new(at as u32, at as u32 + 1),
        ));
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_' || ch == b'$'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' || ch == b'.'
}
