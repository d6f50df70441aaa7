//! Expression Lexer
//!
//! Tokenizes the body of a backtick expression after placeholder
//! substitution, e.g. `pow(3,2) + 1.5e-3 * (4 // 3)`.

use std::fmt;

/// Token types of the expression language
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    String(String),
    True,
    False,

    // Function and constant names
    Identifier(String),

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    StarStar,   // **
    Slash,      // /
    SlashSlash, // //
    Percent,    // %
    Eq,         // ==
    Ne,         // !=
    Lt,         // <
    Le,         // <=
    Gt,         // >
    Ge,         // >=
    And,        // && and
    Or,         // || or
    Not,        // ! not
    Comma,      // ,

    // Delimiters
    LParen, // (
    RParen, // )

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "'{}'", s),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::StarStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::SlashSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Eof => write!(f, "end of expression"),
        }
    }
}

/// Lexer error
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lex error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for LexError {}

/// Lexer over a single expression body
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire input; the last token is always [`Token::Eof`].
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let Some(&(pos, ch)) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        self.position = pos;

        match ch {
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '%' => self.single(Token::Percent),
            ',' => self.single(Token::Comma),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '*' => Ok(self.one_or_two('*', Token::Star, Token::StarStar)),
            '/' => Ok(self.one_or_two('/', Token::Slash, Token::SlashSlash)),
            '<' => Ok(self.one_or_two('=', Token::Lt, Token::Le)),
            '>' => Ok(self.one_or_two('=', Token::Gt, Token::Ge)),
            '!' => Ok(self.one_or_two('=', Token::Not, Token::Ne)),
            '=' => self.pair('=', Token::Eq, "expected '==' operator"),
            '&' => self.pair('&', Token::And, "expected '&&' operator"),
            '|' => self.pair('|', Token::Or, "expected '||' operator"),

            '\'' | '"' => self.read_string(ch),

            '0'..='9' | '.' => self.read_number(),

            'a'..='z' | 'A'..='Z' | '_' => Ok(self.read_identifier()),

            _ => Err(self.error(format!("unexpected character: '{}'", ch))),
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn error(&self, message: String) -> LexError {
        LexError {
            message,
            position: self.position,
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    fn one_or_two(&mut self, second: char, one: Token, two: Token) -> Token {
        self.advance();
        if self.peek_char() == Some(second) {
            self.advance();
            two
        } else {
            one
        }
    }

    fn pair(&mut self, second: char, token: Token, message: &str) -> Result<Token, LexError> {
        self.advance();
        if self.peek_char() == Some(second) {
            self.advance();
            Ok(token)
        } else {
            Err(self.error(message.to_string()))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => return Ok(Token::String(value)),
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                Some((_, c)) => value.push(c),
                None => break,
            }
        }

        Err(self.error("unterminated string literal".to_string()))
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let mut is_float = false;

        self.eat_digits();
        if self.peek_char() == Some('.') {
            is_float = true;
            self.advance();
            self.eat_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance();
            }
            if !matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                return Err(self.error("malformed exponent in number".to_string()));
            }
            self.eat_digits();
        }

        let end = self.chars.peek().map(|&(i, _)| i).unwrap_or(self.input.len());
        let text = &self.input[start..end];

        if text == "." {
            return Err(self.error("unexpected character: '.'".to_string()));
        }

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Token::Int(n));
            }
        }
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| self.error(format!("invalid number: {}", text)))
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let end = self.chars.peek().map(|&(i, _)| i).unwrap_or(self.input.len());

        match &self.input[start..end] {
            "true" | "True" => Token::True,
            "false" | "False" => Token::False,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            ident => Token::Identifier(ident.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_arithmetic_tokens() {
        assert_eq!(
            tokens("1 + 2.5 * x"),
            vec![
                Token::Int(1),
                Token::Plus,
                Token::Float(2.5),
                Token::Star,
                Token::Identifier("x".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_two_character_operators() {
        assert_eq!(
            tokens("** // <= >= == != && ||"),
            vec![
                Token::StarStar,
                Token::SlashSlash,
                Token::Le,
                Token::Ge,
                Token::Eq,
                Token::Ne,
                Token::And,
                Token::Or,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(tokens("1e-7")[0], Token::Float(1e-7));
        assert_eq!(tokens("2.")[0], Token::Float(2.0));
        assert_eq!(tokens(".5")[0], Token::Float(0.5));
        assert_eq!(tokens("3E+2")[0], Token::Float(300.0));
        assert_eq!(tokens("42")[0], Token::Int(42));
        assert_eq!(tokens("99999999999999999999")[0], Token::Float(1e20));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens("not True and false or x"),
            vec![
                Token::Not,
                Token::True,
                Token::And,
                Token::False,
                Token::Or,
                Token::Identifier("x".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(tokens("'abc'")[0], Token::String("abc".to_string()));
        assert_eq!(tokens("\"a'b\"")[0], Token::String("a'b".to_string()));
        assert_eq!(tokens(r"'a\'b'")[0], Token::String("a'b".to_string()));
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("1 = 2").tokenize().is_err());
        assert!(Lexer::new("1e").tokenize().is_err());
        assert!(Lexer::new("a ; b").tokenize().is_err());
        assert!(Lexer::new(".").tokenize().is_err());

        let err = Lexer::new("1 + $").tokenize().unwrap_err();
        assert_eq!(err.position, 4);
    }
}
