use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    /// Byte offset of the token in the expression source.
    pub offset: usize,
}

/// Longest first, so `===` wins over `==` and `=`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "!", "<", ">", "+", "-", "*", "/", "%",
    "?", ":", "(", ")", "[", "]", "{", "}", ",", ".",
];

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Tokenize the whole source. The last token is always [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let offset = self.pos;
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(Spanned { token, offset });
            if done {
                return Ok(tokens);
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.pos)
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let Some(c) = self.peek() else { return Ok(Token::Eof) };

        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            return self.number();
        }
        if c == '"' || c == '\'' {
            return self.string(c);
        }
        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
                self.bump();
            }
            return Ok(Token::Ident(self.src[start..self.pos].to_string()));
        }
        if let Some(p) = PUNCTUATION.iter().find(|p| self.rest().starts_with(**p)) {
            self.pos += p.len();
            return Ok(Token::Punct(*p));
        }
        if c == '=' {
            return Err(self.error("assignment is not supported"));
        }
        Err(self.error(format!("unexpected character `{c}`")))
    }

    fn number(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        let rest = self.rest();
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.src[start + 2..self.pos];
            return u64::from_str_radix(digits, 16)
                .map(|n| Token::Number(n as f64))
                .map_err(|_| SyntaxError::new("malformed hex literal", start));
        }

        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && matches!(self.src[..self.pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(self.error("identifier directly after number"));
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| SyntaxError::new(format!("malformed number `{text}`"), start))
    }

    fn string(&mut self, quote: char) -> Result<Token, SyntaxError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxError::new("unterminated string literal", start));
            };
            match c {
                c if c == quote => return Ok(Token::Str(value)),
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(SyntaxError::new("unterminated string literal", start));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        'u' => value.push(self.unicode_escape()?),
                        other => value.push(other),
                    }
                }
                c => value.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, SyntaxError> {
        let start = self.pos;
        let hex: String = self.rest().chars().take(4).collect();
        if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SyntaxError::new("malformed \\u escape", start));
        }
        self.pos += 4;
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::new("invalid unicode scalar in \\u escape", start))
    }
}
