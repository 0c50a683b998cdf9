// SQL Lexer - splits query text into the word tokens the clause grammar consumes
use crate::error::{Error, Result};

/// Tokenizer for the reduced SQL surface.
///
/// Produces plain string tokens: keywords and identifiers as written
/// (qualified names such as `o.cust` stay one token), operators
/// (`=`, `!=`, `<>`, `,`), numbers, and string literals with their quotes
/// kept so that a literal never matches a keyword. `[name]` yields `name`.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut seen_dot = false;

        if self.current_char == Some('-') {
            num.push('-');
            self.advance();
        }

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                num.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
                seen_dot = true;
                num.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        num
    }

    /// Quoted literal; a doubled quote inside stands for one quote.
    fn read_string(&mut self, quote: char) -> Result<String> {
        let start = self.position;
        let mut literal = String::new();
        literal.push(quote);
        self.advance();

        loop {
            match self.current_char {
                None => {
                    let text: String = self.input[start..].iter().collect();
                    return Err(Error::syntax(text));
                }
                Some(ch) if ch == quote => {
                    if self.peek(1) == Some(quote) {
                        literal.push(quote);
                        literal.push(quote);
                        self.advance();
                        self.advance();
                    } else {
                        literal.push(quote);
                        self.advance();
                        return Ok(literal);
                    }
                }
                Some(ch) => {
                    literal.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_bracketed(&mut self) -> Result<String> {
        let start = self.position;
        let mut ident = String::new();
        self.advance();

        while let Some(ch) = self.current_char {
            if ch == ']' {
                self.advance();
                return Ok(ident);
            }
            ident.push(ch);
            self.advance();
        }

        let text: String = self.input[start..].iter().collect();
        Err(Error::syntax(text))
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        word
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<String>> {
        self.skip_whitespace();

        let ch = match self.current_char {
            None => return Ok(None),
            Some(ch) => ch,
        };

        let token = match ch {
            '=' | ',' | '*' | '(' | ')' | ';' => {
                self.advance();
                ch.to_string()
            }
            '!' if self.peek(1) == Some('=') => {
                self.advance();
                self.advance();
                "!=".to_string()
            }
            '<' if self.peek(1) == Some('>') => {
                self.advance();
                self.advance();
                "<>".to_string()
            }
            '\'' | '"' => self.read_string(ch)?,
            '[' => self.read_bracketed()?,
            '-' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            _ if ch.is_ascii_digit() => self.read_number(),
            _ if ch.is_alphanumeric() || ch == '_' => self.read_word(),
            _ => return Err(Error::syntax(ch.to_string())),
        };

        Ok(Some(token))
    }

    pub fn tokenize(&mut self) -> Result<Vec<String>> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }
}

/// Whether a token is a quoted string literal.
pub fn is_string_literal(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), token.chars().last()) {
        (Some(first), Some(last)) => {
            token.len() >= 2 && (first == '\'' || first == '"') && first == last
        }
        _ => false,
    }
}

/// Strip the quotes from a literal token and collapse doubled quotes.
pub fn unquote(token: &str) -> String {
    if !is_string_literal(token) {
        return token.to_string();
    }
    let quote = &token[..1];
    token[1..token.len() - 1].replace(&quote.repeat(2), quote)
}

/// Whether a token is a numeric literal.
pub fn is_number(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty()
        && digits.chars().next().is_some_and(|c| c.is_ascii_digit())
        && digits.parse::<f64>().is_ok()
}
