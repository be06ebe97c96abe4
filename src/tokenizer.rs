use crate::error::{LessError, LessResult};
use crate::token::{Token, TokenKind};

/// 按需产出词法单元的扫描器，每次调用 [`Tokenizer::next_token`] 只读取一个单元。
pub struct Tokenizer<'a> {
    source: &'a str,
    position: usize,
    line_comments: bool,
}

impl<'a> Tokenizer<'a> {
    /// `line_comments` 为真时把 `//` 到行尾视为注释（LESS 扩展）。
    pub fn new(source: &'a str, line_comments: bool) -> Self {
        Self {
            source,
            position: 0,
            line_comments,
        }
    }

    /// 一次性读完全部单元（不含结尾的 `Eof`）。
    pub fn tokenize(mut self) -> LessResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.kind == TokenKind::Eof {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    pub fn next_token(&mut self) -> LessResult<Token> {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, "", start));
        };

        let kind = match ch {
            c if c.is_whitespace() => {
                self.skip_whitespace();
                TokenKind::Whitespace
            }
            '/' if self.rest().starts_with("/*") => {
                self.position += 2;
                match self.rest().find("*/") {
                    Some(end) => self.position += end + 2,
                    None => return Err(LessError::unterminated("注释", "*/", start)),
                }
                TokenKind::Comment
            }
            '/' if self.line_comments && self.rest().starts_with("//") => {
                while let Some(next) = self.peek_char() {
                    if next == '\n' {
                        break;
                    }
                    self.advance_char();
                }
                TokenKind::Comment
            }
            '"' | '\'' => {
                self.read_string(ch, start)?;
                TokenKind::String
            }
            '@' => {
                self.advance_char();
                if self.at_name_start() {
                    self.read_name();
                    TokenKind::AtKeyword
                } else {
                    TokenKind::Other
                }
            }
            '#' => {
                self.advance_char();
                if self.peek_char().map_or(false, is_name_char) {
                    self.read_name();
                    TokenKind::Hash
                } else {
                    TokenKind::Other
                }
            }
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Delimiter),
            '{' => self.single(TokenKind::BlockOpen),
            '}' => self.single(TokenKind::BlockClose),
            '(' => self.single(TokenKind::ParenOpen),
            ')' => self.single(TokenKind::ParenClose),
            '[' => self.single(TokenKind::SquareOpen),
            ']' => self.single(TokenKind::SquareClose),
            '~' if self.rest().starts_with("~=") => {
                self.position += 2;
                TokenKind::Includes
            }
            '|' if self.rest().starts_with("|=") => {
                self.position += 2;
                TokenKind::DashMatch
            }
            'u' | 'U' if self.at_unicode_range() => {
                self.read_unicode_range();
                TokenKind::UnicodeRange
            }
            _ if self.at_number_start() => self.read_number(),
            _ if self.at_name_start() => {
                let name = self.read_name();
                if name.eq_ignore_ascii_case("url") && self.peek_char() == Some('(') {
                    if self.read_url(start)? {
                        TokenKind::Url
                    } else {
                        TokenKind::Identifier
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            _ => self.single(TokenKind::Other),
        };

        Ok(Token::new(kind, &self.source[start..self.position], start))
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance_char();
        kind
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, quote: char, start: usize) -> LessResult<()> {
        self.advance_char();
        while let Some(ch) = self.advance_char() {
            match ch {
                '\\' => {
                    self.advance_char();
                }
                '\n' => return Err(LessError::unterminated("字符串", quote_str(quote), start)),
                c if c == quote => return Ok(()),
                _ => {}
            }
        }
        Err(LessError::unterminated("字符串", quote_str(quote), start))
    }

    /// 名称起始：字母、下划线、非 ASCII、转义，或 `-` 后跟上述字符。
    fn at_name_start(&self) -> bool {
        match self.peek_char() {
            Some('-') => match self.peek_nth(1) {
                Some('-') => true,
                Some(next) => is_name_start(next),
                None => false,
            },
            Some(ch) => is_name_start(ch),
            None => false,
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if ch == '\\' {
                self.advance_char();
                self.advance_char();
            } else if is_name_char(ch) {
                self.advance_char();
            } else {
                break;
            }
        }
        &self.source[start..self.position]
    }

    fn at_number_start(&self) -> bool {
        let digit_at = |n: usize| self.peek_nth(n).map_or(false, |c| c.is_ascii_digit());
        match self.peek_char() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => digit_at(1),
            Some('-') | Some('+') => digit_at(1) || (self.peek_nth(1) == Some('.') && digit_at(2)),
            _ => false,
        }
    }

    fn read_number(&mut self) -> TokenKind {
        if matches!(self.peek_char(), Some('-') | Some('+')) {
            self.advance_char();
        }
        self.read_digits();
        if self.peek_char() == Some('.') && self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) {
            self.advance_char();
            self.read_digits();
        }
        if self.peek_char() == Some('%') {
            self.advance_char();
            return TokenKind::Percentage;
        }
        if self.at_name_start() {
            self.read_name();
            return TokenKind::Dimension;
        }
        TokenKind::Number
    }

    fn read_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance_char();
        }
    }

    fn at_unicode_range(&self) -> bool {
        self.peek_nth(1) == Some('+')
            && self
                .peek_nth(2)
                .map_or(false, |c| c.is_ascii_hexdigit() || c == '?')
    }

    fn read_unicode_range(&mut self) {
        self.position += 2;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_hexdigit() || c == '?' || c == '-')
        {
            self.advance_char();
        }
    }

    /// 读取不带引号的 `url(...)`，返回 `false` 表示参数带引号，按普通函数处理。
    fn read_url(&mut self, start: usize) -> LessResult<bool> {
        let mut lookahead = self.position + 1;
        for ch in self.source[lookahead..].chars() {
            if ch.is_whitespace() {
                lookahead += ch.len_utf8();
            } else {
                break;
            }
        }
        if matches!(self.source[lookahead..].chars().next(), Some('"') | Some('\'')) {
            return Ok(false);
        }
        match self.rest().find(')') {
            Some(end) => {
                self.position += end + 1;
                Ok(true)
            }
            None => Err(LessError::unterminated("url", ")", start)),
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '\\' || !ch.is_ascii()
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_' || ch == '\\' || !ch.is_ascii()
}

fn quote_str(quote: char) -> &'static str {
    if quote == '"' {
        "\""
    } else {
        "'"
    }
}

/// 在 [`Tokenizer`] 之上提供“查看当前单元 / 前进”接口，语法分析只需要一个单元的前瞻。
pub struct TokenStream<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str, line_comments: bool) -> LessResult<Self> {
        let mut tokenizer = Tokenizer::new(source, line_comments);
        let current = tokenizer.next_token()?;
        Ok(Self { tokenizer, current })
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn kind(&self) -> TokenKind {
        self.current.kind
    }

    pub fn position(&self) -> usize {
        self.current.position
    }

    pub fn is_eof(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    /// 当前单元用于错误信息的文本。
    pub fn found(&self) -> String {
        if self.is_eof() {
            "输入结尾".to_string()
        } else {
            self.current.text.clone()
        }
    }

    /// 前进一个单元并返回被消费的单元。
    pub fn advance(&mut self) -> LessResult<Token> {
        let next = self.tokenizer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }
}
