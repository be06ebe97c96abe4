use std::fmt::{self, Display};

/// 词法单元的分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    AtKeyword,
    String,
    Number,
    Percentage,
    Dimension,
    Url,
    Hash,
    UnicodeRange,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    Colon,
    /// `;`
    Delimiter,
    /// `{`
    BlockOpen,
    /// `}`
    BlockClose,
    ParenOpen,
    ParenClose,
    /// `[`
    SquareOpen,
    /// `]`
    SquareClose,
    Whitespace,
    Comment,
    /// 其余单个字符，例如 `,` `.` `>` `&`。
    Other,
    Eof,
}

/// 带类型与原文的词法单元，生成后不再修改。
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 源码中的字节偏移。
    pub position: usize,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, text: S, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn whitespace(position: usize) -> Self {
        Self::new(TokenKind::Whitespace, " ", position)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// 判断是否为指定字符的 `Other` 单元。
    pub fn is_char(&self, ch: char) -> bool {
        self.kind == TokenKind::Other && self.text.len() == ch.len_utf8() && self.text.starts_with(ch)
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    /// 顶层参数分隔符：`,` 或 `;`。
    pub fn is_separator(&self) -> bool {
        self.kind == TokenKind::Delimiter || self.is_char(',')
    }
}

/// 比较时忽略位置，且所有空白视为相同。
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && (self.kind == TokenKind::Whitespace || self.text == other.text)
    }
}

impl Eq for Token {}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Whitespace {
            f.write_str(" ")
        } else {
            f.write_str(&self.text)
        }
    }
}

/// 有序、可变的词法单元序列，由持有它的 AST 节点独占。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    tokens: Vec<Token>,
}

impl TokenList {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// 在最前面插入。
    pub fn unshift(&mut self, token: Token) {
        self.tokens.insert(0, token);
    }

    /// 移除并返回第一个单元。
    pub fn shift(&mut self) -> Option<Token> {
        if self.tokens.is_empty() {
            None
        } else {
            Some(self.tokens.remove(0))
        }
    }

    /// 移除并返回最后一个单元。
    pub fn pop(&mut self) -> Option<Token> {
        self.tokens.pop()
    }

    pub fn extend(&mut self, other: TokenList) {
        self.tokens.extend(other.tokens);
    }

    /// 把另一个列表整体插入到最前面。
    pub fn prepend(&mut self, prefix: &TokenList) {
        let mut tokens = prefix.tokens.clone();
        tokens.append(&mut self.tokens);
        self.tokens = tokens;
    }

    pub fn front(&self) -> Option<&Token> {
        self.tokens.first()
    }

    pub fn back(&self) -> Option<&Token> {
        self.tokens.last()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.tokens
    }

    /// 去掉首尾的空白单元。
    pub fn trim(&mut self) {
        while self.back().map_or(false, Token::is_whitespace) {
            self.tokens.pop();
        }
        let leading = self.tokens.iter().take_while(|t| t.is_whitespace()).count();
        self.tokens.drain(..leading);
    }

    pub fn trimmed(mut self) -> Self {
        self.trim();
        self
    }

    /// 第一个有效单元的位置，列表为空时返回 `fallback`。
    pub fn position_or(&self, fallback: usize) -> usize {
        self.front().map_or(fallback, |t| t.position)
    }

    /// 按顶层分隔符切分：只要出现顶层 `;` 就只按 `;` 切分，否则按 `,`。
    /// 括号内的分隔符不会切分。每段首尾空白已去除。
    pub fn split_top_level(&self) -> Vec<TokenList> {
        let by_semicolon = !self
            .top_level_positions(|t| t.kind == TokenKind::Delimiter)
            .is_empty();
        let split_on = |t: &Token| {
            if by_semicolon {
                t.kind == TokenKind::Delimiter
            } else {
                t.is_char(',')
            }
        };

        let mut parts = Vec::new();
        let mut current = TokenList::new();
        let mut depth = 0usize;
        for token in &self.tokens {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::SquareOpen | TokenKind::BlockOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::SquareClose | TokenKind::BlockClose => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            if depth == 0 && split_on(token) {
                parts.push(std::mem::take(&mut current).trimmed());
                continue;
            }
            current.push(token.clone());
        }
        parts.push(current.trimmed());
        parts
    }

    /// 仅按顶层逗号切分，用于选择器列表。
    pub fn split_commas(&self) -> Vec<TokenList> {
        let mut parts = Vec::new();
        let mut current = TokenList::new();
        let mut depth = 0usize;
        for token in &self.tokens {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::SquareOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::SquareClose => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth == 0 && token.is_char(',') {
                parts.push(std::mem::take(&mut current).trimmed());
                continue;
            }
            current.push(token.clone());
        }
        parts.push(current.trimmed());
        parts
    }

    fn top_level_positions<F: Fn(&Token) -> bool>(&self, pred: F) -> Vec<usize> {
        let mut depth = 0usize;
        let mut found = Vec::new();
        for (idx, token) in self.tokens.iter().enumerate() {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::SquareOpen | TokenKind::BlockOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::SquareClose | TokenKind::BlockClose => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            if depth == 0 && pred(token) {
                found.push(idx);
            }
        }
        found
    }

    /// 用给定的分隔单元连接多个列表。
    pub fn join(parts: Vec<TokenList>, separator: &[Token]) -> TokenList {
        let mut joined = TokenList::new();
        for (idx, part) in parts.into_iter().enumerate() {
            if idx > 0 {
                joined.tokens.extend(separator.iter().cloned());
            }
            joined.extend(part);
        }
        joined
    }
}

impl From<Vec<Token>> for TokenList {
    fn from(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }
}

impl IntoIterator for TokenList {
    type Item = Token;
    type IntoIter = std::vec::IntoIter<Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

impl<'a> IntoIterator for &'a TokenList {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

impl Display for TokenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            Display::fmt(token, f)?;
        }
        Ok(())
    }
}
