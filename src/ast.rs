use crate::token::{Token, TokenKind, TokenList};
use std::collections::HashMap;
use std::fmt::{self, Display};

/// 选择器：按选择器语义解读的词法单元序列，内部空白即组合符，必须保留。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tokens: TokenList,
}

impl Selector {
    pub fn new(tokens: TokenList) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenList {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn position(&self) -> usize {
        self.tokens.position_or(0)
    }

    /// 第一个 `(` 之前的部分（去掉尾部空白），即 mixin 的匹配键。
    pub fn mixin_key(&self) -> TokenList {
        let mut key: TokenList = self
            .tokens
            .iter()
            .take_while(|t| t.kind != TokenKind::ParenOpen)
            .cloned()
            .collect::<Vec<_>>()
            .into();
        while key.back().map_or(false, Token::is_whitespace) {
            key.pop();
        }
        key
    }

    /// 以 `)` 结尾且键是类/ID 选择器时，才是参数化 mixin 定义。
    /// `li:nth-child(2n+1)`、`.a:not(.b)` 这类伪类选择器仍是普通规则。
    pub fn is_parametric(&self) -> bool {
        if !self.tokens.back().map_or(false, |t| t.is(TokenKind::ParenClose)) {
            return false;
        }
        is_mixin_key(&self.mixin_key())
    }

    /// 以 `.` 或 `#id` 开头的语句才可能是 mixin 调用。
    pub fn looks_like_mixin_call(&self) -> bool {
        match self.tokens.front() {
            Some(token) => token.is_char('.') || token.is(TokenKind::Hash),
            None => false,
        }
    }

    /// 把外层选择器组合到当前选择器之前。
    ///
    /// 两侧都按顶层逗号拆分后做笛卡尔组合；子选择器含 `&` 时用父选择器替换 `&`，
    /// 否则以一个空白（后代组合符）连接，子选择器自带的 `>`、`+`、`~` 原样保留。
    pub fn add_prefix(&mut self, parent: &Selector) {
        if parent.is_empty() {
            return;
        }
        let position = self.position();
        let parents = parent.tokens.split_commas();
        let children = self.tokens.split_commas();

        let mut combined = Vec::with_capacity(parents.len() * children.len());
        for prefix in &parents {
            for child in &children {
                if child.iter().any(|t| t.is_char('&')) {
                    let mut replaced = TokenList::new();
                    for token in child {
                        if token.is_char('&') {
                            replaced.extend(prefix.clone());
                        } else {
                            replaced.push(token.clone());
                        }
                    }
                    combined.push(replaced);
                } else {
                    let mut nested = child.clone();
                    nested.unshift(Token::whitespace(position));
                    nested.prepend(prefix);
                    combined.push(nested);
                }
            }
        }

        self.tokens = TokenList::join(
            combined,
            &[
                Token::new(TokenKind::Other, ",", position),
                Token::whitespace(position),
            ],
        );
    }
}

fn is_mixin_key(key: &TokenList) -> bool {
    if key.iter().any(|t| t.is(TokenKind::Colon)) {
        return false;
    }
    let tokens = key.as_slice();
    match tokens {
        [.., last] if last.is(TokenKind::Hash) => true,
        [.., dot, last] => dot.is_char('.') && last.is(TokenKind::Identifier),
        _ => false,
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.tokens, f)
    }
}

/// `property: value` 对。被多个 mixin 展开复用时整体克隆，各自持有独立的词法单元。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: TokenList,
}

impl Declaration {
    pub fn new<S: Into<String>>(property: S, value: TokenList) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruleset {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
}

impl Ruleset {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            declarations: Vec::new(),
        }
    }

    pub fn add_declaration(&mut self, declaration: Declaration) {
        self.declarations.push(declaration);
    }

    /// 在指定位置插入一组声明，保持它们原有的先后顺序。
    pub fn insert_declarations(&mut self, at: usize, declarations: Vec<Declaration>) {
        let at = at.min(self.declarations.len());
        self.declarations.splice(at..at, declarations);
    }
}

/// `@` 规则。前导部分与块内容都以原始词法单元保存，输出时原样回写。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    /// 含 `@` 前缀，例如 `@media`。
    pub keyword: String,
    pub prelude: TokenList,
    /// 包括首尾花括号；以 `;` 结束的规则为 `None`。
    pub block: Option<TokenList>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Ruleset(Ruleset),
    AtRule(AtRule),
}

/// 样式表根节点，并维护“选择器 → 规则集”的索引供 mixin 查找。
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    statements: Vec<Statement>,
    selector_index: HashMap<String, usize>,
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// 追加规则集并返回其语句下标。同一选择器只索引第一次出现的规则集。
    pub fn add_ruleset(&mut self, ruleset: Ruleset) -> usize {
        let index = self.statements.len();
        if !ruleset.selector.is_empty() {
            self.selector_index
                .entry(ruleset.selector.to_string())
                .or_insert(index);
        }
        self.statements.push(Statement::Ruleset(ruleset));
        index
    }

    pub fn add_at_rule(&mut self, at_rule: AtRule) {
        self.statements.push(Statement::AtRule(at_rule));
    }

    pub fn ruleset(&self, index: usize) -> Option<&Ruleset> {
        match self.statements.get(index) {
            Some(Statement::Ruleset(ruleset)) => Some(ruleset),
            _ => None,
        }
    }

    pub fn ruleset_mut(&mut self, index: usize) -> Option<&mut Ruleset> {
        match self.statements.get_mut(index) {
            Some(Statement::Ruleset(ruleset)) => Some(ruleset),
            _ => None,
        }
    }

    /// 按选择器查找规则集（比较时空白已归一）。
    pub fn get_ruleset(&self, selector: &Selector) -> Option<&Ruleset> {
        self.ruleset(self.ruleset_index(selector)?)
    }

    pub fn ruleset_index(&self, selector: &Selector) -> Option<usize> {
        self.selector_index.get(&selector.to_string()).copied()
    }

    /// 去掉没有任何声明的规则集（例如只包含嵌套规则的外层），并重建选择器索引。
    pub fn drop_empty_rulesets(&mut self) {
        self.statements.retain(|statement| match statement {
            Statement::Ruleset(ruleset) => !ruleset.declarations.is_empty(),
            Statement::AtRule(_) => true,
        });
        self.selector_index.clear();
        for (index, statement) in self.statements.iter().enumerate() {
            if let Statement::Ruleset(ruleset) = statement {
                if !ruleset.selector.is_empty() {
                    self.selector_index
                        .entry(ruleset.selector.to_string())
                        .or_insert(index);
                }
            }
        }
    }

    pub fn rulesets(&self) -> impl Iterator<Item = &Ruleset> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::Ruleset(ruleset) => Some(ruleset),
            Statement::AtRule(_) => None,
        })
    }

    pub fn at_rules(&self) -> impl Iterator<Item = &AtRule> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::AtRule(at_rule) => Some(at_rule),
            Statement::Ruleset(_) => None,
        })
    }
}

impl PartialEq for Stylesheet {
    fn eq(&self, other: &Self) -> bool {
        self.statements == other.statements
    }
}

impl Eq for Stylesheet {}
