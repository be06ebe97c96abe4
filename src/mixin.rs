use crate::ast::{Declaration, Selector};
use crate::error::{LessError, LessResult};
use crate::guard::Guard;
use crate::token::{Token, TokenKind, TokenList};
use crate::value::ValueProcessor;

/// mixin 定义中的形参。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixinParam {
    /// `@name` 或 `@name: default`
    Variable {
        name: String,
        default: Option<TokenList>,
    },
    /// 字面量模式，实参必须与之相同才匹配，例如 `.m(dark; @c)` 中的 `dark`。
    Literal(TokenList),
    /// `...` 或 `@rest...`，吞掉剩余的位置实参。
    Rest(Option<String>),
}

/// 形参与实参配对后的结果，顺序与形参一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundParam {
    Value { name: String, value: TokenList },
    /// 未提供实参，使用默认值；默认值在绑定时才求值，可以引用前面的形参。
    Default { name: String, default: TokenList },
    Literal(TokenList),
    Rest {
        name: Option<String>,
        values: Vec<TokenList>,
    },
}

/// 参数化 mixin 定义体中的一项，按书写顺序保存。
#[derive(Debug, Clone)]
pub enum BodyItem {
    Declaration(Declaration),
    /// 定义体内的 mixin 调用。实参可能引用形参，到外层展开时才解析。
    Call(MixinCall),
}

/// 选择器以形参列表结尾的规则集，可被当作 mixin 调用。
#[derive(Debug, Clone)]
pub struct ParameterRuleset {
    pub selector: Selector,
    body: Vec<BodyItem>,
    key: TokenList,
    params: Vec<MixinParam>,
    guard: Option<Guard>,
}

impl ParameterRuleset {
    /// 从形如 `.m(@a; @b: 2) when (@a > 0)` 的选择器解析出键、形参与守卫。
    pub fn from_selector(selector: Selector) -> LessResult<Self> {
        let key = selector.mixin_key();
        let tokens = selector.tokens().as_slice();
        let (inner, after) = split_parenthesized(tokens).ok_or_else(|| {
            LessError::unterminated("mixin 形参列表", ")", selector.position())
        })?;

        let params = parse_params(&inner)?;
        let rest = TokenList::from(after.to_vec()).trimmed();
        let guard = if rest.is_empty() {
            None
        } else {
            let mut rest = rest;
            match rest.shift() {
                Some(token)
                    if token.is(TokenKind::Identifier) && token.text.eq_ignore_ascii_case("when") =>
                {
                    Some(Guard::parse(&rest.trimmed())?)
                }
                Some(token) => {
                    return Err(LessError::syntax(
                        token.text,
                        "'when' 守卫或 '{'",
                        token.position,
                    ))
                }
                None => None,
            }
        };

        Ok(Self {
            selector,
            body: Vec::new(),
            key,
            params,
            guard,
        })
    }

    pub fn key(&self) -> &TokenList {
        &self.key
    }

    pub fn params(&self) -> &[MixinParam] {
        &self.params
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    pub fn body(&self) -> &[BodyItem] {
        &self.body
    }

    pub fn add_declaration(&mut self, declaration: Declaration) {
        self.body.push(BodyItem::Declaration(declaration));
    }

    pub fn add_call(&mut self, call: MixinCall) {
        self.body.push(BodyItem::Call(call));
    }

    /// 定义体解析期间需要放置占位的变量名，包括隐式的 `arguments`。
    pub fn keywords(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .params
            .iter()
            .filter_map(|param| match param {
                MixinParam::Variable { name, .. } => Some(name.clone()),
                MixinParam::Rest(name) => name.clone(),
                MixinParam::Literal(_) => None,
            })
            .collect();
        names.push("arguments".to_string());
        names
    }

    /// 尝试把实参与形参配对。个数不符、具名实参不存在或字面量不相等时返回 `None`。
    pub fn match_arguments(&self, arguments: &[Argument]) -> Option<Vec<BoundParam>> {
        let mut named = Vec::new();
        let mut positional = Vec::new();
        for argument in arguments {
            match &argument.name {
                Some(name) => named.push((name.as_str(), &argument.value)),
                None => positional.push(&argument.value),
            }
        }
        for (name, _) in &named {
            let known = self.params.iter().any(|param| {
                matches!(param, MixinParam::Variable { name: candidate, .. } if candidate == name)
            });
            if !known {
                return None;
            }
        }

        let mut positional = positional.into_iter();
        let mut bound = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match param {
                MixinParam::Variable { name, default } => {
                    let supplied = named
                        .iter()
                        .find(|(candidate, _)| candidate == name)
                        .map(|(_, value)| *value)
                        .or_else(|| positional.next());
                    match (supplied, default) {
                        (Some(value), _) => bound.push(BoundParam::Value {
                            name: name.clone(),
                            value: value.clone(),
                        }),
                        (None, Some(default)) => bound.push(BoundParam::Default {
                            name: name.clone(),
                            default: default.clone(),
                        }),
                        (None, None) => return None,
                    }
                }
                MixinParam::Literal(expected) => match positional.next() {
                    Some(value) if value == expected => {
                        bound.push(BoundParam::Literal(value.clone()))
                    }
                    _ => return None,
                },
                MixinParam::Rest(name) => bound.push(BoundParam::Rest {
                    name: name.clone(),
                    values: positional.by_ref().cloned().collect(),
                }),
            }
        }
        if positional.next().is_some() {
            return None;
        }
        Some(bound)
    }
}

/// 一个调用实参；具名实参形如 `@color: red`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: TokenList,
}

/// 规则集内出现、后面没有 `{` 的选择器被重新解释为 mixin 调用。
#[derive(Debug, Clone)]
pub struct MixinCall {
    pub selector: Selector,
    pub key: TokenList,
    pub arguments: Vec<Argument>,
    pub has_parens: bool,
}

impl MixinCall {
    /// 右括号之后还有其它内容时不是调用，返回 `None`。
    pub fn from_selector(selector: &Selector) -> Option<Self> {
        let tokens = selector.tokens().as_slice();
        if !tokens.iter().any(|t| t.is(TokenKind::ParenOpen)) {
            return Some(Self {
                selector: selector.clone(),
                key: selector.tokens().clone().trimmed(),
                arguments: Vec::new(),
                has_parens: false,
            });
        }

        let (inner, after) = split_parenthesized(tokens)?;
        if after.iter().any(|t| !t.is_whitespace()) {
            return None;
        }
        let arguments = split_list(&inner)
            .into_iter()
            .map(|segment| match named_segment(&segment) {
                Some((name, value)) => Argument {
                    name: Some(name),
                    value,
                },
                None => Argument {
                    name: None,
                    value: segment,
                },
            })
            .collect();

        Some(Self {
            selector: selector.clone(),
            key: selector.mixin_key(),
            arguments,
            has_parens: true,
        })
    }

    /// 对每个实参做变量替换，之后才与定义比较。
    pub fn process_arguments(&mut self, processor: &ValueProcessor<'_>) -> LessResult<()> {
        for argument in &mut self.arguments {
            argument.value = processor.process(&argument.value)?.trimmed();
        }
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.selector.position()
    }
}

/// 当前编译中全部参数化规则集，按定义顺序保存。
#[derive(Debug, Default)]
pub struct MixinRegistry {
    rulesets: Vec<ParameterRuleset>,
}

impl MixinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ruleset: ParameterRuleset) -> usize {
        self.rulesets.push(ruleset);
        self.rulesets.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&ParameterRuleset> {
        self.rulesets.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ParameterRuleset> {
        self.rulesets.get_mut(index)
    }

    /// 键相同的全部定义（重载），按定义顺序返回下标。
    pub fn candidates(&self, key: &TokenList) -> Vec<usize> {
        self.rulesets
            .iter()
            .enumerate()
            .filter(|(_, ruleset)| &ruleset.key == key)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// 拆出第一对括号：返回括号内的单元与右括号之后的单元。
fn split_parenthesized(tokens: &[Token]) -> Option<(TokenList, &[Token])> {
    let open = tokens.iter().position(|t| t.is(TokenKind::ParenOpen))?;
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => {
                depth -= 1;
                if depth == 0 {
                    let inner = TokenList::from(tokens[open + 1..idx].to_vec());
                    return Some((inner, &tokens[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// `()` 视为没有参数，而不是一个空参数。
fn split_list(inner: &TokenList) -> Vec<TokenList> {
    let parts = inner.split_top_level();
    if parts.len() == 1 && parts[0].is_empty() {
        Vec::new()
    } else {
        parts
    }
}

/// `@name: value` 形式时返回 (名称, 值)。
fn named_segment(segment: &TokenList) -> Option<(String, TokenList)> {
    let tokens = segment.as_slice();
    let first = tokens.first()?;
    if !first.is(TokenKind::AtKeyword) {
        return None;
    }
    let colon = tokens.iter().skip(1).position(|t| !t.is_whitespace())? + 1;
    if !tokens[colon].is(TokenKind::Colon) {
        return None;
    }
    let value = TokenList::from(tokens[colon + 1..].to_vec()).trimmed();
    Some((first.text[1..].to_string(), value))
}

fn is_ellipsis(tokens: &[Token]) -> bool {
    tokens.len() == 3 && tokens.iter().all(|t| t.is_char('.'))
}

fn parse_params(inner: &TokenList) -> LessResult<Vec<MixinParam>> {
    let segments = split_list(inner);
    let count = segments.len();
    let mut params = Vec::with_capacity(count);
    for (idx, segment) in segments.into_iter().enumerate() {
        let position = segment.position_or(inner.position_or(0));
        let tokens = segment.as_slice();
        let param = if segment.is_empty() {
            return Err(LessError::syntax(",", "mixin 形参", position));
        } else if let Some((name, default)) = named_segment(&segment) {
            if default.is_empty() {
                return Err(LessError::syntax(":", "形参默认值", position));
            }
            MixinParam::Variable {
                name,
                default: Some(default),
            }
        } else if tokens[0].is(TokenKind::AtKeyword) && tokens.len() == 1 {
            MixinParam::Variable {
                name: tokens[0].text[1..].to_string(),
                default: None,
            }
        } else if tokens[0].is(TokenKind::AtKeyword) && is_ellipsis(&tokens[1..]) {
            MixinParam::Rest(Some(tokens[0].text[1..].to_string()))
        } else if is_ellipsis(tokens) {
            MixinParam::Rest(None)
        } else {
            MixinParam::Literal(segment)
        };
        if matches!(param, MixinParam::Rest(_)) && idx + 1 != count {
            return Err(LessError::syntax("...", "位于最后的可变形参", position));
        }
        params.push(param);
    }
    Ok(params)
}
