//! 参数化 mixin 的 `when` 守卫。
//!
//! 语法：逗号分隔的若干条件组，任一组成立即通过；组内以 `and` 连接，
//! 每个条件形如 `(lhs op rhs)`、`(value)` 或 `(isnumber(@x))`，可加 `not` 前缀。

use crate::error::{LessError, LessResult};
use crate::token::{Token, TokenKind, TokenList};
use crate::value::{unquote, ValueProcessor};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    alternatives: Vec<Vec<Condition>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    negated: bool,
    test: Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    Compare {
        lhs: TokenList,
        op: Comparison,
        rhs: TokenList,
    },
    Predicate {
        name: String,
        args: Vec<TokenList>,
    },
    Truthy(TokenList),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
}

const PREDICATES: &[&str] = &[
    "isnumber",
    "isstring",
    "iscolor",
    "iskeyword",
    "isurl",
    "ispixel",
    "ispercentage",
    "isem",
    "isunit",
];

const NAMED_COLORS: &[&str] = &[
    "black", "white", "red", "green", "blue", "yellow", "orange", "purple", "gray", "grey",
    "silver", "maroon", "navy", "teal", "olive", "lime", "aqua", "fuchsia", "transparent",
];

impl Guard {
    /// 解析 `when` 之后的词法单元。
    pub fn parse(tokens: &TokenList) -> LessResult<Guard> {
        let mut alternatives = Vec::new();
        for group in tokens.split_commas() {
            alternatives.push(Self::parse_group(&group)?);
        }
        Ok(Guard { alternatives })
    }

    fn parse_group(group: &TokenList) -> LessResult<Vec<Condition>> {
        let tokens = group.as_slice();
        let mut conditions = Vec::new();
        let mut idx = skip_ws(tokens, 0);
        loop {
            let mut negated = false;
            if let Some(token) = tokens.get(idx) {
                if is_keyword(token, "not") {
                    negated = true;
                    idx = skip_ws(tokens, idx + 1);
                }
            }
            let (inner, next) = paren_group(tokens, idx, group)?;
            conditions.push(Condition {
                negated,
                test: Test::parse(inner)?,
            });
            idx = skip_ws(tokens, next);
            match tokens.get(idx) {
                None => return Ok(conditions),
                Some(token) if is_keyword(token, "and") => idx = skip_ws(tokens, idx + 1),
                Some(token) => {
                    return Err(LessError::syntax(
                        token.text.clone(),
                        "守卫条件之间的 'and' 或 ','",
                        token.position,
                    ))
                }
            }
        }
    }

    /// 在实参已绑定的作用域中求值。
    pub fn evaluate(&self, processor: &ValueProcessor<'_>) -> LessResult<bool> {
        for group in &self.alternatives {
            let mut passed = true;
            for condition in group {
                if condition.test.evaluate(processor)? == condition.negated {
                    passed = false;
                    break;
                }
            }
            if passed {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Test {
    fn parse(inner: TokenList) -> LessResult<Test> {
        let inner = inner.trimmed();
        if inner.is_empty() {
            return Err(LessError::syntax(")", "守卫条件表达式", 0));
        }
        if let Some((start, end, op)) = find_comparison(inner.as_slice()) {
            let slice = inner.as_slice();
            let lhs = TokenList::from(slice[..start].to_vec()).trimmed();
            let rhs = TokenList::from(slice[end..].to_vec()).trimmed();
            if lhs.is_empty() || rhs.is_empty() {
                return Err(LessError::syntax(
                    slice[start].text.clone(),
                    "比较运算符两侧的值",
                    slice[start].position,
                ));
            }
            return Ok(Test::Compare { lhs, op, rhs });
        }

        if let [name, open, args @ .., close] = inner.as_slice() {
            let lowered = name.text.to_ascii_lowercase();
            if name.is(TokenKind::Identifier)
                && open.is(TokenKind::ParenOpen)
                && close.is(TokenKind::ParenClose)
                && PREDICATES.contains(&lowered.as_str())
            {
                let args = TokenList::from(args.to_vec()).split_top_level();
                return Ok(Test::Predicate {
                    name: lowered,
                    args,
                });
            }
        }
        Ok(Test::Truthy(inner))
    }

    fn evaluate(&self, processor: &ValueProcessor<'_>) -> LessResult<bool> {
        match self {
            Test::Compare { lhs, op, rhs } => {
                let lhs = processor.process(lhs)?.trimmed();
                let rhs = processor.process(rhs)?.trimmed();
                Ok(compare(&lhs, *op, &rhs))
            }
            Test::Truthy(value) => {
                let value = processor.process(value)?.trimmed();
                Ok(matches!(value.as_slice(), [single] if is_keyword(single, "true")))
            }
            Test::Predicate { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(processor.process(arg)?.trimmed());
                }
                Ok(check_predicate(name, &values))
            }
        }
    }
}

fn skip_ws(tokens: &[Token], mut idx: usize) -> usize {
    while tokens.get(idx).map_or(false, Token::is_whitespace) {
        idx += 1;
    }
    idx
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    token.is(TokenKind::Identifier) && token.text.eq_ignore_ascii_case(keyword)
}

/// 读取从 `idx` 开始的一对括号，返回括号内的单元与括号之后的下标。
fn paren_group(tokens: &[Token], idx: usize, group: &TokenList) -> LessResult<(TokenList, usize)> {
    match tokens.get(idx) {
        Some(token) if token.is(TokenKind::ParenOpen) => {}
        Some(token) => {
            return Err(LessError::syntax(
                token.text.clone(),
                "以 '(' 开始的守卫条件",
                token.position,
            ))
        }
        None => {
            return Err(LessError::syntax(
                "守卫结尾",
                "以 '(' 开始的守卫条件",
                group.position_or(0),
            ))
        }
    }
    let mut depth = 0usize;
    for (offset, token) in tokens[idx..].iter().enumerate() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => {
                depth -= 1;
                if depth == 0 {
                    let end = idx + offset;
                    let inner = TokenList::from(tokens[idx + 1..end].to_vec());
                    return Ok((inner, end + 1));
                }
            }
            _ => {}
        }
    }
    Err(LessError::unterminated("守卫条件", ")", tokens[idx].position))
}

/// 查找顶层比较运算符，返回 (起始下标, 结束下标, 运算符)。
fn find_comparison(tokens: &[Token]) -> Option<(usize, usize, Comparison)> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::ParenOpen | TokenKind::SquareOpen => depth += 1,
            TokenKind::ParenClose | TokenKind::SquareClose => depth = depth.saturating_sub(1),
            TokenKind::Other if depth == 0 => {
                let next_is = |ch: char| tokens.get(idx + 1).map_or(false, |t| t.is_char(ch));
                let found = match token.text.as_str() {
                    ">" if next_is('=') => Some((2, Comparison::GreaterEqual)),
                    ">" => Some((1, Comparison::Greater)),
                    "<" if next_is('=') => Some((2, Comparison::LessEqual)),
                    "<" => Some((1, Comparison::Less)),
                    "=" if next_is('<') => Some((2, Comparison::LessEqual)),
                    "=" => Some((1, Comparison::Equal)),
                    _ => None,
                };
                if let Some((len, op)) = found {
                    return Some((idx, idx + len, op));
                }
            }
            _ => {}
        }
    }
    None
}

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<value>[+-]?(?:\d+(?:\.\d+)?|\.\d+))(?P<unit>[a-zA-Z%]*)$")
        .expect("数值正则编译失败")
});

/// 单个数值单元解析为 (数值, 单位)。
fn numeric(value: &TokenList) -> Option<(f64, String)> {
    let [token] = value.as_slice() else {
        return None;
    };
    if !matches!(
        token.kind,
        TokenKind::Number | TokenKind::Dimension | TokenKind::Percentage
    ) {
        return None;
    }
    let caps = NUMBER_RE.captures(&token.text)?;
    let number = caps.name("value")?.as_str().parse().ok()?;
    let unit = caps.name("unit").map_or("", |m| m.as_str()).to_ascii_lowercase();
    Some((number, unit))
}

fn compare(lhs: &TokenList, op: Comparison, rhs: &TokenList) -> bool {
    if let (Some((a, unit_a)), Some((b, unit_b))) = (numeric(lhs), numeric(rhs)) {
        if unit_a == unit_b || unit_a.is_empty() || unit_b.is_empty() {
            return match op {
                Comparison::Greater => a > b,
                Comparison::GreaterEqual => a >= b,
                Comparison::Less => a < b,
                Comparison::LessEqual => a <= b,
                Comparison::Equal => (a - b).abs() < f64::EPSILON,
            };
        }
        return false;
    }
    match op {
        Comparison::Equal => strip_quotes(lhs) == strip_quotes(rhs),
        _ => false,
    }
}

/// 字符串与关键字比较时忽略引号：`("dark") = (dark)`。
fn strip_quotes(value: &TokenList) -> String {
    match value.as_slice() {
        [single] if single.is(TokenKind::String) => unquote(&single.text).to_string(),
        _ => value.to_string(),
    }
}

fn check_predicate(name: &str, args: &[TokenList]) -> bool {
    let Some(value) = args.first() else {
        return false;
    };
    let single = match value.as_slice() {
        [token] => Some(token),
        _ => None,
    };
    match name {
        "isnumber" => numeric(value).is_some(),
        "isstring" => single.map_or(false, |t| t.is(TokenKind::String)),
        "iscolor" => is_color(value),
        "iskeyword" => single.map_or(false, |t| t.is(TokenKind::Identifier)),
        "isurl" => {
            single.map_or(false, |t| t.is(TokenKind::Url))
                || value
                    .front()
                    .map_or(false, |t| is_keyword(t, "url"))
        }
        "ispixel" => numeric(value).map_or(false, |(_, unit)| unit == "px"),
        "ispercentage" => numeric(value).map_or(false, |(_, unit)| unit == "%"),
        "isem" => numeric(value).map_or(false, |(_, unit)| unit == "em"),
        "isunit" => match (numeric(value), args.get(1)) {
            (Some((_, unit)), Some(expected)) => unit == strip_quotes(expected).to_ascii_lowercase(),
            _ => false,
        },
        _ => false,
    }
}

fn is_color(value: &TokenList) -> bool {
    match value.as_slice() {
        [token] if token.is(TokenKind::Hash) => {
            let hex = &token.text[1..];
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        [token] if token.is(TokenKind::Identifier) => {
            NAMED_COLORS.contains(&token.text.to_ascii_lowercase().as_str())
        }
        [name, open, .., close]
            if name.is(TokenKind::Identifier)
                && open.is(TokenKind::ParenOpen)
                && close.is(TokenKind::ParenClose) =>
        {
            matches!(
                name.text.to_ascii_lowercase().as_str(),
                "rgb" | "rgba" | "hsl" | "hsla"
            )
        }
        _ => false,
    }
}
