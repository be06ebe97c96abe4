use crate::error::{LessError, LessResult};
use crate::scope::{Binding, ScopeStack};
use crate::token::{Token, TokenKind, TokenList};
use crate::tokenizer::Tokenizer;

/// 对词法单元序列做变量替换，不涉及单位与颜色运算。
///
/// `strict` 为假时（解析参数化 mixin 定义体期间），遇到形参占位会保留原样，
/// 等到 mixin 展开、实参绑定后再替换；为真时占位视为错误。
pub struct ValueProcessor<'a> {
    scopes: &'a ScopeStack,
    strict: bool,
}

impl<'a> ValueProcessor<'a> {
    pub fn new(scopes: &'a ScopeStack, strict: bool) -> Self {
        Self { scopes, strict }
    }

    pub fn process(&self, value: &TokenList) -> LessResult<TokenList> {
        let mut output = TokenList::new();
        let mut tokens = value.iter().peekable();
        while let Some(token) = tokens.next() {
            match token.kind {
                TokenKind::AtKeyword => self.substitute(token, &mut output)?,
                TokenKind::Other
                    if token.is_char('~')
                        && tokens.peek().map_or(false, |next| next.is(TokenKind::String)) =>
                {
                    if let Some(string) = tokens.next() {
                        self.escape(string, &mut output)?;
                    }
                }
                TokenKind::String if token.text.contains("@{") => {
                    let text = self.interpolate(&token.text, token.position)?;
                    output.push(Token::new(TokenKind::String, text, token.position));
                }
                _ => output.push(token.clone()),
            }
        }
        Ok(output)
    }

    fn substitute(&self, token: &Token, output: &mut TokenList) -> LessResult<()> {
        let name = &token.text[1..];
        match self.scopes.resolve(name) {
            Binding::Value(value) => {
                output.extend(value.clone());
                Ok(())
            }
            Binding::Unset if !self.strict => {
                output.push(token.clone());
                Ok(())
            }
            Binding::Unset => Err(LessError::UnsetParameter {
                name: name.to_string(),
                position: token.position,
            }),
            Binding::Undefined => Err(LessError::UndefinedVariable {
                name: name.to_string(),
                position: token.position,
            }),
        }
    }

    /// `~"..."`：去掉引号后重新切分为词法单元，原样输出。
    fn escape(&self, string: &Token, output: &mut TokenList) -> LessResult<()> {
        let text = self.interpolate(&string.text, string.position)?;
        let content = unquote(&text);
        for mut token in Tokenizer::new(content, false).tokenize()? {
            token.position += string.position;
            output.push(token);
        }
        Ok(())
    }

    /// 替换字符串里的 `@{name}`。
    fn interpolate(&self, text: &str, position: usize) -> LessResult<String> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("@{") {
            let Some(len) = rest[start + 2..].find('}') else {
                break;
            };
            let name = &rest[start + 2..start + 2 + len];
            result.push_str(&rest[..start]);
            match self.scopes.resolve(name) {
                Binding::Value(value) => result.push_str(&plain_text(value)),
                Binding::Unset if !self.strict => result.push_str(&rest[start..start + 3 + len]),
                Binding::Unset => {
                    return Err(LessError::UnsetParameter {
                        name: name.to_string(),
                        position,
                    })
                }
                Binding::Undefined => {
                    return Err(LessError::UndefinedVariable {
                        name: name.to_string(),
                        position,
                    })
                }
            }
            rest = &rest[start + 3 + len..];
        }
        result.push_str(rest);
        Ok(result)
    }
}

/// 单个字符串值取其内容，其余按文本拼接。
fn plain_text(value: &TokenList) -> String {
    match value.as_slice() {
        [single] if single.is(TokenKind::String) => unquote(&single.text).to_string(),
        _ => value.to_string(),
    }
}

pub(crate) fn unquote(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if open == close && (open == '"' || open == '\'') => {
            &text[1..text.len() - 1]
        }
        _ => text,
    }
}
