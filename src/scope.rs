use crate::token::TokenList;
use indexmap::IndexMap;

/// 变量查找结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'a> {
    Value(&'a TokenList),
    /// mixin 形参占位：遮蔽外层同名变量，但本身还没有值。
    Unset,
    Undefined,
}

/// 变量作用域栈，查找从最内层向外层进行，命中即返回。
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<IndexMap<String, Option<TokenList>>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
        tracing::trace!(depth = self.scopes.len(), "push scope");
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        tracing::trace!(depth = self.scopes.len(), "pop scope");
    }

    /// 在最内层作用域绑定变量；`None` 表示形参占位。名称不带 `@`。
    /// 栈为空时自动建立一层，保证顶层声明不会丢失。
    pub fn put_variable<S: Into<String>>(&mut self, name: S, value: Option<TokenList>) {
        if self.scopes.is_empty() {
            self.push_scope();
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    pub fn resolve(&self, name: &str) -> Binding<'_> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return match value {
                    Some(tokens) => Binding::Value(tokens),
                    None => Binding::Unset,
                };
            }
        }
        Binding::Undefined
    }
}
