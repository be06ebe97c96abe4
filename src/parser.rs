use crate::ast::{AtRule, Declaration, Ruleset, Selector, Stylesheet};
use crate::error::{LessError, LessResult};
use crate::importer::{self, ImportState};
use crate::mixin::{BodyItem, BoundParam, MixinCall, MixinRegistry, ParameterRuleset};
use crate::scope::ScopeStack;
use crate::token::{Token, TokenKind, TokenList};
use crate::tokenizer::TokenStream;
use crate::value::ValueProcessor;
use std::path::{Path, PathBuf};

/// 语法扩展开关。全部关闭时解析器退化为纯 CSS2 语句解析器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensions {
    /// `@name: value;` 变量声明与替换。
    pub variables: bool,
    /// mixin 定义与调用。
    pub mixins: bool,
    /// 规则集内的嵌套规则。
    pub nesting: bool,
    /// 展开非 `.css` 的 `@import`。
    pub imports: bool,
    /// `//` 行注释。
    pub line_comments: bool,
}

impl Extensions {
    pub fn less() -> Self {
        Self {
            variables: true,
            mixins: true,
            nesting: true,
            imports: true,
            line_comments: true,
        }
    }

    pub fn css() -> Self {
        Self {
            variables: false,
            mixins: false,
            nesting: false,
            imports: false,
            line_comments: false,
        }
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::less()
    }
}

/// mixin 嵌套展开的层数上限。
const MAX_EXPANSION_DEPTH: usize = 64;

/// 暂时无法解析的 mixin 调用，等整个文件解析完再重试。
#[derive(Debug)]
struct PendingCall {
    ruleset: usize,
    /// 插入位置：记录调用时该规则集已有的声明数。
    at: usize,
    call: MixinCall,
}

/// 一次 mixin 查找的结果。
#[derive(Debug)]
enum Resolution {
    Resolved(Vec<Declaration>),
    /// 没有定义匹配，或依赖的规则集尚未补齐；携带最内层无法解析的调用。
    Unresolved(MixinCall),
}

/// 一次编译的全部可变状态。导入的文件与主文件共享同一个实例。
#[derive(Debug, Default)]
pub struct Compilation {
    pub stylesheet: Stylesheet,
    pub scopes: ScopeStack,
    pub mixins: MixinRegistry,
    pending: Vec<PendingCall>,
    imports: ImportState,
}

impl Compilation {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self {
            imports: ImportState::new(include_paths),
            ..Self::default()
        }
    }

    /// 记录入口文件，使导入回到它自身时能被识别为循环。
    pub fn enter_root(&mut self, path: PathBuf) {
        self.imports.push(path);
    }

    pub fn into_stylesheet(self) -> Stylesheet {
        self.stylesheet
    }
}

/// 声明的去向：普通规则集（样式表中的下标）或参数化 mixin（注册表中的下标）。
#[derive(Debug, Clone, Copy)]
enum Target {
    Ruleset(usize),
    Mixin(usize),
}

/// 递归下降语法分析器，在解析过程中同时完成变量替换、mixin 展开与嵌套规则展开。
pub struct Parser<'s, 'c> {
    tokens: TokenStream<'s>,
    ctx: &'c mut Compilation,
    extensions: Extensions,
    current_dir: Option<PathBuf>,
    /// 正在解析参数化 mixin 的定义体：形参占位保留原样。
    deferring: bool,
    /// 声明尚未收齐的普通规则集，不能被当作 mixin 复制。
    open: Vec<usize>,
    expansions: usize,
}

impl<'s, 'c> Parser<'s, 'c> {
    pub fn new(
        source: &'s str,
        ctx: &'c mut Compilation,
        extensions: Extensions,
        current_dir: Option<PathBuf>,
    ) -> LessResult<Self> {
        Ok(Self {
            tokens: TokenStream::new(source, extensions.line_comments)?,
            ctx,
            extensions,
            current_dir,
            deferring: false,
            open: Vec::new(),
            expansions: 0,
        })
    }

    /// 解析入口文件：建立文件作用域，解析全部语句，补齐前向引用的 mixin 调用，
    /// 最后去掉没有声明的规则集。
    pub fn parse(mut self) -> LessResult<()> {
        let depth = self.ctx.scopes.depth();
        let result = self.scoped(|parser| {
            parser.parse_stylesheet()?;
            parser.resolve_pending()?;
            parser.ctx.stylesheet.drop_empty_rulesets();
            Ok(())
        });
        debug_assert_eq!(self.ctx.scopes.depth(), depth);
        result
    }

    /// 被导入的文件直接写入导入方的作用域与样式表。
    fn parse_imported(mut self) -> LessResult<()> {
        self.parse_stylesheet()
    }

    /// 作用域与闭包执行期等长，闭包出错时同样出栈。
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> LessResult<T>) -> LessResult<T> {
        self.ctx.scopes.push_scope();
        let result = f(self);
        self.ctx.scopes.pop_scope();
        result
    }

    fn parse_stylesheet(&mut self) -> LessResult<()> {
        self.skip_whitespace()?;
        while self.parse_statement()? {}
        if !self.tokens.is_eof() {
            return Err(LessError::syntax(
                self.tokens.found(),
                "规则集或 @ 规则",
                self.tokens.position(),
            ));
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> LessResult<bool> {
        Ok(self.parse_ruleset(None)? || self.parse_at_rule_or_variable()?)
    }

    fn parse_at_rule_or_variable(&mut self) -> LessResult<bool> {
        if self.tokens.kind() != TokenKind::AtKeyword {
            return Ok(false);
        }
        let keyword = self.tokens.advance()?;
        self.skip_whitespace()?;

        if self.is_variable_declaration(&keyword) {
            self.parse_variable(&keyword, false)?;
            return Ok(true);
        }

        let mut prelude = TokenList::new();
        while self.parse_any(&mut prelude)? || self.parse_whitespace(&mut prelude)? {}
        prelude.trim();

        let block = match self.tokens.kind() {
            TokenKind::BlockOpen => {
                let mut block = TokenList::new();
                self.parse_block(&mut block)?;
                Some(block)
            }
            TokenKind::Delimiter => {
                self.tokens.advance()?;
                None
            }
            _ => {
                return Err(LessError::syntax(
                    self.tokens.found(),
                    "@ 规则结尾的 ';'",
                    self.tokens.position(),
                ))
            }
        };
        self.skip_whitespace()?;

        if self.extensions.imports
            && block.is_none()
            && keyword.text.eq_ignore_ascii_case("@import")
            && self.parse_import(&prelude, keyword.position)?
        {
            return Ok(true);
        }

        self.ctx.stylesheet.add_at_rule(AtRule {
            keyword: keyword.text,
            prelude,
            block,
        });
        Ok(true)
    }

    /// `@page :first` 的冒号属于页面选择器。
    fn is_variable_declaration(&self, keyword: &Token) -> bool {
        self.extensions.variables
            && self.tokens.kind() == TokenKind::Colon
            && !keyword.text.eq_ignore_ascii_case("@page")
    }

    /// 当前单元是 `:`。规则集内允许省略最后一个 `;`。
    fn parse_variable(&mut self, keyword: &Token, in_ruleset: bool) -> LessResult<()> {
        self.tokens.advance()?;
        self.skip_whitespace()?;
        let value = self.parse_value()?;
        if value.is_empty() {
            return Err(LessError::syntax(
                self.tokens.found(),
                "变量值",
                self.tokens.position(),
            ));
        }
        match self.tokens.kind() {
            TokenKind::Delimiter => {
                self.tokens.advance()?;
                self.skip_whitespace()?;
            }
            TokenKind::BlockClose if in_ruleset => {}
            _ => {
                return Err(LessError::syntax(
                    self.tokens.found(),
                    "变量声明结尾的 ';'",
                    self.tokens.position(),
                ))
            }
        }
        let value = self.process(&value)?;
        self.ctx.scopes.put_variable(&keyword.text[1..], Some(value));
        Ok(())
    }

    /// `selector` 为 `None` 时先读取选择器；没有选择器也没有 `{` 时返回 `false`。
    fn parse_ruleset(&mut self, selector: Option<Selector>) -> LessResult<bool> {
        let selector = match selector {
            Some(selector) => Some(selector),
            None => self.parse_selector()?,
        };
        if self.tokens.kind() != TokenKind::BlockOpen {
            return match selector {
                None => Ok(false),
                Some(_) => Err(LessError::syntax(
                    self.tokens.found(),
                    "声明块 ('{...}')",
                    self.tokens.position(),
                )),
            };
        }
        let open = self.tokens.advance()?;
        let selector = selector.unwrap_or_default();

        self.scoped(|parser| {
            let target = if parser.extensions.mixins && selector.is_parametric() {
                parser.start_parameter_ruleset(selector)?
            } else {
                Target::Ruleset(parser.ctx.stylesheet.add_ruleset(Ruleset::new(selector)))
            };
            let deferring = parser.deferring;
            parser.deferring = deferring || matches!(target, Target::Mixin(_));
            if let Target::Ruleset(index) = target {
                parser.open.push(index);
            }
            let result = parser.parse_ruleset_body(target);
            if let Target::Ruleset(_) = target {
                parser.open.pop();
            }
            parser.deferring = deferring;
            result
        })?;

        match self.tokens.kind() {
            TokenKind::BlockClose => {
                self.tokens.advance()?;
                self.skip_whitespace()?;
                Ok(true)
            }
            TokenKind::Eof => Err(LessError::unterminated("声明块", "}", open.position)),
            _ => Err(LessError::syntax(
                self.tokens.found(),
                "声明块结尾的 '}'",
                self.tokens.position(),
            )),
        }
    }

    /// 注册参数化规则集，并为每个形参放置占位，避免定义体误用外层同名变量。
    fn start_parameter_ruleset(&mut self, selector: Selector) -> LessResult<Target> {
        let ruleset = ParameterRuleset::from_selector(selector)?;
        for name in ruleset.keywords() {
            self.ctx.scopes.put_variable(name, None);
        }
        tracing::debug!(mixin = %ruleset.selector, "register parametric mixin");
        Ok(Target::Mixin(self.ctx.mixins.register(ruleset)))
    }

    /// 依次解析块内语句，停在 `}` 或输入结尾，由调用方检查。
    fn parse_ruleset_body(&mut self, target: Target) -> LessResult<()> {
        loop {
            self.skip_whitespace()?;
            let raw = self.parse_selector_tokens()?;
            if raw.iter().all(Token::is_whitespace) {
                match self.tokens.kind() {
                    TokenKind::AtKeyword => self.parse_body_variable()?,
                    TokenKind::Delimiter => {
                        self.tokens.advance()?;
                    }
                    _ => return Ok(()),
                }
                continue;
            }

            if self.tokens.kind() == TokenKind::BlockOpen {
                let selector = Selector::new(raw.trimmed());
                self.parse_nested_rule(selector, target)?;
                continue;
            }

            let selector = Selector::new(raw.clone().trimmed());
            if self.extensions.mixins && selector.looks_like_mixin_call() {
                self.parse_mixin_call(selector, target)?;
            } else if is_declaration(&raw) {
                self.parse_declaration(raw, target)?;
            } else if self.extensions.mixins {
                return Err(LessError::UnresolvedMixin {
                    position: selector.position(),
                    selector: selector.to_string(),
                });
            } else {
                return Err(LessError::syntax(
                    selector.to_string(),
                    "声明 (property: value)",
                    selector.position(),
                ));
            }
            self.end_of_statement()?;
        }
    }

    fn parse_body_variable(&mut self) -> LessResult<()> {
        let keyword = self.tokens.current().clone();
        if !self.extensions.variables {
            return Err(LessError::syntax(
                keyword.text,
                "声明 (property: value)",
                keyword.position,
            ));
        }
        self.tokens.advance()?;
        self.skip_whitespace()?;
        if self.tokens.kind() != TokenKind::Colon {
            return Err(LessError::syntax(
                self.tokens.found(),
                "变量声明中 @keyword 之后的 ':'",
                self.tokens.position(),
            ));
        }
        self.parse_variable(&keyword, true)
    }

    fn end_of_statement(&mut self) -> LessResult<()> {
        match self.tokens.kind() {
            TokenKind::Delimiter => {
                self.tokens.advance()?;
                Ok(())
            }
            TokenKind::BlockClose => Ok(()),
            TokenKind::Eof => Ok(()),
            _ => Err(LessError::syntax(
                self.tokens.found(),
                "';' 或 '}'",
                self.tokens.position(),
            )),
        }
    }

    /// 嵌套规则：组合外层选择器后按普通规则集递归解析，结果直接加入样式表。
    fn parse_nested_rule(&mut self, mut selector: Selector, target: Target) -> LessResult<()> {
        if !self.extensions.nesting {
            return Err(LessError::syntax("{", "';' 或 '}'", self.tokens.position()));
        }
        let Target::Ruleset(index) = target else {
            return Err(LessError::syntax(
                selector.to_string(),
                "声明或 mixin 调用（参数化 mixin 内不支持嵌套规则）",
                selector.position(),
            ));
        };
        if let Some(parent) = self.ctx.stylesheet.ruleset(index) {
            let parent = parent.selector.clone();
            selector.add_prefix(&parent);
        }
        self.parse_ruleset(Some(selector))?;
        Ok(())
    }

    /// `raw` 是已读入的 `property :` 前缀及部分值，剩余的值在这里继续读取。
    fn parse_declaration(&mut self, mut raw: TokenList, target: Target) -> LessResult<()> {
        let position = raw.position_or(self.tokens.position());
        let property = raw.shift().map(|t| t.text).unwrap_or_default();
        raw.trim();
        raw.shift();
        raw.extend(self.parse_value()?);
        raw.trim();
        if raw.is_empty() {
            return Err(LessError::syntax(
                self.tokens.found(),
                "属性值",
                self.tokens.position(),
            ));
        }
        let value = self.process(&raw)?;
        tracing::trace!(property = %property, position, "declaration");
        self.add_declaration(target, Declaration::new(property, value));
        Ok(())
    }

    fn add_declaration(&mut self, target: Target, declaration: Declaration) {
        match target {
            Target::Ruleset(index) => {
                if let Some(ruleset) = self.ctx.stylesheet.ruleset_mut(index) {
                    ruleset.add_declaration(declaration);
                }
            }
            Target::Mixin(index) => {
                if let Some(mixin) = self.ctx.mixins.get_mut(index) {
                    mixin.add_declaration(declaration);
                }
            }
        }
    }

    fn parse_mixin_call(&mut self, selector: Selector, target: Target) -> LessResult<()> {
        let Some(mut call) = MixinCall::from_selector(&selector) else {
            return Err(LessError::UnresolvedMixin {
                position: selector.position(),
                selector: selector.to_string(),
            });
        };
        call.process_arguments(&ValueProcessor::new(&self.ctx.scopes, !self.deferring))?;

        let ruleset = match target {
            Target::Mixin(index) => {
                if let Some(mixin) = self.ctx.mixins.get_mut(index) {
                    mixin.add_call(call);
                }
                return Ok(());
            }
            Target::Ruleset(ruleset) => ruleset,
        };

        match self.resolve_mixin(&call)? {
            Resolution::Resolved(declarations) => {
                for declaration in declarations {
                    self.add_declaration(target, declaration);
                }
            }
            Resolution::Unresolved(_) => {
                let at = self
                    .ctx
                    .stylesheet
                    .ruleset(ruleset)
                    .map_or(0, |r| r.declarations.len());
                tracing::debug!(call = %call.selector, "defer mixin call");
                self.ctx.pending.push(PendingCall { ruleset, at, call });
            }
        }
        Ok(())
    }

    /// 普通 mixin 与参数化 mixin 都会尝试，结果累加。
    fn resolve_mixin(&mut self, call: &MixinCall) -> LessResult<Resolution> {
        let mut matched = false;
        let mut declarations = Vec::new();

        for index in self.ctx.mixins.candidates(&call.key) {
            let Some(mixin) = self.ctx.mixins.get(index).cloned() else {
                continue;
            };
            let Some(bound) = mixin.match_arguments(&call.arguments) else {
                continue;
            };
            // 实参被接受即算找到，守卫不通过只是不贡献声明，不会报 UnresolvedMixin。
            // 逐个定义检查守卫、全部失败就报错的做法在这里不采用。
            matched = true;
            match self.expand_mixin(&mixin, bound, call)? {
                Resolution::Resolved(expanded) => declarations.extend(expanded),
                unresolved => return Ok(unresolved),
            }
        }

        if let Some(index) = self.plain_mixin(call) {
            if self.is_incomplete(index) {
                return Ok(Resolution::Unresolved(call.clone()));
            }
            if let Some(ruleset) = self.ctx.stylesheet.ruleset(index) {
                matched = true;
                declarations.extend(ruleset.declarations.iter().cloned());
            }
        }

        Ok(if matched {
            Resolution::Resolved(declarations)
        } else {
            Resolution::Unresolved(call.clone())
        })
    }

    /// 与调用选择器相同的普通规则集；`.m()` 也可以找到 `.m`。
    fn plain_mixin(&self, call: &MixinCall) -> Option<usize> {
        let stylesheet = &self.ctx.stylesheet;
        stylesheet.ruleset_index(&call.selector).or_else(|| {
            if call.has_parens && call.arguments.is_empty() {
                stylesheet.ruleset_index(&Selector::new(call.key.clone()))
            } else {
                None
            }
        })
    }

    /// 规则集仍在解析，或还有推迟的调用等待补入。
    fn is_incomplete(&self, index: usize) -> bool {
        self.open.contains(&index) || self.ctx.pending.iter().any(|entry| entry.ruleset == index)
    }

    /// 在新作用域中绑定实参、检查守卫，再依次展开定义体。
    fn expand_mixin(
        &mut self,
        mixin: &ParameterRuleset,
        bound: Vec<BoundParam>,
        call: &MixinCall,
    ) -> LessResult<Resolution> {
        let position = call.position();
        if self.expansions >= MAX_EXPANSION_DEPTH {
            return Err(LessError::RecursiveMixin {
                selector: call.selector.to_string(),
                limit: MAX_EXPANSION_DEPTH,
                position,
            });
        }
        self.expansions += 1;
        let result = self.scoped(|parser| {
            parser.bind_arguments(bound, position)?;

            if let Some(guard) = mixin.guard() {
                if !guard.evaluate(&ValueProcessor::new(&parser.ctx.scopes, true))? {
                    tracing::debug!(mixin = %mixin.selector, "guard rejected mixin");
                    return Ok(Resolution::Resolved(Vec::new()));
                }
            }

            tracing::debug!(mixin = %mixin.selector, call = %call.selector, "expand mixin");
            let mut declarations = Vec::new();
            for item in mixin.body() {
                match item {
                    BodyItem::Declaration(declaration) => {
                        let value = ValueProcessor::new(&parser.ctx.scopes, true)
                            .process(&declaration.value)?;
                        declarations.push(Declaration::new(declaration.property.clone(), value));
                    }
                    BodyItem::Call(inner) => {
                        let mut inner = inner.clone();
                        inner.process_arguments(&ValueProcessor::new(&parser.ctx.scopes, true))?;
                        match parser.resolve_mixin(&inner)? {
                            Resolution::Resolved(expanded) => declarations.extend(expanded),
                            unresolved => return Ok(unresolved),
                        }
                    }
                }
            }
            Ok(Resolution::Resolved(declarations))
        });
        self.expansions -= 1;
        result
    }

    /// 把配对结果写入当前作用域，并设置 `@arguments`。
    fn bind_arguments(&mut self, bound: Vec<BoundParam>, position: usize) -> LessResult<()> {
        let mut values = Vec::new();
        for param in bound {
            match param {
                BoundParam::Value { name, value } => {
                    values.push(value.clone());
                    self.ctx.scopes.put_variable(name, Some(value));
                }
                BoundParam::Default { name, default } => {
                    let value = ValueProcessor::new(&self.ctx.scopes, true)
                        .process(&default)?
                        .trimmed();
                    values.push(value.clone());
                    self.ctx.scopes.put_variable(name, Some(value));
                }
                BoundParam::Literal(value) => values.push(value),
                BoundParam::Rest { name, values: rest } => {
                    let joined = TokenList::join(rest, &[Token::whitespace(position)]);
                    if let Some(name) = name {
                        self.ctx.scopes.put_variable(name, Some(joined.clone()));
                    }
                    if !joined.is_empty() {
                        values.push(joined);
                    }
                }
            }
        }
        let arguments = TokenList::join(values, &[Token::whitespace(position)]);
        self.ctx.scopes.put_variable("arguments", Some(arguments));
        Ok(())
    }

    /// 反复重试推迟的调用直到没有进展。被复制的规则集自身还有推迟调用时先跳过，
    /// 等它补齐后再复制。
    fn resolve_pending(&mut self) -> LessResult<()> {
        while !self.ctx.pending.is_empty() {
            let mut progressed = false;
            let mut stuck = None;
            let mut idx = 0;
            while idx < self.ctx.pending.len() {
                let entry = self.ctx.pending.remove(idx);
                self.open.push(entry.ruleset);
                let resolution = self.resolve_mixin(&entry.call);
                self.open.pop();
                match resolution? {
                    Resolution::Resolved(declarations) => {
                        tracing::debug!(call = %entry.call.selector, "resolved deferred mixin call");
                        self.insert_pending(idx, &entry, declarations);
                        progressed = true;
                    }
                    Resolution::Unresolved(blocker) => {
                        stuck.get_or_insert(blocker);
                        self.ctx.pending.insert(idx, entry);
                        idx += 1;
                    }
                }
            }
            if !progressed {
                if let Some(blocker) = stuck {
                    return Err(LessError::UnresolvedMixin {
                        position: blocker.position(),
                        selector: blocker.selector.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// `idx` 是该调用原先在等待列表中的位置；之后记录的同规则集调用随插入量后移。
    fn insert_pending(&mut self, idx: usize, entry: &PendingCall, declarations: Vec<Declaration>) {
        let count = declarations.len();
        for (other_idx, other) in self.ctx.pending.iter_mut().enumerate() {
            if other.ruleset == entry.ruleset
                && (other.at > entry.at || (other.at == entry.at && other_idx >= idx))
            {
                other.at += count;
            }
        }
        if let Some(ruleset) = self.ctx.stylesheet.ruleset_mut(entry.ruleset) {
            ruleset.insert_declarations(entry.at, declarations);
        }
    }

    /// 处理 `@import`。返回 `false` 表示按普通 @ 规则原样输出。
    fn parse_import(&mut self, prelude: &TokenList, position: usize) -> LessResult<bool> {
        let Some(target) = importer::import_target(prelude, position)? else {
            return Ok(false);
        };
        let path = self
            .ctx
            .imports
            .resolve(&target, self.current_dir.as_deref())?;
        let source = self.ctx.imports.enter(&path)?;
        tracing::debug!(path = %path.display(), "import");

        let current_dir = path.parent().map(Path::to_path_buf);
        let result = Parser::new(&source, &mut *self.ctx, self.extensions, current_dir)
            .and_then(Parser::parse_imported);
        self.ctx.imports.leave();
        result.map_err(|err| err.in_file(path))?;
        Ok(true)
    }

    fn process(&self, value: &TokenList) -> LessResult<TokenList> {
        if !self.extensions.variables {
            return Ok(value.clone());
        }
        Ok(ValueProcessor::new(&self.ctx.scopes, !self.deferring)
            .process(value)?
            .trimmed())
    }

    fn parse_selector(&mut self) -> LessResult<Option<Selector>> {
        let tokens = self.parse_selector_tokens()?.trimmed();
        if tokens.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Selector::new(tokens)))
        }
    }

    /// 读到 `{`、`;`、`}`、@ 关键字或输入结尾为止，保留内部空白。
    fn parse_selector_tokens(&mut self) -> LessResult<TokenList> {
        let mut tokens = TokenList::new();
        while self.parse_any(&mut tokens)? || self.parse_whitespace(&mut tokens)? {}
        Ok(tokens)
    }

    fn parse_value(&mut self) -> LessResult<TokenList> {
        let mut value = TokenList::new();
        loop {
            if self.parse_any(&mut value)? || self.parse_whitespace(&mut value)? {
                continue;
            }
            match self.tokens.kind() {
                TokenKind::BlockOpen => self.parse_block(&mut value)?,
                TokenKind::AtKeyword => value.push(self.tokens.advance()?),
                _ => break,
            }
        }
        value.trim();
        Ok(value)
    }

    fn parse_any(&mut self, tokens: &mut TokenList) -> LessResult<bool> {
        match self.tokens.kind() {
            TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::Percentage
            | TokenKind::Dimension
            | TokenKind::String
            | TokenKind::Url
            | TokenKind::Hash
            | TokenKind::UnicodeRange
            | TokenKind::Includes
            | TokenKind::DashMatch
            | TokenKind::Colon
            | TokenKind::Other => {
                tokens.push(self.tokens.advance()?);
                Ok(true)
            }
            TokenKind::ParenOpen => {
                self.parse_group(tokens, TokenKind::ParenClose, "括号", ")")?;
                Ok(true)
            }
            TokenKind::SquareOpen => {
                self.parse_group(tokens, TokenKind::SquareClose, "方括号", "]")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn parse_unused(&mut self, tokens: &mut TokenList) -> LessResult<bool> {
        match self.tokens.kind() {
            TokenKind::BlockOpen => {
                self.parse_block(tokens)?;
                Ok(true)
            }
            TokenKind::AtKeyword | TokenKind::Delimiter => {
                tokens.push(self.tokens.advance()?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// `(...)` 与 `[...]`，内部可以嵌套任意深度。
    fn parse_group(
        &mut self,
        tokens: &mut TokenList,
        closer: TokenKind,
        construct: &'static str,
        closer_text: &'static str,
    ) -> LessResult<()> {
        let open = self.tokens.advance()?;
        let position = open.position;
        tokens.push(open);
        loop {
            if self.parse_any(tokens)?
                || self.parse_unused(tokens)?
                || self.parse_whitespace(tokens)?
            {
                continue;
            }
            if self.tokens.kind() == closer {
                tokens.push(self.tokens.advance()?);
                return Ok(());
            }
            if self.tokens.is_eof() {
                return Err(LessError::unterminated(construct, closer_text, position));
            }
            return Err(LessError::syntax(
                self.tokens.found(),
                format!("'{closer_text}'"),
                self.tokens.position(),
            ));
        }
    }

    fn parse_block(&mut self, tokens: &mut TokenList) -> LessResult<()> {
        let open = self.tokens.advance()?;
        let position = open.position;
        tokens.push(open);
        loop {
            if self.parse_any(tokens)?
                || self.parse_unused(tokens)?
                || self.parse_whitespace(tokens)?
            {
                continue;
            }
            match self.tokens.kind() {
                TokenKind::BlockClose => {
                    tokens.push(self.tokens.advance()?);
                    return Ok(());
                }
                TokenKind::Eof => return Err(LessError::unterminated("块", "}", position)),
                _ => {
                    return Err(LessError::syntax(
                        self.tokens.found(),
                        "'}'",
                        self.tokens.position(),
                    ))
                }
            }
        }
    }

    /// 空白折叠为一个单元，注释直接丢弃。
    fn parse_whitespace(&mut self, tokens: &mut TokenList) -> LessResult<bool> {
        match self.tokens.kind() {
            TokenKind::Whitespace => {
                let token = self.tokens.advance()?;
                if !tokens.back().map_or(false, Token::is_whitespace) {
                    tokens.push(token);
                }
                Ok(true)
            }
            TokenKind::Comment => {
                self.tokens.advance()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn skip_whitespace(&mut self) -> LessResult<()> {
        while matches!(
            self.tokens.kind(),
            TokenKind::Whitespace | TokenKind::Comment
        ) {
            self.tokens.advance()?;
        }
        Ok(())
    }
}

/// `property` 后（可有空白）紧跟 `:`。
fn is_declaration(tokens: &TokenList) -> bool {
    let mut iter = tokens.iter().filter(|t| !t.is_whitespace());
    matches!(
        (iter.next(), iter.next()),
        (Some(property), Some(colon)) if property.is(TokenKind::Identifier) && colon.is(TokenKind::Colon)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;

    fn parse_with(source: &str, extensions: Extensions) -> (LessResult<()>, Compilation) {
        let mut ctx = Compilation::new(Vec::new());
        let result = Parser::new(source, &mut ctx, extensions, None).and_then(Parser::parse);
        (result, ctx)
    }

    fn parse(source: &str) -> Stylesheet {
        let (result, ctx) = parse_with(source, Extensions::less());
        result.unwrap();
        ctx.into_stylesheet()
    }

    fn parse_err(source: &str) -> LessError {
        parse_with(source, Extensions::less()).0.unwrap_err()
    }

    fn declarations(sheet: &Stylesheet, selector: &str) -> Vec<String> {
        sheet
            .rulesets()
            .find(|ruleset| ruleset.selector.to_string() == selector)
            .map(|ruleset| {
                ruleset
                    .declarations
                    .iter()
                    .map(|d| format!("{}: {}", d.property, d.value))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn plain_css_is_kept_as_is() {
        let sheet = parse("a > b, c { color: red; margin: 0 auto }");
        assert_eq!(
            declarations(&sheet, "a > b, c"),
            vec!["color: red", "margin: 0 auto"]
        );
    }

    #[test]
    fn variable_precedence() {
        let sheet = parse("@x: 1; .a { @x: 2; color: @x; } .b { color: @x; }");
        assert_eq!(declarations(&sheet, ".a"), vec!["color: 2"]);
        assert_eq!(declarations(&sheet, ".b"), vec!["color: 1"]);
    }

    #[test]
    fn variable_declarations_are_not_emitted() {
        let sheet = parse("@x: 1px;\n@media print { a { b: c } }");
        assert_eq!(sheet.len(), 1);
        let at_rule = sheet.at_rules().next().unwrap();
        assert_eq!(at_rule.keyword, "@media");
        assert_eq!(at_rule.prelude.to_string(), "print");
    }

    #[test]
    fn nested_rules_are_flattened() {
        let sheet = parse(".a { .b { color: red; } }");
        let selectors: Vec<_> = sheet.rulesets().map(|r| r.selector.to_string()).collect();
        assert_eq!(selectors, vec![".a .b"]);
        assert_eq!(declarations(&sheet, ".a .b"), vec!["color: red"]);
    }

    #[test]
    fn deep_nesting_has_no_fixed_limit() {
        let depth = 64;
        let mut source = String::new();
        for idx in 0..depth {
            source.push_str(&format!(".n{idx} {{ x: y; "));
        }
        for _ in 0..depth {
            source.push_str(" }");
        }
        let sheet = parse(&source);
        assert_eq!(sheet.len(), depth);
    }

    #[test]
    fn parent_scope_is_visible_in_nested_rules() {
        let sheet = parse(".a { @c: blue; .b { color: @c; } }");
        assert_eq!(declarations(&sheet, ".a .b"), vec!["color: blue"]);
    }

    #[test]
    fn plain_mixin_copies_declarations() {
        let sheet = parse(".bordered { border: 1px solid; } .box { .bordered; color: red; }");
        assert_eq!(
            declarations(&sheet, ".box"),
            vec!["border: 1px solid", "color: red"]
        );
    }

    #[test]
    fn parametric_mixin_binds_arguments() {
        let sheet = parse(".m(@a; @b: 2px) { width: @a; height: @b; } .x { .m(1px); }");
        assert_eq!(declarations(&sheet, ".x"), vec!["width: 1px", "height: 2px"]);
        assert!(sheet.rulesets().all(|r| !r.selector.to_string().starts_with(".m")));
    }

    #[test]
    fn overloads_are_additive_by_arity() {
        let source = ".m(@a) { one: @a; } .m(@a; @b) { two: @a @b; } .m(@a; @b: 0) { three: @b; }";
        let single = parse(&format!("{source} .x {{ .m(1); }}"));
        assert_eq!(declarations(&single, ".x"), vec!["one: 1", "three: 0"]);
        let pair = parse(&format!("{source} .x {{ .m(1, 2); }}"));
        assert_eq!(declarations(&pair, ".x"), vec!["two: 1 2", "three: 2"]);
    }

    #[test]
    fn guards_gate_expansion() {
        let source = ".m(@a) when (@a > 10) { big: @a; } .m(@a) when (@a =< 10) { small: @a; }";
        let sheet = parse(&format!("{source} .x {{ .m(20); }} .y {{ .m(5); }}"));
        assert_eq!(declarations(&sheet, ".x"), vec!["big: 20"]);
        assert_eq!(declarations(&sheet, ".y"), vec!["small: 5"]);
    }

    #[test]
    fn failed_guard_contributes_nothing() {
        let sheet = parse(".m(@a) when (@a > 10) { big: @a; } .x { .m(1); color: red; }");
        assert_eq!(declarations(&sheet, ".x"), vec!["color: red"]);
    }

    #[test]
    fn parameters_mask_outer_variables() {
        let sheet = parse("@x: 5; .m(@x: 0) { left: @x; } .a { .m(); } .b { .m(3); }");
        assert_eq!(declarations(&sheet, ".a"), vec!["left: 0"]);
        assert_eq!(declarations(&sheet, ".b"), vec!["left: 3"]);
    }

    #[test]
    fn arguments_variable_joins_all_values() {
        let sheet = parse(".shadow(@x; @y; @c: #000) { box-shadow: @arguments; } .a { .shadow(1px; 2px); }");
        assert_eq!(declarations(&sheet, ".a"), vec!["box-shadow: 1px 2px #000"]);
    }

    #[test]
    fn mixin_calls_may_precede_definitions() {
        let sheet = parse(".a { color: red; .later; .m(2px); top: 0; } .later { x: 1; } .m(@w) { width: @w; }");
        assert_eq!(
            declarations(&sheet, ".a"),
            vec!["color: red", "x: 1", "width: 2px", "top: 0"]
        );
    }

    #[test]
    fn unresolved_mixin_is_an_error() {
        let err = parse_err(".a { .nonexistent-mixin(); }");
        assert!(
            matches!(err, LessError::UnresolvedMixin { ref selector, .. } if selector == ".nonexistent-mixin()")
        );
    }

    #[test]
    fn scopes_are_balanced_after_success_and_failure() {
        let (result, ctx) = parse_with(".a { .b { @x: 1; c: @x; } }", Extensions::less());
        assert!(result.is_ok());
        assert_eq!(ctx.scopes.depth(), 0);

        let (result, ctx) = parse_with(".a { .b { c: @missing; } }", Extensions::less());
        assert!(matches!(result, Err(LessError::UndefinedVariable { .. })));
        assert_eq!(ctx.scopes.depth(), 0);

        let (result, ctx) = parse_with(".m(@a) when (@a > 0) { x: @a; } .y { .m(1); .b { c: (d; }", Extensions::less());
        assert!(result.unwrap_err().is_syntax());
        assert_eq!(ctx.scopes.depth(), 0);
    }

    #[test]
    fn unterminated_constructs_name_their_closer() {
        assert!(matches!(
            parse_err(".a { color: rgb(1, 2"),
            LessError::Unterminated { closer: ")", .. }
        ));
        assert!(matches!(
            parse_err(".a { color: red;"),
            LessError::Unterminated { closer: "}", .. }
        ));
        assert!(matches!(
            parse_err("a[href { }"),
            LessError::Unterminated { closer: "]", .. }
        ));
    }

    #[test]
    fn missing_block_is_a_syntax_error() {
        let err = parse_err(".a;");
        assert!(matches!(err, LessError::Syntax { ref found, .. } if found == ";"));
    }

    #[test]
    fn variable_in_ruleset_requires_colon() {
        let err = parse_err(".a { @x 1; }");
        assert!(err.is_syntax());
    }

    #[test]
    fn css_mode_rejects_less_constructs() {
        let (result, _) = parse_with(".a { .b; }", Extensions::css());
        assert!(result.unwrap_err().is_syntax());
        let (result, _) = parse_with(".a { .b { c: d } }", Extensions::css());
        assert!(result.unwrap_err().is_syntax());
        let (result, ctx) = parse_with("@x: 1;", Extensions::css());
        result.unwrap();
        assert_eq!(ctx.stylesheet.at_rules().next().map(|a| a.keyword.as_str()), Some("@x"));
    }

    #[test]
    fn css_mode_keeps_at_keywords_in_values() {
        let (result, ctx) = parse_with("a { b: @c }", Extensions::css());
        result.unwrap();
        assert_eq!(declarations(&ctx.stylesheet, "a"), vec!["b: @c"]);
    }

    #[test]
    fn pseudo_class_selectors_are_not_mixins() {
        let sheet = parse("li:nth-child(2n+1) { color: red; }");
        assert_eq!(declarations(&sheet, "li:nth-child(2n+1)"), vec!["color: red"]);
    }

    #[test]
    fn nested_rule_in_parametric_mixin_is_rejected() {
        let err = parse_err(".m(@a) { .inner { x: @a; } }");
        assert!(err.is_syntax());
    }

    #[test]
    fn guarded_mixin_sees_the_callers_bound_argument() {
        let source = ".n(@b) when (@b > 0) { y: @b; } .m(@a) { .n(@a); }";
        assert_eq!(parse(source).len(), 0);
        let sheet = parse(&format!("{source} .x {{ .m(7); }} .z {{ .m(0); color: red; }}"));
        assert_eq!(declarations(&sheet, ".x"), vec!["y: 7"]);
        assert_eq!(declarations(&sheet, ".z"), vec!["color: red"]);
    }

    #[test]
    fn calls_in_mixin_bodies_may_precede_definitions() {
        let sheet = parse(".m(@a) { .n(@a); } .n(@b) { y: @b; } .x { .m(7); }");
        assert_eq!(declarations(&sheet, ".x"), vec!["y: 7"]);

        let sheet = parse(
            ".m(@a) { .n(@a); w: @a; .helper; } .x { .m(7); } .n(@b) { y: @b; } .helper { h: 1; }",
        );
        assert_eq!(declarations(&sheet, ".x"), vec!["y: 7", "w: 7", "h: 1"]);
    }

    #[test]
    fn plain_mixins_wait_for_their_own_deferred_calls() {
        let sheet = parse(".b { .c; } .a { .b; } .c { x: 1; }");
        assert_eq!(declarations(&sheet, ".a"), vec!["x: 1"]);
        assert_eq!(declarations(&sheet, ".b"), vec!["x: 1"]);
    }

    #[test]
    fn nested_rule_copies_its_completed_parent() {
        let sheet = parse(".a { x: 1; .b { .a; } y: 2; }");
        assert_eq!(declarations(&sheet, ".a"), vec!["x: 1", "y: 2"]);
        assert_eq!(declarations(&sheet, ".a .b"), vec!["x: 1", "y: 2"]);
    }

    #[test]
    fn deferred_calls_keep_their_positions() {
        let sheet = parse(".a { .p; m: 0; .q; .p; } .p { p: 1; } .q { q: 1; q2: 2; }");
        assert_eq!(
            declarations(&sheet, ".a"),
            vec!["p: 1", "m: 0", "q: 1", "q2: 2", "p: 1"]
        );
    }

    #[test]
    fn mutually_dependent_rulesets_are_unresolved() {
        let err = parse_err(".a { .b; } .b { .a; }");
        assert!(matches!(err, LessError::UnresolvedMixin { .. }));
    }

    #[test]
    fn runaway_recursion_is_reported() {
        let err = parse_err(".m(@a) { .m(@a); } .x { .m(1); }");
        assert!(matches!(
            err,
            LessError::RecursiveMixin { ref selector, limit: MAX_EXPANSION_DEPTH, .. } if selector == ".m(@a)"
        ));
    }

    #[test]
    fn mixins_calling_mixins_substitute_at_expansion() {
        let sheet = parse(".n(@b) { y: @b; } .m(@a) { .n(@a); } .x { .m(7); }");
        assert_eq!(declarations(&sheet, ".x"), vec!["y: 7"]);
    }

    #[test]
    fn at_rules_keep_raw_blocks() {
        let sheet = parse("@font-face { font-family: x; src: url(a.woff); }");
        let Statement::AtRule(at_rule) = &sheet.statements()[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(at_rule.keyword, "@font-face");
        assert!(at_rule.block.as_ref().unwrap().to_string().starts_with('{'));
    }

    #[test]
    fn css_imports_pass_through() {
        let sheet = parse("@import \"reset.css\";\n@import url(theme.less);");
        let keywords: Vec<_> = sheet.at_rules().map(|a| a.prelude.to_string()).collect();
        assert_eq!(keywords, vec!["\"reset.css\"", "url(theme.less)"]);
    }
}
