//! less_grammar 库入口，提供面向 Rust 与 Node.js 的 LESS 编译能力。
//! 变量替换、mixin 展开与嵌套规则展开都在一次递归下降解析中完成，
//! 之后由 Serializer 输出 CSS 文本。

pub mod ast;
pub mod error;
mod guard;
mod importer;
pub mod mixin;
pub mod parser;
pub mod scope;
mod serializer;
pub mod token;
mod tokenizer;
mod utils;
mod value;

pub use crate::ast::Stylesheet;
pub use crate::error::{LessError, LessResult};
pub use crate::parser::Extensions;
pub use crate::serializer::Serializer;

use crate::parser::{Compilation, Parser};
use std::fs;
use std::path::{Path, PathBuf};

/// LESS 编译配置。
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// 是否输出压缩后的 CSS。
    pub minify: bool,
    /// 当前源文件所在目录，用于解析相对 @import。
    pub current_dir: Option<PathBuf>,
    /// 额外的检索目录。
    pub include_paths: Vec<PathBuf>,
    /// 启用的 LESS 语法扩展，`Extensions::css()` 表示按纯 CSS 解析。
    pub extensions: Extensions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            minify: false,
            current_dir: None,
            include_paths: Vec::new(),
            extensions: Extensions::less(),
        }
    }
}

/// 解析源码并完成全部 LESS 展开，返回扁平化的样式表。
pub fn parse(source: &str, options: &CompileOptions) -> LessResult<Stylesheet> {
    parse_with_root(source, options, None)
}

fn parse_with_root(
    source: &str,
    options: &CompileOptions,
    root: Option<PathBuf>,
) -> LessResult<Stylesheet> {
    let mut ctx = Compilation::new(options.include_paths.clone());
    if let Some(root) = root {
        ctx.enter_root(root);
    }
    Parser::new(
        source,
        &mut ctx,
        options.extensions,
        options.current_dir.clone(),
    )?
    .parse()?;
    Ok(ctx.into_stylesheet())
}

/// 从文件解析，相对导入以该文件所在目录为基准。
pub fn parse_file<P: AsRef<Path>>(path: P, options: &CompileOptions) -> LessResult<Stylesheet> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| LessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let options = with_file_defaults(path, options.clone());
    parse_with_root(&source, &options, Some(path.to_path_buf()))
}

/// 编译 LESS 源码为 CSS 文本。
///
/// # 参数
/// * `source` - 待编译的 LESS 字符串
/// * `options` - 编译配置
pub fn compile(source: &str, options: CompileOptions) -> LessResult<String> {
    let stylesheet = parse(source, &options)?;
    Ok(Serializer::new(options.minify).to_css(&stylesheet))
}

/// 从文件路径编译 LESS，自动处理 @import。
pub fn compile_file<P: AsRef<Path>>(path: P, options: CompileOptions) -> LessResult<String> {
    let stylesheet = parse_file(path, &options)?;
    Ok(Serializer::new(options.minify).to_css(&stylesheet))
}

fn with_file_defaults(path: &Path, mut options: CompileOptions) -> CompileOptions {
    if let Some(parent) = path.parent() {
        if options.current_dir.is_none() {
            options.current_dir = Some(parent.to_path_buf());
        }
        if options.include_paths.is_empty() {
            options.include_paths.push(parent.to_path_buf());
        }
    }
    options
}

#[cfg(feature = "node")]
use napi::{Error, Result};
#[cfg(feature = "node")]
use napi_derive::napi;

/// Node.js 侧的编译选项对象。
#[cfg(feature = "node")]
#[napi(object)]
pub struct JsCompileOptions {
    /// 是否压缩输出 CSS。
    pub minify: Option<bool>,
    /// 源文件路径，用于解析 @import。
    pub filename: Option<String>,
    /// 按纯 CSS 解析，关闭全部 LESS 扩展。
    pub plain_css: Option<bool>,
}

/// 暴露给 Node.js 的编译函数。
#[cfg(feature = "node")]
#[napi]
pub fn compile_less(source: String, options: Option<JsCompileOptions>) -> Result<String> {
    let opt = options.unwrap_or(JsCompileOptions {
        minify: None,
        filename: None,
        plain_css: None,
    });
    let mut compile_options = CompileOptions {
        minify: opt.minify.unwrap_or(false),
        ..CompileOptions::default()
    };
    if opt.plain_css.unwrap_or(false) {
        compile_options.extensions = Extensions::css();
    }
    if let Some(filename) = opt.filename {
        compile_options = with_file_defaults(Path::new(&filename), compile_options);
    }
    compile(&source, compile_options).map_err(|err| Error::from_reason(err.to_string()))
}
