use std::path::PathBuf;
use thiserror::Error;

/// 编译过程中统一的错误类型。任何一个错误都会立即终止整次编译。
#[derive(Debug, Error)]
pub enum LessError {
    #[error("语法错误: 遇到 `{found}`，期待 {expected} (位置 {position})")]
    Syntax {
        found: String,
        expected: String,
        position: usize,
    },
    #[error("未闭合的{construct}: 输入结束前缺少 '{closer}' (位置 {position})")]
    Unterminated {
        construct: &'static str,
        closer: &'static str,
        position: usize,
    },
    #[error("找不到可匹配的 mixin `{selector}` (位置 {position})")]
    UnresolvedMixin { selector: String, position: usize },
    #[error("mixin `{selector}` 展开超过 {limit} 层，疑似递归调用 (位置 {position})")]
    RecursiveMixin {
        selector: String,
        limit: usize,
        position: usize,
    },
    #[error("未定义的变量 @{name} (位置 {position})")]
    UndefinedVariable { name: String, position: usize },
    #[error("mixin 参数 @{name} 尚未绑定值 (位置 {position})")]
    UnsetParameter { name: String, position: usize },
    #[error("读取文件 {} 失败: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析 @import 路径 {target}")]
    ImportNotFound { target: String },
    #[error("检测到循环导入: {}", path.display())]
    CircularImport { path: PathBuf },
    #[error("{source} (文件: {})", path.display())]
    Imported {
        path: PathBuf,
        #[source]
        source: Box<LessError>,
    },
}

pub type LessResult<T> = Result<T, LessError>;

impl LessError {
    pub fn syntax<F: Into<String>, E: Into<String>>(found: F, expected: E, position: usize) -> Self {
        LessError::Syntax {
            found: found.into(),
            expected: expected.into(),
            position,
        }
    }

    pub fn unterminated(construct: &'static str, closer: &'static str, position: usize) -> Self {
        LessError::Unterminated {
            construct,
            closer,
            position,
        }
    }

    /// 语法类错误（含未闭合结构），导入文件中的错误会向内查找。
    pub fn is_syntax(&self) -> bool {
        match self {
            LessError::Syntax { .. } | LessError::Unterminated { .. } => true,
            LessError::Imported { source, .. } => source.is_syntax(),
            _ => false,
        }
    }

    /// 剥掉导入文件的包装，返回最初产生的错误。
    pub fn root(&self) -> &LessError {
        match self {
            LessError::Imported { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_file(self, path: PathBuf) -> Self {
        LessError::Imported {
            path,
            source: Box::new(self),
        }
    }
}
