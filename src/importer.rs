use crate::error::{LessError, LessResult};
use crate::token::{TokenKind, TokenList};
use crate::value::unquote;
use std::fs;
use std::path::{Path, PathBuf};

/// 导入检索目录与当前正在解析的文件栈，用于检测循环导入。
#[derive(Debug, Default)]
pub struct ImportState {
    include_paths: Vec<PathBuf>,
    stack: Vec<PathBuf>,
}

impl ImportState {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            stack: Vec::new(),
        }
    }

    pub fn push(&mut self, path: PathBuf) {
        self.stack.push(Self::canonical(&path));
    }

    /// 检查循环并读入文件内容；成功后文件留在栈上，直到调用 [`ImportState::leave`]。
    pub fn enter(&mut self, path: &Path) -> LessResult<String> {
        if self.stack.iter().any(|open| open == path) {
            return Err(LessError::CircularImport {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| LessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.stack.push(path.to_path_buf());
        Ok(content)
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    /// 依次尝试：导入方所在目录、各检索目录、工作目录。
    pub fn resolve(&self, target: &str, current_dir: Option<&Path>) -> LessResult<PathBuf> {
        let raw = Path::new(target);
        let mut candidates = Vec::new();
        if raw.is_absolute() {
            candidates.push(raw.to_path_buf());
        } else {
            if let Some(dir) = current_dir {
                candidates.push(dir.join(raw));
            }
            for base in &self.include_paths {
                candidates.push(base.join(raw));
            }
            candidates.push(raw.to_path_buf());
        }
        for candidate in candidates {
            if let Some(found) = Self::find_existing(&candidate) {
                return Ok(found);
            }
        }
        Err(LessError::ImportNotFound {
            target: target.to_string(),
        })
    }

    /// 不以 `.less` 结尾的路径一律补上 `.less`，`theme.dark` 查找的是 `theme.dark.less`。
    fn find_existing(candidate: &Path) -> Option<PathBuf> {
        let is_less = candidate
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("less"));
        let attempt = if is_less {
            candidate.to_path_buf()
        } else {
            let mut name = candidate.as_os_str().to_owned();
            name.push(".less");
            PathBuf::from(name)
        };
        if attempt.is_file() {
            Some(Self::canonical(&attempt))
        } else {
            None
        }
    }

    fn canonical(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}

/// 取出需要展开的导入路径。`url(...)` 与 `.css` 导入返回 `None`，按普通 @ 规则输出。
pub fn import_target(prelude: &TokenList, position: usize) -> LessResult<Option<String>> {
    let Some(first) = prelude.front() else {
        return Err(LessError::syntax(";", "带有文件路径的字符串", position));
    };
    match first.kind {
        TokenKind::Url => Ok(None),
        TokenKind::String => {
            let path = unquote(&first.text);
            if path.to_ascii_lowercase().ends_with(".css") {
                return Ok(None);
            }
            if prelude.len() > 1 {
                return Err(LessError::syntax(
                    prelude.to_string(),
                    "只包含文件路径的字符串",
                    first.position,
                ));
            }
            Ok(Some(path.to_string()))
        }
        _ => Err(LessError::syntax(
            prelude.to_string(),
            "带有文件路径的字符串",
            first.position,
        )),
    }
}
