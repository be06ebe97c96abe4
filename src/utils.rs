use crate::token::{Token, TokenList};

/// 按词法单元输出，空白统一为一个空格并去掉首尾空白。
/// `keep_space(prev, next)` 为假时省略两者之间的空白；字符串内容不受影响。
fn render_compact(tokens: &TokenList, keep_space: impl Fn(&Token, &Token) -> bool) -> String {
    let slice = tokens.as_slice();
    let mut output = String::new();
    for (idx, token) in slice.iter().enumerate() {
        if !token.is_whitespace() {
            output.push_str(&token.text);
            continue;
        }
        let prev = idx.checked_sub(1).and_then(|prev| slice.get(prev));
        match (prev, slice.get(idx + 1)) {
            (Some(prev), Some(next)) if !prev.is_whitespace() && keep_space(prev, next) => {
                output.push(' ')
            }
            _ => {}
        }
    }
    output
}

pub fn compact(tokens: &TokenList) -> String {
    render_compact(tokens, |_, _| true)
}

/// 压缩模式下的属性值：`!important` 前不保留空白。
pub fn minify_value(value: &TokenList) -> String {
    render_compact(value, |_, next| !next.is_char('!'))
}

/// 压缩模式下的选择器：列表逗号后不保留空白。
pub fn minify_selector(selector: &TokenList) -> String {
    render_compact(selector, |prev, _| !prev.is_char(','))
}

pub fn indent(level: usize) -> String {
    "  ".repeat(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn tokens(source: &str) -> TokenList {
        TokenList::from(Tokenizer::new(source, false).tokenize().unwrap())
    }

    #[test]
    fn compact_collapses_and_trims_whitespace() {
        assert_eq!(compact(&tokens("  a \n\t b  ")), "a b");
    }

    #[test]
    fn minified_values_and_selectors() {
        assert_eq!(minify_value(&tokens("0  auto !important")), "0 auto!important");
        assert_eq!(minify_selector(&tokens(".a .b, .c")), ".a .b,.c");
        assert_eq!(indent(2), "    ");
    }

    #[test]
    fn quoted_text_is_left_alone() {
        assert_eq!(minify_value(&tokens("\"hi !there\"")), "\"hi !there\"");
        assert_eq!(
            minify_selector(&tokens("a[title=\"x, y\"], b")),
            "a[title=\"x, y\"],b"
        );
        assert_eq!(compact(&tokens("\"a   b\"  c")), "\"a   b\" c");
    }
}
