use crate::ast::{AtRule, Declaration, Ruleset, Statement, Stylesheet};
use crate::utils::{compact, indent, minify_selector, minify_value};

/// 负责将扁平化的样式表转换为最终 CSS 文本。
pub struct Serializer {
    minify: bool,
}

impl Serializer {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    pub fn to_css(&self, stylesheet: &Stylesheet) -> String {
        if self.minify {
            self.render_minified(stylesheet)
        } else {
            self.render_pretty(stylesheet)
        }
    }

    fn render_pretty(&self, stylesheet: &Stylesheet) -> String {
        let mut blocks = Vec::new();
        for statement in stylesheet.statements() {
            let mut output = String::new();
            match statement {
                Statement::Ruleset(ruleset) => self.render_ruleset_pretty(ruleset, 0, &mut output),
                Statement::AtRule(at_rule) => self.render_at_rule_pretty(at_rule, 0, &mut output),
            }
            if !output.is_empty() {
                blocks.push(output);
            }
        }
        let mut css = blocks.join("\n");
        if !css.is_empty() {
            css.truncate(css.trim_end().len());
            css.push('\n');
        }
        css
    }

    fn render_minified(&self, stylesheet: &Stylesheet) -> String {
        let mut output = String::new();
        for statement in stylesheet.statements() {
            match statement {
                Statement::Ruleset(ruleset) => self.render_ruleset_minified(ruleset, &mut output),
                Statement::AtRule(at_rule) => self.render_at_rule_minified(at_rule, &mut output),
            }
        }
        output
    }

    fn format_declaration(&self, decl: &Declaration) -> String {
        format!("{}: {};", decl.property, decl.value)
    }

    fn format_declaration_minified(&self, decl: &Declaration) -> String {
        format!("{}:{}", decl.property, minify_value(&decl.value))
    }

    fn render_ruleset_pretty(&self, ruleset: &Ruleset, level: usize, output: &mut String) {
        if ruleset.declarations.is_empty() {
            return;
        }
        output.push_str(&indent(level));
        output.push_str(&ruleset.selector.to_string());
        output.push_str(" {\n");
        for decl in &ruleset.declarations {
            output.push_str(&indent(level + 1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        output.push_str(&indent(level));
        output.push_str("}\n");
    }

    fn render_at_rule_pretty(&self, at_rule: &AtRule, level: usize, output: &mut String) {
        output.push_str(&indent(level));
        output.push_str(&at_rule.keyword);
        if !at_rule.prelude.is_empty() {
            output.push(' ');
            output.push_str(&at_rule.prelude.to_string());
        }
        match &at_rule.block {
            Some(block) => {
                output.push(' ');
                output.push_str(&block.to_string());
                output.push('\n');
            }
            None => output.push_str(";\n"),
        }
    }

    fn render_ruleset_minified(&self, ruleset: &Ruleset, output: &mut String) {
        if ruleset.declarations.is_empty() {
            return;
        }
        output.push_str(&minify_selector(ruleset.selector.tokens()));
        output.push('{');
        for (idx, decl) in ruleset.declarations.iter().enumerate() {
            if idx > 0 {
                output.push(';');
            }
            output.push_str(&self.format_declaration_minified(decl));
        }
        output.push('}');
    }

    fn render_at_rule_minified(&self, at_rule: &AtRule, output: &mut String) {
        output.push_str(&at_rule.keyword);
        if !at_rule.prelude.is_empty() {
            output.push(' ');
            output.push_str(&compact(&at_rule.prelude));
        }
        match &at_rule.block {
            Some(block) => output.push_str(&compact(block)),
            None => output.push(';'),
        }
    }
}
