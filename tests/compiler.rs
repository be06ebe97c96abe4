use less_grammar::{compile, compile_file, parse, CompileOptions, Extensions, LessError, Serializer};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn minified() -> CompileOptions {
    CompileOptions {
        minify: true,
        ..CompileOptions::default()
    }
}

fn plain_css() -> CompileOptions {
    CompileOptions {
        extensions: Extensions::css(),
        ..CompileOptions::default()
    }
}

fn assert_round_trip(source: &str) {
    let first = parse(source, &CompileOptions::default()).unwrap();
    let css = Serializer::new(false).to_css(&first);
    let second = parse(&css, &plain_css()).unwrap();
    assert_eq!(second, first);
}

#[test]
fn variable_and_nesting() {
    let src = r"@spacing: 8px;
.container {
  padding: @spacing;
  .title {
    margin-bottom: @spacing;
  }
}";
    let css = compile(src, CompileOptions::default()).unwrap();
    assert_eq!(
        css,
        ".container {\n  padding: 8px;\n}\n\n.container .title {\n  margin-bottom: 8px;\n}\n"
    );
}

#[test]
fn minify_output() {
    let src = r".demo {
  color: #333;
  font-weight: bold;
}";
    let css = compile(src, minified()).unwrap();
    assert_eq!(css, ".demo{color:#333;font-weight:bold}");
}

#[test]
fn mixin_default_and_override() {
    let src = r".shadow(@x: 0, @y: 2px, @blur: 4px) {
  box-shadow: @x @y @blur rgba(0, 0, 0, 0.4);
}

.dialog {
  .shadow();
}

.dialog-elevated {
  .shadow(0, 8px, 16px);
}";
    let css = compile(src, minified()).unwrap();
    assert!(css.contains(".dialog{box-shadow:0 2px 4px rgba(0, 0, 0, 0.4)}"));
    assert!(css.contains(".dialog-elevated{box-shadow:0 8px 16px rgba(0, 0, 0, 0.4)}"));
}

#[test]
fn plain_css_parses_identically_in_both_modes() {
    let src = r#"@charset "utf-8";
html, body { margin: 0; padding: 0 }
a[href~="x"] > span:first-child { color: red; background: url(a.png) no-repeat }
@media print { body { color: black } }
li:nth-child(2n+1) { font: 12px/1.5 "Helvetica Neue", sans-serif }"#;
    let less = parse(src, &CompileOptions::default()).unwrap();
    let css = parse(src, &plain_css()).unwrap();
    assert_eq!(less, css);
    let selectors: Vec<_> = css.rulesets().map(|r| r.selector.to_string()).collect();
    assert_eq!(
        selectors,
        vec![
            "html, body",
            "a[href~=\"x\"] > span:first-child",
            "li:nth-child(2n+1)"
        ]
    );
}

#[test]
fn nested_rule_is_flattened_to_top_level() {
    let sheet = parse(".a { .b { color: red; } }", &CompileOptions::default()).unwrap();
    let rulesets: Vec<_> = sheet.rulesets().collect();
    assert_eq!(rulesets.len(), 1);
    assert_eq!(rulesets[0].selector.to_string(), ".a .b");
    assert_eq!(rulesets[0].declarations[0].property, "color");
    assert_eq!(rulesets[0].declarations[0].value.to_string(), "red");
}

#[test]
fn variable_resolution_precedence() {
    let css = compile(
        "@x: 1; .a { @x: 2; color: @x; } .b { color: @x; }",
        minified(),
    )
    .unwrap();
    assert_eq!(css, ".a{color:2}.b{color:1}");
}

#[test]
fn overloads_expand_by_argument_count() {
    let src = ".m(@a) { one: @a; }
.m(@a; @b) { two: @b; }
.m(@a; @b: x) { both: @b; }";
    let single = compile(&format!("{src} .c {{ .m(1); }}"), minified()).unwrap();
    assert_eq!(single, ".c{one:1;both:x}");
    let pair = compile(&format!("{src} .c {{ .m(1; 2); }}"), minified()).unwrap();
    assert_eq!(pair, ".c{two:2;both:2}");
}

#[test]
fn false_guard_contributes_nothing() {
    let src = ".m(@a) when (@a > 10) { big: yes; }
.m(@a) when not (@a > 10) { small: yes; }
.c { .m(3); }";
    let css = compile(src, minified()).unwrap();
    assert_eq!(css, ".c{small:yes}");
}

#[test]
fn guard_predicates_and_literals() {
    let src = ".m(@v) when (isnumber(@v)) { kind: number; }
.m(@v) when (iscolor(@v)) { kind: color; }
.m(@v) when (isstring(@v)) { kind: string; }
.a { .m(10px); }
.b { .m(#fff); }
.c { .m(\"x\"); }";
    let css = compile(src, minified()).unwrap();
    assert_eq!(css, ".a{kind:number}.b{kind:color}.c{kind:string}");
}

#[test]
fn mixin_bodies_resolve_calls_after_binding() {
    let src = ".outer(@size) {
  .inner(@size);
  .base;
}
.page { .outer(12px); }
.inner(@s) when (@s > 10px) { font-size: @s; }
.base { margin: 0; }";
    let css = compile(src, minified()).unwrap();
    assert_eq!(css, ".page{font-size:12px;margin:0}.base{margin:0}");
}

#[test]
fn deferred_plain_mixins_are_copied_once_complete() {
    let css = compile(".b { .c; } .a { .b; } .c { x: 1; }", minified()).unwrap();
    assert_eq!(css, ".b{x:1}.a{x:1}.c{x:1}");
}

#[test]
fn minified_strings_are_untouched() {
    let css = compile("q::after { content: \"hi !there\" !important; }", minified()).unwrap();
    assert_eq!(css, "q::after{content:\"hi !there\"!important}");
}

#[test]
fn unresolved_mixin_halts_compilation() {
    let err = compile(".a { color: red; .nonexistent-mixin(); }", CompileOptions::default())
        .unwrap_err();
    match err {
        LessError::UnresolvedMixin { selector, .. } => assert_eq!(selector, ".nonexistent-mixin()"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(parse(".a { .missing; }", &CompileOptions::default()).is_err());
}

#[test]
fn errors_do_not_leak_into_later_compilations() {
    assert!(compile(".a { .b { c: @nope; } }", CompileOptions::default()).is_err());
    let css = compile("@nope: 1; .a { c: @nope; }", minified()).unwrap();
    assert_eq!(css, ".a{c:1}");
}

#[test]
fn round_trip_without_shell_rulesets() {
    assert_round_trip(".a { .b { color: red; } }");
}

#[test]
fn round_trip_of_nested_fixture() {
    assert_round_trip(include_str!("../fixtures/nested.less"));
}

#[test]
fn round_trip_of_mixins_fixture() {
    assert_round_trip(include_str!("../fixtures/mixins.less"));
}

#[test]
fn round_trip_with_at_rules_and_escapes() {
    assert_round_trip(
        r#"@import "reset.css";
@w: 10px;
.box { width: ~"calc(100% - @{w})"; &:hover { color: red } }
@media screen and (max-width: 768px) { .box { width: auto } }
@font-face { font-family: "Icons"; src: url(icons.woff2) }"#,
    );
}

#[test]
fn mixins_fixture_expands_every_call() {
    let css = compile(include_str!("../fixtures/mixins.less"), CompileOptions::default()).unwrap();
    assert!(css.contains(
        ".panel {\n  border: 1px solid #ccc;\n  box-shadow: 0 2px 6px rgba(0, 0, 0, .3);\n  padding: 4px;\n  margin: 4px;\n  color: #eee;\n  background: #222;\n  border-color: #222;\n}"
    ));
    assert!(css.contains(
        ".card {\n  transition: opacity .2s ease-in;\n  padding: 0;\n  border-radius: 4px;\n}"
    ));
    assert!(css.contains("box-shadow: 0 1px 4px rgba(0, 0, 0, .3);"));
    assert!(!css.contains(".shadow"));
}

#[test]
fn selector_lists_and_parent_references() {
    let sheet = parse(include_str!("../fixtures/nested.less"), &CompileOptions::default()).unwrap();
    let selectors: Vec<_> = sheet
        .rulesets()
        .filter(|r| !r.declarations.is_empty())
        .map(|r| r.selector.to_string())
        .collect();
    assert_eq!(
        selectors,
        vec![
            ".nav",
            ".nav > li",
            ".nav > li a",
            ".nav > li a:hover, .nav > li a:active",
            ".nav > li a:hover .label, .nav > li a:hover .hint, .nav > li a:active .label, .nav > li a:active .hint",
            ".nav > li + li",
            ".sidebar .header, .drawer .header",
            ".sidebar .header h1, .sidebar .header h2, .drawer .header h1, .drawer .header h2",
        ]
    );
}

#[test]
fn compile_file_expands_imports() {
    let css = compile_file(fixtures().join("imports/main.less"), minified()).unwrap();
    assert_eq!(
        css,
        "@import \"reset.css\";.imported-rule{display:block}.card{border-radius:6px;color:#222;background:#fafafa}"
    );
}

#[test]
fn include_paths_are_searched() {
    let options = CompileOptions {
        minify: true,
        include_paths: vec![fixtures().join("imports")],
        ..CompileOptions::default()
    };
    let css = compile("@import \"mixins\";\n.x { .rounded(); }", options).unwrap();
    assert!(css.ends_with(".x{border-radius:4px}"));
}

#[test]
fn circular_imports_are_detected() {
    let err = compile_file(fixtures().join("imports/circular/a.less"), CompileOptions::default())
        .unwrap_err();
    assert!(matches!(err.root(), LessError::CircularImport { .. }));
}

#[test]
fn errors_inside_imports_name_the_file() {
    let err = compile_file(fixtures().join("imports/broken.less"), CompileOptions::default())
        .unwrap_err();
    assert!(err.is_syntax());
    assert!(matches!(err, LessError::Imported { ref path, .. } if path.ends_with("unclosed.less")));
    assert!(matches!(err.root(), LessError::Unterminated { closer: "}", .. }));
}

#[test]
fn missing_imports_are_reported() {
    let err = compile_file(fixtures().join("imports/missing.less"), CompileOptions::default())
        .unwrap_err();
    assert!(matches!(err, LessError::ImportNotFound { ref target } if target == "nowhere"));
}

#[test]
fn malformed_import_is_a_syntax_error() {
    let err = compile("@import mixins;", CompileOptions::default()).unwrap_err();
    assert!(err.is_syntax());
}
