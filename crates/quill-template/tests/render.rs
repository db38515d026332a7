use quill_template::prelude::*;
use serde_json::json;

fn data(value: serde_json::Value) -> DataContext {
    DataContext::from_json(&value).expect("test data must be an object")
}

fn render(templates: &[(&str, &str)], name: &str, ctx: &DataContext) -> String {
    let mut registry = TemplateRegistry::new();
    for (n, src) in templates {
        registry.add(*n, src).unwrap();
    }
    registry.render_to_string(name, ctx).unwrap()
}

fn render_one(src: &str, ctx: &DataContext) -> String {
    render(&[("main", src)], "main", ctx)
}

// ── static markup ─────────────────────────────────────────────────────────

#[test]
fn static_markup_renders_verbatim() {
    let empty = DataContext::new();
    assert_eq!(render_one("<div></div>", &empty), "<div></div>");
    assert_eq!(render_one("<div>word</div>", &empty), "<div>word</div>");
    assert_eq!(
        render_one(r#"<ul class="a"><li>1</li><li>2</li></ul>"#, &empty),
        r#"<ul class="a"><li>1</li><li>2</li></ul>"#
    );
}

#[test]
fn wrapper_root_renders_only_its_children() {
    assert_eq!(render_one("<t><b>x</b><i>y</i></t>", &DataContext::new()), "<b>x</b><i>y</i>");
}

// ── t-esc / t-raw ─────────────────────────────────────────────────────────

#[test]
fn esc_escapes_and_raw_does_not() {
    let ctx = data(json!({ "var": "<ok>" }));
    assert_eq!(render_one(r#"<div><t t-esc="var"/></div>"#, &ctx), "<div>&lt;ok&gt;</div>");
    assert_eq!(render_one(r#"<div><t t-raw="var"/></div>"#, &ctx), "<div><ok></div>");
}

#[test]
fn every_special_character_is_escaped() {
    let ctx = data(json!({ "var": "&<>\"'`" }));
    assert_eq!(
        render_one(r#"<p t-esc="var"/>"#, &ctx),
        "<p>&amp;&lt;&gt;&quot;&#x27;&#x60;</p>"
    );
}

#[test]
fn esc_on_an_element_fills_it() {
    let ctx = data(json!({ "name": "Ana" }));
    assert_eq!(
        render_one(r#"<span class="n" t-esc="name"/>"#, &ctx),
        r#"<span class="n">Ana</span>"#
    );
}

#[test]
fn missing_values_fall_back_to_children() {
    let ctx = data(json!({ "zero": 0, "nothing": null }));
    for src in [
        r#"<div><t t-esc="missing">default</t></div>"#,
        r#"<div><t t-esc="nothing">default</t></div>"#,
    ] {
        assert_eq!(render_one(src, &ctx), "<div>default</div>");
    }
    assert_eq!(render_one(r#"<div><t t-esc="zero">default</t></div>"#, &ctx), "<div>0</div>");
}

#[test]
fn zero_placeholder_without_a_caller_is_a_literal() {
    assert_eq!(render_one(r#"<div><t t-esc="0"/></div>"#, &DataContext::new()), "<div>0</div>");
}

// ── t-set ─────────────────────────────────────────────────────────────────

#[test]
fn set_binds_an_expression() {
    let src = r#"<div><t t-set="value" t-value="'ok'"/><t t-esc="value"/></div>"#;
    assert_eq!(render_one(src, &DataContext::new()), "<div>ok</div>");
}

#[test]
fn set_without_value_binds_content() {
    let src = r#"<div><t t-set="v"><b>bold</b></t><t t-esc="v"/></div>"#;
    assert_eq!(render_one(src, &DataContext::new()), "<div><b>bold</b></div>");
}

#[test]
fn set_bindings_chain() {
    let src = r#"<div><t t-set="a" t-value="n + 1"/><t t-set="b" t-value="a"/><t t-esc="b"/></div>"#;
    assert_eq!(render_one(src, &data(json!({ "n": 41 }))), "<div>42</div>");
}

// ── expressions ───────────────────────────────────────────────────────────

#[test]
fn expressions_read_the_data_context() {
    let ctx = data(json!({ "user": { "name": "Ana", "tags": ["a", "b", "c"] }, "n": 3 }));
    assert_eq!(render_one(r#"<p t-esc="user.name"/>"#, &ctx), "<p>Ana</p>");
    assert_eq!(render_one(r#"<p t-esc="user.tags.length"/>"#, &ctx), "<p>3</p>");
    assert_eq!(render_one(r#"<p t-esc="user.tags[1]"/>"#, &ctx), "<p>b</p>");
    assert_eq!(render_one(r#"<p t-esc="n * 2 + 1"/>"#, &ctx), "<p>7</p>");
    assert_eq!(render_one(r#"<p t-esc="n &gt; 2 ? 'big' : 'small'"/>"#, &ctx), "<p>big</p>");
    assert_eq!(render_one(r#"<p t-esc="typeof missing"/>"#, &ctx), "<p>undefined</p>");
}

#[test]
fn member_of_nothing_is_an_error() {
    let mut registry = TemplateRegistry::new();
    registry.add("main", r#"<p t-esc="ghost.name"/>"#).unwrap();
    let err = registry.render("main", &DataContext::new()).unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::Eval(_))), "got {err:?}");
}

// ── t-if / t-elif / t-else ────────────────────────────────────────────────

#[test]
fn conditional_chain_picks_exactly_one_branch() {
    let src = r#"<div>
        <t t-if="n == 1">one</t>
        <t t-elif="n == 2">two</t>
        <t t-else="">many</t>
    </div>"#;
    let pick = |n: i32| render_one(src, &DataContext::new().with("n", n));
    assert_eq!(pick(1).trim_end_matches("\n    </div>"), "<div>\n        one");
    assert!(pick(2).contains("two") && !pick(2).contains("one") && !pick(2).contains("many"));
    assert!(pick(3).contains("many") && !pick(3).contains("two"));
}

#[test]
fn if_on_an_element_guards_the_element() {
    let src = r#"<div><p t-if="show">yes</p><p t-else="">no</p></div>"#;
    assert_eq!(render_one(src, &DataContext::new().with("show", true)), "<div><p>yes</p></div>");
    assert_eq!(render_one(src, &DataContext::new().with("show", false)), "<div><p>no</p></div>");
}

#[test]
fn chains_are_per_sibling_list() {
    let src = r#"<div><t t-if="a">A</t><b/><t t-if="b">B</t><t t-else="">!B</t></div>"#;
    let ctx = data(json!({ "a": true, "b": false }));
    assert_eq!(render_one(src, &ctx), "<div>A<b></b>!B</div>");
}

// ── t-foreach ─────────────────────────────────────────────────────────────

#[test]
fn loop_exposes_metadata() {
    let src = r#"<div><t t-foreach="items" t-as="x">[<t t-esc="x_index"/>:<t t-esc="x"/>:<t t-esc="x_value"/>:<t t-esc="x_parity"/>]</t></div>"#;
    let ctx = data(json!({ "items": [10, 20, 30] }));
    assert_eq!(render_one(src, &ctx), "<div>[0:10:10:even][1:20:20:odd][2:30:30:even]</div>");
}

#[test]
fn loop_marks_first_and_last() {
    let src = r#"<p><t t-foreach="items" t-as="x"><t t-if="x_first">(</t><t t-esc="x"/><t t-if="x_last">)</t></t></p>"#;
    assert_eq!(render_one(src, &data(json!({ "items": ["a", "b", "c"] }))), "<p>(abc)</p>");
}

#[test]
fn loop_metadata_is_restored_afterwards() {
    let mut registry = TemplateRegistry::new();
    registry
        .add("main", r#"<p><t t-foreach="items" t-as="x"><t t-esc="x"/></t>|<t t-esc="x"/></p>"#)
        .unwrap();
    let ctx = data(json!({ "items": [1, 2], "x": "outer" }));
    assert_eq!(registry.render_to_string("main", &ctx).unwrap(), "<p>12|outer</p>");
    assert_eq!(ctx.get("x"), Value::from("outer"));
    assert!(!ctx.contains("x_index"));
    assert!(!ctx.contains("x_first"));
}

#[test]
fn loop_metadata_is_restored_when_the_body_fails() {
    let mut registry = TemplateRegistry::new();
    registry
        .add("main", r#"<t t-foreach="xs" t-as="x"><t t-esc="nope.deep"/></t>"#)
        .unwrap();
    let ctx = data(json!({ "xs": [1, 2] }));
    assert!(registry.render("main", &ctx).is_err());
    assert!(!ctx.contains("x"));
    assert!(!ctx.contains("x_index"));
    assert!(!ctx.contains("x_value"));

    let nested = r#"<p><t t-foreach="rows" t-as="r"><t t-foreach="r" t-as="x"><t t-esc="x.a.b"/></t></t></p>"#;
    registry.add("nested", nested).unwrap();
    let ctx = data(json!({ "rows": [[1]], "x": "kept" }));
    assert!(registry.render("nested", &ctx).is_err());
    assert_eq!(ctx.get("x"), Value::from("kept"));
    assert!(!ctx.contains("r"));
    assert!(!ctx.contains("r_first"));
}

#[test]
fn loop_over_an_object_yields_keys_and_values() {
    let src = r#"<p><t t-foreach="map" t-as="k"><t t-esc="k"/>=<t t-esc="k_value"/>;</t></p>"#;
    assert_eq!(render_one(src, &data(json!({ "map": { "a": 1, "b": 2 } }))), "<p>a=1;b=2;</p>");
}

#[test]
fn loop_over_a_number_counts() {
    let src = r#"<p><t t-foreach="3" t-as="i"><t t-esc="i"/></t></p>"#;
    assert_eq!(render_one(src, &DataContext::new()), "<p>012</p>");
}

#[test]
fn nested_loops_keep_their_own_names() {
    let src = r#"<p><t t-foreach="rows" t-as="r"><t t-foreach="r" t-as="c"><t t-esc="c"/></t>;</t></p>"#;
    assert_eq!(render_one(src, &data(json!({ "rows": [[1, 2], [3]] }))), "<p>12;3;</p>");
}

#[test]
fn loop_repeats_children_of_an_element() {
    let src = r#"<ul t-foreach="items" t-as="x"><li t-esc="x"/></ul>"#;
    assert_eq!(render_one(src, &data(json!({ "items": [1, 2] }))), "<li>1</li><li>2</li>");
}

#[test]
fn undefined_loop_source_is_not_iterable() {
    let mut registry = TemplateRegistry::new();
    registry.add("main", r#"<p><t t-foreach="missing" t-as="x"/></p>"#).unwrap();
    assert_eq!(
        registry.render("main", &DataContext::new()).unwrap_err(),
        Error::Render(RenderError::NotIterable { found: "undefined" })
    );
}

// ── attributes ────────────────────────────────────────────────────────────

#[test]
fn dynamic_attributes_are_set_when_truthy() {
    let src = r#"<a class="link" t-att-href="url" t-att-title="missing" t-att-hidden="flag">x</a>"#;
    let ctx = data(json!({ "url": "/home", "flag": false }));
    assert_eq!(render_one(src, &ctx), r#"<a class="link" href="/home">x</a>"#);
}

#[test]
fn interpolated_attributes() {
    let src = r#"<li t-attf-class="item {{kind}}-{{n}}"/>"#;
    let ctx = data(json!({ "kind": "big", "n": 2 }));
    assert_eq!(render_one(src, &ctx), r#"<li class="item big-2"></li>"#);
}

#[test]
fn spread_accepts_a_pair_or_a_mapping() {
    let empty = DataContext::new();
    assert_eq!(
        render_one(r#"<div t-att="['data-x', 'y']"/>"#, &empty),
        r#"<div data-x="y"></div>"#
    );
    assert_eq!(
        render_one(r#"<div t-att="{'a': 1, 'b': 'two'}"/>"#, &empty),
        r#"<div a="1" b="two"></div>"#
    );
    let ctx = data(json!({ "attrs": { "id": "z" } }));
    assert_eq!(render_one(r#"<div t-att="attrs"/>"#, &ctx), r#"<div id="z"></div>"#);
}

// ── t-call ────────────────────────────────────────────────────────────────

#[test]
fn call_injects_caller_content() {
    let templates = [
        ("card", r#"<div class="card"><t t-esc="0"/></div>"#),
        ("main", r#"<section><t t-call="card"><b>hi</b></t></section>"#),
    ];
    assert_eq!(
        render(&templates, "main", &DataContext::new()),
        r#"<section><div class="card"><b>hi</b></div></section>"#
    );
}

#[test]
fn call_sees_bindings_from_the_call_site() {
    let templates = [
        ("greet", r#"<p>Hi <t t-esc="who"/></p>"#),
        ("main", r#"<div><t t-call="greet"><t t-set="who" t-value="'Ana'"/></t></div>"#),
    ];
    assert_eq!(render(&templates, "main", &DataContext::new()), "<div><p>Hi Ana</p></div>");
}

#[test]
fn nested_callers_resolve_to_their_own_content() {
    let templates = [
        ("frame", r#"<main><t t-esc="0"/></main>"#),
        ("card", r#"<div><t t-esc="0"/></div>"#),
        ("page", r#"<body><t t-call="frame"><t t-call="card"><i>x</i></t></t></body>"#),
    ];
    assert_eq!(
        render(&templates, "page", &DataContext::new()),
        "<body><main><div><i>x</i></div></main></body>"
    );
}

#[test]
fn conditional_call() {
    let templates = [("inner", "<b>in</b>"), ("main", r#"<p><t t-if="on" t-call="inner"/></p>"#)];
    let on = DataContext::new().with("on", true);
    assert_eq!(render(&templates, "main", &on), "<p><b>in</b></p>");
    assert_eq!(render(&templates, "main", &DataContext::new().with("on", false)), "<p></p>");
}

// ── events ────────────────────────────────────────────────────────────────

#[test]
fn event_handlers_update_the_data_context() {
    let mut registry = TemplateRegistry::new();
    registry
        .add(
            "counter",
            r#"<div><button t-on-click="increment">+</button><span t-esc="count"/></div>"#,
        )
        .unwrap();
    let ctx = DataContext::new().with("count", 0).with(
        "increment",
        Value::function(|data, _event| {
            let next = data.get("count").to_number() + 1.0;
            data.set("count", next);
        }),
    );

    let root = registry.render("counter", &ctx).unwrap();
    let doc = registry.document();
    let buttons = doc.find_by_tag(root, "button");
    assert_eq!(buttons.len(), 1);
    assert_eq!(doc.dispatch(buttons[0], &Event::new("click")), 1);
    assert_eq!(doc.dispatch(buttons[0], &Event::new("keydown")), 0);
    assert_eq!(ctx.get("count"), Value::from(1));

    let html = registry.render_to_string("counter", &ctx).unwrap();
    assert!(html.ends_with("<span>1</span></div>"), "got {html}");
}

#[test]
fn non_function_handler_is_an_error() {
    let mut registry = TemplateRegistry::new();
    registry.add("main", r#"<button t-on-click="nope"/>"#).unwrap();
    let err = registry.render("main", &DataContext::new().with("nope", 3)).unwrap_err();
    assert_eq!(
        err,
        Error::Render(RenderError::NotAFunction { handler: "nope".into(), found: "number" })
    );
}

// ── registry ──────────────────────────────────────────────────────────────

#[test]
fn rendering_is_repeatable() {
    let mut registry = TemplateRegistry::new();
    registry
        .add("main", r#"<ul><t t-foreach="items" t-as="x"><li t-esc="x"/></t></ul>"#)
        .unwrap();
    let ctx = data(json!({ "items": ["a", "b"] }));
    let first = registry.render_to_string("main", &ctx).unwrap();
    let second = registry.render_to_string("main", &ctx).unwrap();
    assert_eq!(first, "<ul><li>a</li><li>b</li></ul>");
    assert_eq!(first, second);
}

#[test]
fn structural_errors_are_rejected_when_added() {
    let mut registry = TemplateRegistry::new();
    let err = registry.add("main", r#"<div><p t-if="a"/>text<p t-else=""/></div>"#).unwrap_err();
    assert!(matches!(err, CompileError::InvalidDirectiveStructure(_)));
    assert!(!registry.contains("main"));
}

#[test]
fn listing_shows_the_compiled_program() {
    let mut registry = TemplateRegistry::new();
    registry.add("main", r#"<p t-if="a">x</p>"#).unwrap();
    let listing = registry.listing("main").unwrap();
    assert!(listing.lines().count() > 3);
    assert!(registry.is_compiled("main"));
}
