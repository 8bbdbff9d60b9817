use quill_markup::{KeySpec, MarkupConfig, MarkupError, NodeKind, Registry, Template, Using};

fn compile(markup: &str) -> std::sync::Arc<Template> {
    Registry::default().compile(markup).unwrap()
}

fn kinds(t: &Template, id: usize) -> Vec<NodeKind> {
    t.node(id).children.iter().map(|&c| t.node(c).kind).collect()
}

#[test]
fn unclosed_element_fails_to_build() {
    let err = Registry::default().compile("<div>").unwrap_err();
    assert_eq!(err, MarkupError::Unbalanced { tag: "div".into() });
    assert_eq!(err.to_string(), "build ast error: <div> is never closed");
}

#[test]
fn unknown_component_fails() {
    let err = Registry::default().compile("<div><my-card/></div>").unwrap_err();
    assert_eq!(err, MarkupError::ComponentNotFound { tag: "my-card".into() });
    assert_eq!(err.to_string(), "component my-card not found");
}

#[test]
fn components_resolve_directly_or_through_using() {
    let mut reg = Registry::default();
    reg.register("card", "<div><slot/></div>", &Using::new()).unwrap();
    let using = Using::from([("fancy-card".to_string(), "card".to_string())]);
    let t = reg
        .register("page", "<card>a</card><fancy-card>b</fancy-card>", &using)
        .unwrap();
    let root = t.root();
    for &id in &root.children {
        let node = t.node(id);
        assert_eq!(node.kind, NodeKind::Component);
        assert_eq!(node.component.as_ref().map(|c| c.0.as_str()), Some("card"));
    }
    assert_eq!(t.node(root.children[1]).tag, "fancy-card");
}

#[test]
fn reserved_tags_take_precedence() {
    let t = compile(
        r#"<slot/><template name="t"></template><block></block><import src="a"/><include src="b"/><wxs module="m"></wxs><span/>"#,
    );
    assert_eq!(
        kinds(&t, Template::ROOT),
        [
            NodeKind::Slot,
            NodeKind::TemplateDef,
            NodeKind::Block,
            NodeKind::Import,
            NodeKind::Include,
            NodeKind::ScriptModule,
            NodeKind::Native,
        ]
    );
}

#[test]
fn attributes_events_and_statements_are_separated() {
    let t = compile(
        r#"<div wx:if="{{ok}}" class="a {{b}}" checked capture-bind:tap="down" bind:tap="up" catchlongpress="hold"></div>"#,
    );
    let cond = t.node(t.root().children[0]);
    assert_eq!(cond.kind, NodeKind::If);
    assert_eq!(cond.statement.if_expr.as_ref().map(|p| p.source()), Some("{{ok}}"));

    let div = t.node(cond.children[0]);
    assert_eq!(div.kind, NodeKind::Native);
    let names: Vec<&str> = div.attrs.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["class", "checked"]);
    assert!(!div.statement.is_conditional());

    let tap = &div.events["tap"];
    assert_eq!(tap.len(), 2);
    assert!(tap[0].capture && !tap[0].catch && tap[0].handler == "down");
    assert!(!tap[1].capture && tap[1].handler == "up");
    assert!(div.events["longpress"][0].catch);
}

#[test]
fn loop_wraps_condition_wraps_element() {
    let t = compile(r#"<li wx:for="{{list}}" wx:for-item="row" wx:for-index="i" wx:key="id" wx:if="{{row.show}}">x</li>"#);
    let for_id = t.root().children[0];
    assert_eq!(t.node(for_id).kind, NodeKind::For);
    let item_id = t.node(for_id).children[0];
    let item = t.node(item_id);
    assert_eq!(item.kind, NodeKind::ForItem);
    assert_eq!(item.statement.for_item, "row");
    assert_eq!(item.statement.for_index, "i");
    assert!(matches!(&item.statement.for_key, Some(KeySpec::Field(f)) if f == "id"));
    assert_eq!(kinds(&t, item_id), [NodeKind::If]);
    let if_id = item.children[0];
    assert_eq!(kinds(&t, if_id), [NodeKind::Native]);
}

#[test]
fn loop_names_default_to_item_and_index() {
    let t = compile(r#"<p wx:for-items="{{list}}" wx:for-key="*this"></p>"#);
    let item = t.node(t.node(t.root().children[0]).children[0]);
    assert_eq!((item.statement.for_item.as_str(), item.statement.for_index.as_str()), ("item", "index"));
    assert!(matches!(item.statement.for_key, Some(KeySpec::This)));
}

#[test]
fn chains_link_only_to_conditional_siblings() {
    let t = compile(
        r#"<a wx:if="{{x}}"/><b wx:elif="{{y}}"/><i wx:else/><span>gap</span><p wx:else/>"#,
    );
    let ids = &t.root().children;
    assert_eq!(t.node(ids[0]).chain_prev, None);
    assert_eq!(t.node(ids[1]).chain_prev, Some(ids[0]));
    assert_eq!(t.node(ids[2]).chain_prev, Some(ids[1]));
    assert_eq!(t.node(ids[3]).kind, NodeKind::Native);
    assert_eq!(t.node(ids[4]).chain_prev, None);
}

#[test]
fn configured_tag_names_ignore_case() {
    let config = MarkupConfig {
        script_tag: "WXS".into(),
        native_tags: vec!["DIV".into()],
        ..MarkupConfig::default()
    };
    let t = Registry::new(config)
        .compile(r#"<WXS module="m">module.exports.x = 1;</WXS><Div>{{m.x}}</Div>"#)
        .unwrap();
    assert_eq!(kinds(&t, Template::ROOT), [NodeKind::ScriptModule, NodeKind::Native]);
    assert!(t.modules().contains_key("m"));
}

#[test]
fn looped_chain_members_stay_linked() {
    let t = compile(r#"<p wx:if="{{a}}">A</p><i wx:for="{{l}}" wx:else>{{item}}</i>"#);
    let ids = &t.root().children;
    let tail = t.node(ids[1]);
    assert_eq!(tail.kind, NodeKind::If);
    assert!(tail.statement.else_flag);
    assert_eq!(tail.chain_prev, Some(ids[0]));
    assert_eq!(kinds(&t, ids[1]), [NodeKind::For]);

    let t = compile(r#"<i wx:for="{{l}}" wx:if="{{a}}">{{item}}</i><p wx:else>none</p>"#);
    let ids = &t.root().children;
    let for_item = t.node(ids[0]).children[0];
    let head = t.node(for_item).children[0];
    assert_eq!(t.node(head).kind, NodeKind::If);
    assert_eq!(t.node(ids[1]).chain_prev, Some(head));
}

#[test]
fn text_is_trimmed_and_collapsed() {
    let t = compile("<p>\n   hello \n\n  {{ name }}  </p>\n   <p>   </p>");
    let p = t.node(t.root().children[0]);
    let text = t.node(p.children[0]);
    assert_eq!(text.kind, NodeKind::Text);
    assert_eq!(text.content.as_ref().map(|c| c.source()), Some("hello {{ name }}"));
    assert!(t.node(t.root().children[1]).children.is_empty());
}

#[test]
fn collapsing_can_be_turned_off() {
    let reg = Registry::new(MarkupConfig {
        collapse_whitespace: false,
        ..MarkupConfig::default()
    });
    let t = reg.compile("<p>  a   b  </p>").unwrap();
    let text = t.node(t.node(t.root().children[0]).children[0]);
    assert_eq!(text.content.as_ref().map(|c| c.source()), Some("a   b"));
}

#[test]
fn custom_namespace_and_script_tag() {
    let reg = Registry::new(MarkupConfig {
        namespace: "q-".into(),
        script_tag: "qs".into(),
        ..MarkupConfig::default()
    });
    let t = reg
        .compile(r#"<qs module="m">module.exports.v = 1;</qs><p q-if="{{m.v}}" wx:if="kept"></p>"#)
        .unwrap();
    assert_eq!(kinds(&t, Template::ROOT), [NodeKind::ScriptModule, NodeKind::If]);
    let p = t.node(t.node(t.root().children[1]).children[0]);
    assert_eq!(p.attrs[0].0, "wx:if");
    assert!(t.modules().contains_key("m"));
}

#[test]
fn broken_expressions_and_scripts_are_reported() {
    assert!(matches!(
        Registry::default().compile("<p>{{ a + }}</p>"),
        Err(MarkupError::Expression { .. })
    ));
    assert!(matches!(
        Registry::default().compile("<wxs module=\"bad\">module.exports = ;</wxs>"),
        Err(MarkupError::Script { module, .. }) if module == "bad"
    ));
}

#[test]
fn outline_lists_every_node() {
    let t = compile(r#"<div wx:for="{{l}}" bind:tap="go">{{item}}</div>"#);
    let outline = t.outline();
    let lines: Vec<&str> = outline.lines().collect();
    assert_eq!(lines[0], "Root");
    assert_eq!(lines[1], "  For for=\"{{l}}\"");
    assert_eq!(lines[2], "    ForItem item=item index=index");
    assert_eq!(lines[3], "      Native <div> bind:tap=go");
    assert_eq!(lines[4], "        Text \"{{item}}\"");
}
