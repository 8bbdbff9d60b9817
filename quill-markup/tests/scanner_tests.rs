use quill_markup::MarkupError;
use quill_markup::scanner::{EndKind, Handler, RawAttr, scan};

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Handler for Recorder {
    fn start(&mut self, tag: &str, attrs: Vec<RawAttr>, self_closing: bool) -> quill_markup::Result<()> {
        let attrs: Vec<String> = attrs
            .into_iter()
            .map(|a| match a.value {
                Some(v) => format!("{}={v}", a.name),
                None => a.name,
            })
            .collect();
        let slash = if self_closing { " /" } else { "" };
        self.events.push(format!("start {tag}[{}]{slash}", attrs.join(",")));
        Ok(())
    }

    fn end(&mut self, tag: &str, kind: EndKind) -> quill_markup::Result<()> {
        self.events.push(format!("end {tag} {kind:?}"));
        Ok(())
    }

    fn text(&mut self, text: &str) -> quill_markup::Result<()> {
        self.events.push(format!("text {text:?}"));
        Ok(())
    }
}

fn events(markup: &str) -> Vec<String> {
    let mut rec = Recorder::default();
    scan(markup, "wxs", &mut rec).unwrap();
    rec.events
}

#[test]
fn nested_self_closing_slot() {
    assert_eq!(
        events("<div><slot/></div>"),
        ["start div[]", "start slot[] /", "end div Explicit"]
    );
}

#[test]
fn comments_are_stripped() {
    assert_eq!(
        events("<div><!-- <span>hidden</span> -->shown</div>"),
        ["start div[]", "text \"shown\"", "end div Explicit"]
    );
}

#[test]
fn attribute_forms_and_case() {
    assert_eq!(
        events(r#"<DIV id="a" class='b c' data-x=1 hidden bind:tap="onTap"></DIV>"#),
        ["start div[id=a,class=b c,data-x=1,hidden,bind:tap=onTap]", "end div Explicit"]
    );
}

#[test]
fn ancestor_end_tag_closes_inner_elements() {
    assert_eq!(
        events("<div>a<span>b</div>"),
        [
            "start div[]",
            "text \"a\"",
            "start span[]",
            "text \"b\"",
            "end span Implicit",
            "end div Explicit",
        ]
    );
}

#[test]
fn stray_end_tag_is_ignored() {
    assert_eq!(events("</p><div></div>"), ["start div[]", "end div Explicit"]);
}

#[test]
fn open_tags_are_closed_at_end_of_input() {
    assert_eq!(
        events("<div><span>"),
        ["start div[]", "start span[]", "end span EndOfInput", "end div EndOfInput"]
    );
}

#[test]
fn script_body_is_raw() {
    let body = r#"var a = "<b>"; if (a < 1) { module.exports.x = '</div>'; }"#;
    let markup = format!(r#"<wxs module="m1">{body}</wxs><div/>"#);
    assert_eq!(
        events(&markup),
        vec![
            "start wxs[module=m1]".to_string(),
            format!("text {body:?}"),
            "end wxs Explicit".to_string(),
            "start div[] /".to_string(),
        ]
    );
}

#[test]
fn unterminated_script_body_runs_to_end() {
    assert_eq!(
        events("<wxs module=\"m\">a < b"),
        ["start wxs[module=m]", "text \"a < b\"", "end wxs EndOfInput"]
    );
}

#[test]
fn lone_angle_bracket_is_a_scan_error() {
    let mut rec = Recorder::default();
    let err = scan("<div>1 < 2</div>", "wxs", &mut rec).unwrap_err();
    match err {
        MarkupError::Scan { offset, fragment } => {
            assert_eq!(offset, 7);
            assert_eq!(fragment, "< 2</div>");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
