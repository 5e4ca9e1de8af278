#![cfg(unstable)]
#![feature(test)]
extern crate test;

use tapeson::{CompressMode, Parser};

/// Stand-in for the fixture files the upstream bench suite reads off disk:
/// a structured, moderately nested log-event shape with enough string and
/// array content to be representative of real input.
fn event_10kb() -> String {
    let mut stacktrace = String::from("[");
    for i in 0..120 {
        if i > 0 {
            stacktrace.push(',');
        }
        stacktrace.push_str(&format!(
            r#"{{"file":"src/module_{i}.rs","line":{line},"function":"handler_{i}"}}"#,
            i = i,
            line = i * 7 + 1
        ));
    }
    stacktrace.push(']');

    format!(
        r#"{{"@t":"2026-07-26T00:00:00Z","@m":"request failed with status {{Status}}","@l":"Error","@x":{stacktrace},"Status":500,"RequestId":"3fa9c1d2","Tags":["prod","api","checkout"]}}"#,
        stacktrace = stacktrace
    )
}

fn event_small() -> &'static str {
    r#"{"@t":"2026-07-26T00:00:00Z","@m":"user signed in","@l":"Information","UserId":42}"#
}

#[bench]
fn parse_10kb_event(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();

    b.bytes = input.len() as u64;
    b.iter(|| parser.parse(input).unwrap());
}

#[bench]
fn parse_10kb_event_reusing(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();
    let mut reuse = Some(parser.parse(input).unwrap());

    b.bytes = input.len() as u64;
    b.iter(|| {
        let doc = parser.parse_reusing(input, reuse.take().unwrap()).unwrap();
        test::black_box(&doc);
        reuse = Some(doc);
    });
}

#[bench]
fn parse_10kb_event_serde_json(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();

    b.bytes = input.len() as u64;
    b.iter(|| {
        let v: serde_json::Value = serde_json::from_slice(input).unwrap();
        v
    });
}

#[bench]
fn parse_small_event(b: &mut test::Bencher) {
    let input = event_small().as_bytes();
    let parser = Parser::new();

    b.bytes = input.len() as u64;
    b.iter(|| parser.parse(input).unwrap());
}

#[bench]
fn find_key_10kb_event(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();
    let doc = parser.parse(input).unwrap();

    b.bytes = input.len() as u64;
    b.iter(|| doc.root().find_key("@m").unwrap().as_str().unwrap());
}

#[bench]
fn find_key_10kb_event_serde_json(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let v: serde_json::Value = serde_json::from_slice(input).unwrap();

    b.bytes = input.len() as u64;
    b.iter(|| v.get("@m").unwrap().as_str().unwrap());
}

#[bench]
fn marshal_json_10kb_event(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();
    let doc = parser.parse(input).unwrap();

    b.bytes = input.len() as u64;
    b.iter(|| doc.marshal_json());
}

#[bench]
fn serialize_10kb_event_default(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();
    let doc = parser.parse(input).unwrap();

    b.bytes = input.len() as u64;
    b.iter(|| tapeson::codec::serialize(&doc, CompressMode::Default));
}

#[bench]
fn serialize_10kb_event_none(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();
    let doc = parser.parse(input).unwrap();

    b.bytes = input.len() as u64;
    b.iter(|| tapeson::codec::serialize(&doc, CompressMode::None));
}

#[bench]
fn deserialize_10kb_event_default(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();
    let parser = Parser::new();
    let doc = parser.parse(input).unwrap();
    let bytes = tapeson::codec::serialize(&doc, CompressMode::Default);

    b.bytes = bytes.len() as u64;
    b.iter(|| tapeson::codec::deserialize(&bytes).unwrap());
}

#[bench]
fn validate_utf8_10kb_event(b: &mut test::Bencher) {
    let input = event_10kb();
    let input = input.as_bytes();

    b.bytes = input.len() as u64;
    b.iter(|| std::str::from_utf8(input).unwrap());
}

#[bench]
fn parse_ndjson_100_small_events(b: &mut test::Bencher) {
    let mut input = String::new();
    for _ in 0..100 {
        input.push_str(event_small());
        input.push('\n');
    }
    let input = input.into_bytes();
    let parser = Parser::new();

    b.bytes = input.len() as u64;
    b.iter(|| parser.parse_ndjson(&input).unwrap());
}
