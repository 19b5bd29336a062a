//! End-to-end codec tests: wire round trips, segmentation tolerance and
//! pipelining over the public API.

use std::sync::Arc;

use proptest::prelude::*;
use serde::Deserialize;

use rspeech_mrcp_core::prelude::*;

fn catalog() -> Arc<ResourceCatalog> {
    Arc::new(ResourceCatalog::default_catalog())
}

fn speak_request(session_id: &str, request_id: RequestId, body: &str) -> Message {
    let catalog = catalog();
    let synth = catalog.get_by_name("speechsynth").unwrap();
    let speak = synth.method_id("SPEAK").unwrap();
    let mut message = Message::request(synth, Version::V2, speak, request_id).unwrap();
    message.channel_id.session_id = session_id.to_string();
    message.set_content_type("application/ssml+xml").unwrap();
    message.set_body(body.to_string());
    message
}

fn recognize_request(session_id: &str, request_id: RequestId, grammar: &str) -> Message {
    let catalog = catalog();
    let recog = catalog.get_by_name("speechrecog").unwrap();
    let recognize = recog.method_id("RECOGNIZE").unwrap();
    let mut message = Message::request(recog, Version::V2, recognize, request_id).unwrap();
    message.channel_id.session_id = session_id.to_string();
    message.set_content_type("application/srgs+xml").unwrap();
    message.set_body(grammar.to_string());
    message
}

fn generate(message: &mut Message) -> Vec<u8> {
    MessageGenerator::new(catalog())
        .generate_to_vec(message)
        .unwrap()
}

fn feed_chunks(parser: &mut MessageParser, chunks: &[&[u8]]) -> Vec<Message> {
    let mut messages = Vec::new();
    for chunk in chunks {
        let mut cursor = TextCursor::new(chunk);
        loop {
            match parser.run(&mut cursor) {
                ParseStatus::Complete(m) => messages.push(*m),
                ParseStatus::Incomplete => break,
                ParseStatus::Invalid { .. } => panic!("unexpected invalid message"),
            }
            if cursor.is_eos() {
                break;
            }
        }
    }
    messages
}

#[test]
fn speak_request_round_trip() {
    let body = "<?xml version=\"1.0\"?>\r\n<speak><p>Hello world.</p></speak>";
    let mut message = speak_request("abcd", 1, body);
    let bytes = generate(&mut message);

    // The start line carries the exact wire size.
    let text = String::from_utf8(bytes.clone()).unwrap();
    let declared: usize = text.split(' ').nth(1).unwrap().parse().unwrap();
    assert_eq!(declared, bytes.len());

    let mut parser = MessageParser::new(catalog());
    let parsed = feed_chunks(&mut parser, &[&bytes]);
    assert_eq!(parsed.len(), 1);
    let parsed = &parsed[0];

    assert_eq!(parsed.start_line.name(), Some("SPEAK"));
    assert_eq!(parsed.start_line.request_id(), 1);
    assert_eq!(parsed.channel_id.to_string(), "abcd@speechsynth");
    assert_eq!(parsed.body.as_ref(), body.as_bytes());
    assert_eq!(parsed.generic().content_length, Some(body.len()));

    // Generating the parsed message reproduces the bytes, start line
    // included.
    let mut again = parsed.clone();
    assert_eq!(generate(&mut again), bytes);
}

#[test]
fn segmentation_between_cr_and_lf_of_header_terminator() {
    let mut message = speak_request("abcd", 2, "<speak>segmented</speak>");
    let bytes = generate(&mut message);
    let terminator = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let split = terminator + 3;

    let mut parser = MessageParser::new(catalog());
    let mut cursor = TextCursor::new(&bytes[..split]);
    assert!(matches!(parser.run(&mut cursor), ParseStatus::Incomplete));

    let mut cursor = TextCursor::new(&bytes[split..]);
    match parser.run(&mut cursor) {
        ParseStatus::Complete(parsed) => {
            assert_eq!(parsed.body.as_ref(), b"<speak>segmented</speak>");
        }
        other => panic!("expected complete, got {other:?}"),
    }
}

#[test]
fn pipelined_requests_in_one_read() {
    let mut first = recognize_request("pipe", 100, "<grammar>yes no</grammar>");
    let mut second = recognize_request("pipe", 101, "<grammar>digits</grammar>");
    let mut buffer = generate(&mut first);
    let first_len = buffer.len();
    buffer.extend_from_slice(&generate(&mut second));
    let second_len = buffer.len() - first_len;

    let mut parser = MessageParser::new(catalog());
    let mut cursor = TextCursor::new(&buffer);
    let mut ids = Vec::new();
    loop {
        match parser.run(&mut cursor) {
            ParseStatus::Complete(m) => ids.push(m.start_line.request_id()),
            ParseStatus::Incomplete => break,
            ParseStatus::Invalid { .. } => panic!("unexpected invalid message"),
        }
        if cursor.is_eos() {
            break;
        }
    }
    assert_eq!(ids, [100, 101]);
    assert_eq!(cursor.pos(), first_len + second_len);
}

#[test]
fn parse_then_generate_preserves_header_order_and_bitmap() {
    let catalog = catalog();
    let recog = catalog.get_by_name("speechrecog").unwrap();
    let recognize = recog.method_id("RECOGNIZE").unwrap();
    let mut message = Message::request(recog, Version::V2, recognize, 55).unwrap();
    message.channel_id.session_id = "order".to_string();
    message
        .set_resource_field(recog, "No-Input-Timeout", "5000")
        .unwrap();
    message.set_content_type("application/srgs+xml").unwrap();
    message
        .set_resource_field(recog, "Confidence-Threshold", "0.7")
        .unwrap();
    message.set_body("<g/>");

    let bytes = generate(&mut message);
    let mut parser = MessageParser::new(catalog.clone());
    let parsed = feed_chunks(&mut parser, &[&bytes]);
    let parsed = &parsed[0];

    let original_ids: Vec<_> = message.header().ids().collect();
    let parsed_ids: Vec<_> = parsed.header().ids().collect();
    assert_eq!(original_ids, parsed_ids);

    for id in 0..parsed.header().id_count() {
        assert_eq!(
            parsed.header().field_check(id),
            parsed.header().field_get(id).is_some()
        );
        assert_eq!(
            parsed.header().field_check(id),
            message.header().field_check(id)
        );
    }
}

#[test]
fn event_round_trip() {
    let catalog = catalog();
    let recog = catalog.get_by_name("speechrecog").unwrap();
    let recognize = recog.method_id("RECOGNIZE").unwrap();
    let mut request = Message::request(recog, Version::V2, recognize, 8).unwrap();
    request.channel_id.session_id = "ev".to_string();

    let complete = recog.event_id("RECOGNITION-COMPLETE").unwrap();
    let mut event = Message::event_from(recog, &request, complete).unwrap();
    if let StartLine::Event(line) = &mut event.start_line {
        line.request_state = RequestState::Complete;
    }
    event.set_content_type("application/nlsml+xml").unwrap();
    event.set_body("<result>pizza</result>");

    let bytes = generate(&mut event);
    let mut parser = MessageParser::new(catalog);
    let parsed = feed_chunks(&mut parser, &[&bytes]);
    assert_eq!(parsed.len(), 1);
    match &parsed[0].start_line {
        StartLine::Event(line) => {
            assert_eq!(line.event_name, "RECOGNITION-COMPLETE");
            assert_eq!(line.request_id, 8);
            assert_eq!(line.request_state, RequestState::Complete);
            assert!(line.event_id.is_some());
        }
        other => panic!("expected event, got {other:?}"),
    }
}

/// One request described by the JSON fixture set.
#[derive(Debug, Deserialize)]
struct RequestFixture {
    resource: String,
    method: String,
    request_id: RequestId,
    session_id: String,
    content_type: Option<String>,
    body: Option<String>,
}

#[test]
fn json_fixtures_round_trip() {
    let fixtures: Vec<RequestFixture> = serde_json::from_str(
        r#"[
            {"resource": "speechsynth", "method": "SPEAK", "request_id": 1,
             "session_id": "fx-1", "content_type": "application/ssml+xml",
             "body": "<speak>one</speak>"},
            {"resource": "speechrecog", "method": "RECOGNIZE", "request_id": 2,
             "session_id": "fx-2", "content_type": "application/srgs+xml",
             "body": "<grammar>yes no</grammar>"},
            {"resource": "speechrecog", "method": "STOP", "request_id": 3,
             "session_id": "fx-3", "content_type": null, "body": null}
        ]"#,
    )
    .expect("valid fixture JSON");

    let catalog = catalog();
    for fixture in fixtures {
        let resource = catalog.get_by_name(&fixture.resource).unwrap();
        let method = resource.method_id(&fixture.method).unwrap();
        let mut message =
            Message::request(resource, Version::V2, method, fixture.request_id).unwrap();
        message.channel_id.session_id = fixture.session_id.clone();
        if let Some(content_type) = &fixture.content_type {
            message.set_content_type(content_type).unwrap();
        }
        if let Some(body) = &fixture.body {
            message.set_body(body.clone());
        }

        let bytes = generate(&mut message);
        let mut parser = MessageParser::new(catalog.clone());
        let parsed = feed_chunks(&mut parser, &[&bytes]);
        assert_eq!(parsed.len(), 1, "fixture {}", fixture.method);
        assert_eq!(parsed[0].start_line.name(), Some(fixture.method.as_str()));
        assert_eq!(parsed[0].start_line.request_id(), fixture.request_id);
        assert_eq!(parsed[0].channel_id.resource_name, fixture.resource);
        assert_eq!(
            parsed[0].generic().content_type.as_deref(),
            fixture.content_type.as_deref()
        );
        assert_eq!(
            parsed[0].body.as_ref(),
            fixture.body.as_deref().unwrap_or("").as_bytes()
        );
    }
}

proptest! {
    // Restartability law: any segmentation of the byte stream parses to
    // the same message sequence as a single feed.
    #[test]
    fn any_segmentation_parses_identically(
        cuts in prop::collection::vec(0usize..600, 0..6),
        body_len in 0usize..120,
    ) {
        let body: String = std::iter::repeat("ab<&>\r\n ")
            .flat_map(|s| s.chars())
            .take(body_len)
            .collect();
        let mut first = speak_request("prop", 1, &body);
        let mut second = recognize_request("prop", 2, "<g>one</g>");
        let mut stream = generate(&mut first);
        stream.extend_from_slice(&generate(&mut second));

        let mut reference = MessageParser::new(catalog());
        let expected = feed_chunks(&mut reference, &[&stream]);

        let mut bounds: Vec<usize> = cuts
            .into_iter()
            .map(|c| c % (stream.len() + 1))
            .collect();
        bounds.push(0);
        bounds.push(stream.len());
        bounds.sort_unstable();
        bounds.dedup();
        let chunks: Vec<&[u8]> = bounds
            .windows(2)
            .map(|w| &stream[w[0]..w[1]])
            .collect();

        let mut parser = MessageParser::new(catalog());
        let parsed = feed_chunks(&mut parser, &chunks);

        prop_assert_eq!(parsed.len(), expected.len());
        for (a, b) in parsed.iter().zip(expected.iter()) {
            prop_assert_eq!(&a.start_line, &b.start_line);
            prop_assert_eq!(&a.body, &b.body);
            prop_assert_eq!(a.generic(), b.generic());
        }
    }
}
