//! Extraction client against a local one-shot HTTP endpoint.

use millsheet_renamer::{
    process_file, AnthropicExtractor, Extractor, ImageEncoding, ItemError, PageImage, Pipeline,
    RenameConfig,
};
use base64::Engine as _;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the fake endpoint saw.
struct Captured {
    headers: Vec<(String, String)>,
    body: Value,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve exactly one request with `status` and `body`.
async fn serve_once(status: u16, body: String) -> (SocketAddr, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        let header_end = loop {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let headers: Vec<(String, String)> = head
            .lines()
            .skip(1)
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let content_length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body = serde_json::from_slice(&buf[header_end..header_end + content_length])
            .unwrap_or(Value::Null);

        let reason = if status < 300 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();

        let _ = tx.send(Captured {
            headers,
            body: request_body,
        });
    });

    (addr, rx)
}

fn extractor(addr: SocketAddr) -> AnthropicExtractor {
    let config = RenameConfig::builder()
        .endpoint(format!("http://{addr}/v1/messages"))
        .api_timeout_secs(10)
        .build()
        .unwrap();
    AnthropicExtractor::new("sk-ant-test", &config).unwrap()
}

fn pages() -> Vec<PageImage> {
    (0..2)
        .map(|index| PageImage {
            index,
            data: vec![0x89, b'P', b'N', b'G', index as u8],
            encoding: ImageEncoding::Png,
        })
        .collect()
}

fn text_reply(text: &str) -> String {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-20250514",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 2400, "output_tokens": 80 }
    })
    .to_string()
}

#[tokio::test]
async fn fenced_answer_becomes_record() {
    let answer = "```json\n{\"date\": \"251125\", \"spec\": \"SS400\", \"size\": \"19.00x1540xCOIL\", \
                  \"charge_no\": \"AE4652\", \"project\": \"ほぼゼロ\", \"maker\": \"東京製鉄\"}\n```";
    let (addr, captured) = serve_once(200, text_reply(answer)).await;

    let record = extractor(addr).extract(&pages()).await.unwrap();
    assert_eq!(record.date.as_deref(), Some("251125"));
    assert_eq!(record.charge_no.as_deref(), Some("AE4652"));
    assert_eq!(record.maker.as_deref(), Some("東京製鉄"));

    let seen = captured.await.unwrap();
    assert_eq!(seen.header("x-api-key"), Some("sk-ant-test"));
    assert_eq!(seen.header("anthropic-version"), Some("2023-06-01"));
    assert!(seen
        .header("content-type")
        .is_some_and(|v| v.starts_with("application/json")));

    let body = &seen.body;
    assert_eq!(body["model"], "claude-sonnet-4-20250514");
    assert_eq!(body["max_tokens"], 1000);
    let content = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(content.len(), 3);
    assert_eq!(content[0]["type"], "image");
    assert_eq!(content[0]["source"]["type"], "base64");
    assert_eq!(content[0]["source"]["media_type"], "image/png");
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[2]["type"], "text");
}

#[tokio::test]
async fn partial_answer_keeps_missing_fields_empty() {
    let (addr, _captured) =
        serve_once(200, text_reply(r#"{"date": "240101", "spec": null, "size": 12}"#)).await;

    let record = extractor(addr).extract(&pages()).await.unwrap();
    assert_eq!(record.date.as_deref(), Some("240101"));
    assert_eq!(record.spec, None);
    assert_eq!(record.size.as_deref(), Some("12"));
    assert_eq!(record.maker, None);
}

#[tokio::test]
async fn unauthorized_is_a_service_error() {
    let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
    let (addr, _captured) = serve_once(401, body.to_string()).await;

    let err = extractor(addr).extract(&pages()).await.unwrap_err();
    assert_eq!(
        err,
        ItemError::Service {
            status: 401,
            body: body.to_string()
        }
    );
}

#[tokio::test]
async fn prose_answer_is_a_parse_error() {
    let (addr, _captured) = serve_once(200, text_reply("I could not read this scan.")).await;

    let err = extractor(addr).extract(&pages()).await.unwrap_err();
    assert!(matches!(err, ItemError::ResponseParse { .. }), "{err:?}");
}

#[tokio::test]
async fn reply_without_text_block_is_malformed() {
    let body = json!({ "type": "message", "content": [{ "type": "tool_use", "id": "t1" }] });
    let (addr, _captured) = serve_once(200, body.to_string()).await;

    let err = extractor(addr).extract(&pages()).await.unwrap_err();
    assert!(matches!(err, ItemError::MalformedResponse { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = extractor(addr).extract(&pages()).await.unwrap_err();
    assert!(matches!(err, ItemError::Transport { .. }), "{err:?}");
}

const SAMPLE_ANSWER: &str = r#"{"date": "251125", "spec": "SS400", "size": "19.00x1540xCOIL", "charge_no": "AE4652", "project": "HOBOZERO", "maker": "Tokyo Steel"}"#;

#[tokio::test]
async fn whole_pdf_goes_out_as_document_block() {
    let (addr, captured) = serve_once(200, text_reply(SAMPLE_ANSWER)).await;
    let pdf = PageImage {
        index: 0,
        data: b"%PDF-1.4 tiny".to_vec(),
        encoding: ImageEncoding::Pdf,
    };

    let record = extractor(addr).extract(&[pdf]).await.unwrap();
    assert_eq!(record.maker.as_deref(), Some("Tokyo Steel"));

    let seen = captured.await.unwrap();
    let content = seen.body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[0]["type"], "document");
    assert_eq!(content[0]["source"]["type"], "base64");
    assert_eq!(content[0]["source"]["media_type"], "application/pdf");
    let data = content[0]["source"]["data"].as_str().unwrap();
    assert_eq!(
        base64::engine::general_purpose::STANDARD.decode(data).unwrap(),
        b"%PDF-1.4 tiny"
    );
    assert_eq!(content[1]["type"], "text");
}

#[tokio::test]
async fn send_pdf_pipeline_renames_without_pdfium() {
    let (addr, captured) = serve_once(200, text_reply(SAMPLE_ANSWER)).await;
    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("scan0042.pdf");
    std::fs::write(&src, b"%PDF-1.7\n%%EOF\n").unwrap();

    let config = RenameConfig::builder()
        .endpoint(format!("http://{addr}/v1/messages"))
        .api_timeout_secs(10)
        .send_pdf(true)
        .build()
        .unwrap();
    let pipeline = Pipeline::anthropic("sk-ant-test", config).unwrap();

    let renamed = process_file(&pipeline, &src).await.unwrap();
    assert_eq!(
        renamed.file_name().unwrap(),
        "251125_SS400_19.00x1540xCOIL_AE4652_HOBOZERO_Tokyo Steel.pdf"
    );
    assert!(renamed.exists());
    assert!(!src.exists());

    let seen = captured.await.unwrap();
    assert_eq!(seen.body["messages"][0]["content"][0]["type"], "document");
}
