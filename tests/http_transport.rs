//! HTTP transport tests against a local one-shot server.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use feedwire::auth::StaticAuth;
use feedwire::handler::Callbacks;
use feedwire::transport::HttpConfig;
use feedwire::{
    Completion, FailureKind, FetchRequest, ObserverRegistry, RequestMultiplexer, StreamingSession,
};

/// Serve one request with `response`, reporting the request head.
fn serve_once(response: Vec<Vec<u8>>) -> (String, mpsc::Receiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/stream", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut head = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            head.push(line);
        }
        let _ = tx.send(head);

        let mut stream = stream;
        for piece in response {
            stream.write_all(&piece).unwrap();
            stream.flush().unwrap();
            thread::sleep(Duration::from_millis(5));
        }
    });

    (url, rx)
}

fn chunked(body_parts: &[&str]) -> Vec<Vec<u8>> {
    let mut pieces = vec![
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
            .to_vec(),
    ];
    for part in body_parts {
        pieces.push(format!("{:x}\r\n{}\r\n", part.len(), part).into_bytes());
    }
    pieces.push(b"0\r\n\r\n".to_vec());
    pieces
}

fn poll_until<T: feedwire::transport::Transport>(
    mux: &mut RequestMultiplexer<T>,
    mut done: impl FnMut() -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for transfer");
        mux.poll().unwrap();
        thread::sleep(Duration::from_millis(2));
    }
}

/// Test a chunked stream is decoded and the authorization header is sent.
#[test]
fn test_stream_over_http() {
    let (url, head) = serve_once(chunked(&["{\"id\":1}\r\n{\"i", "d\":2}\r", "\n"]));
    let mut mux = RequestMultiplexer::with_http(HttpConfig::default()).unwrap();

    let registry = Rc::new(ObserverRegistry::new());
    let ids = Rc::new(RefCell::new(Vec::new()));
    let sink = ids.clone();
    registry.register("stream", move |value| {
        sink.borrow_mut().push(value["id"].as_u64().unwrap_or(0))
    });

    let session = StreamingSession::start(
        &mut mux,
        &url,
        &StaticAuth::new("Authorization: OAuth oauth_token=\"abc\""),
        registry,
        "stream",
    )
    .unwrap();

    poll_until(&mut mux, || session.is_finished());

    assert_eq!(*ids.borrow(), vec![1, 2]);
    assert!(session.failure().is_none());
    assert!(mux.is_empty());

    let head = head.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(head[0].starts_with("GET /stream HTTP/1.1"));
    assert!(head
        .iter()
        .any(|line| line.eq_ignore_ascii_case("authorization: OAuth oauth_token=\"abc\"")));
}

/// Test a non-2xx answer is a status failure, not a body.
#[test]
fn test_error_status() {
    let (url, _head) = serve_once(vec![
        b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 12\r\nConnection: close\r\n\r\nUnauthorized".to_vec(),
    ]);
    let mut mux = RequestMultiplexer::with_http(HttpConfig::default()).unwrap();

    let body = Rc::new(RefCell::new(Vec::new()));
    let outcome: Rc<RefCell<Option<Completion>>> = Rc::new(RefCell::new(None));
    let (sink, done) = (body.clone(), outcome.clone());
    mux.submit_with(
        FetchRequest::get(url),
        Callbacks::new(
            move |chunk: &[u8]| sink.borrow_mut().extend_from_slice(chunk),
            move |c: Completion| *done.borrow_mut() = Some(c),
        ),
    )
    .unwrap();

    poll_until(&mut mux, || outcome.borrow().is_some());

    assert!(body.borrow().is_empty());
    match &*outcome.borrow() {
        Some(Err(failure)) => assert_eq!(failure.kind, FailureKind::Status(401)),
        other => panic!("unexpected outcome: {:?}", other),
    };
}

/// Test a refused connection is a connect failure.
#[test]
fn test_connection_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut mux = RequestMultiplexer::with_http(HttpConfig::default()).unwrap();

    let outcome: Rc<RefCell<Option<Completion>>> = Rc::new(RefCell::new(None));
    let done = outcome.clone();
    mux.submit_with(
        FetchRequest::get(format!("http://127.0.0.1:{}/", port)),
        Callbacks::new(|_: &[u8]| {}, move |c: Completion| *done.borrow_mut() = Some(c)),
    )
    .unwrap();

    poll_until(&mut mux, || outcome.borrow().is_some());

    match &*outcome.borrow() {
        Some(Err(failure)) => assert_eq!(failure.kind, FailureKind::Connect),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(mux.is_empty());
}
