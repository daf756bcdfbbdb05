#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use poi_extract::overpass::OverpassClient;
use poi_extract::settings::{RetryPolicy, Settings};
use tiny_http::{Header, Response, Server, StatusCode};

/// Request bodies seen by a mock endpoint, in arrival order.
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Serves `replies` in order, one per request, repeating the last one once
/// the list runs out. The thread stops after 500 ms without a request.
pub fn spawn_overpass(replies: Vec<(u16, String)>) -> (String, Seen, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let url = format!("http://{}/api/interpreter", server.server_addr());
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let handle = thread::spawn(move || {
        let mut served = 0usize;
        loop {
            let mut req = match server.recv_timeout(Duration::from_millis(500)) {
                Ok(Some(req)) => req,
                Ok(None) => break,
                Err(_) => break,
            };
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            seen_clone.lock().expect("seen lock").push(body);

            let (status, text) = replies
                .get(served)
                .or_else(|| replies.last())
                .cloned()
                .unwrap_or((500, String::new()));
            served += 1;
            let response = Response::from_string(text)
                .with_status_code(StatusCode(status))
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").expect("header"),
                );
            let _ = req.respond(response);
        }
    });
    (url, seen, handle)
}

/// Client with millisecond backoff so retry tests stay fast.
pub fn fast_client(url: &str) -> OverpassClient {
    let settings = Settings::default()
        .with_overpass_url(url)
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        });
    OverpassClient::with_settings(settings)
}

pub fn ok(body: serde_json::Value) -> (u16, String) {
    (200, body.to_string())
}

pub fn busy() -> (u16, String) {
    (503, "<html>server busy</html>".to_string())
}

/// A well-formed answer with `elements` and an osm3s timestamp.
pub fn answer(timestamp: &str, elements: serde_json::Value) -> (u16, String) {
    ok(serde_json::json!({
        "version": 0.6,
        "generator": "Overpass API mock",
        "osm3s": {"timestamp_osm_base": timestamp},
        "elements": elements,
    }))
}

pub fn cafe_elements() -> serde_json::Value {
    serde_json::json!([
        {"type": "way", "id": 20, "center": {"lat": 40.0005, "lon": -74.0005}, "tags": {"amenity": "cafe", "name": "Corner"}},
        {"type": "node", "id": 11, "lat": 40.0001, "lon": -74.0001, "tags": {"amenity": "cafe", "name": "Bean"}},
        {"type": "node", "id": 10, "lat": 40.0002, "lon": -74.0002, "tags": {"amenity": "cafe"}},
        {"type": "node", "id": 11, "lat": 40.0001, "lon": -74.0001, "tags": {"amenity": "cafe", "name": "Bean"}}
    ])
}
