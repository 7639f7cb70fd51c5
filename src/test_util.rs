use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::http::{HttpClient, HttpResponse, HttpResult};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Create a fresh, empty directory under the system temp dir
pub fn temp_dir(name: &str) -> PathBuf {
    let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "osm-map-broker-{}-{}-{}",
        name,
        std::process::id(),
        unique
    ));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).expect("Failed to clear temp dir");
    }
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

/// Overpass JSON with a few addressed features around Berlin Mitte
pub const BERLIN_OSM_JSON: &str = r#"{
  "version": 0.6,
  "elements": [
    {
      "type": "way",
      "id": 100,
      "tags": {
        "building": "residential",
        "addr:city": "Berlin",
        "addr:street": "Unter den Linden",
        "addr:housenumber": "77"
      },
      "geometry": [
        {"lat": 52.5163, "lon": 13.3777},
        {"lat": 52.5165, "lon": 13.3777},
        {"lat": 52.5165, "lon": 13.3781},
        {"lat": 52.5163, "lon": 13.3781},
        {"lat": 52.5163, "lon": 13.3777}
      ]
    },
    {
      "type": "way",
      "id": 200,
      "tags": {
        "highway": "primary",
        "name": "Unter den Linden"
      },
      "geometry": [
        {"lat": 52.5170, "lon": 13.3790},
        {"lat": 52.5172, "lon": 13.3850}
      ]
    },
    {
      "type": "node",
      "id": 300,
      "lat": 52.5186,
      "lon": 13.3762,
      "tags": {
        "tourism": "attraction",
        "name": "Reichstag",
        "addr:city": "Berlin"
      }
    }
  ]
}"#;

/// HTTP client answering every request with a fixed response
pub struct StubHttpClient {
    status: u16,
    body: String,
    requests: Mutex<Vec<String>>,
}

impl StubHttpClient {
    pub fn ok(body: &str) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> HttpResult<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
            headers: HashMap::new(),
        })
    }
}

#[async_trait]
impl HttpClient for StubHttpClient {
    async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        self.respond(url)
    }

    async fn post_form(&self, url: &str, _form_data: &[(&str, &str)]) -> HttpResult<HttpResponse> {
        self.respond(url)
    }

    async fn post_json(&self, url: &str, _json: &str) -> HttpResult<HttpResponse> {
        self.respond(url)
    }

    async fn test_connectivity(&self, url: &str) -> HttpResult<()> {
        self.respond(url).map(|_| ())
    }
}
