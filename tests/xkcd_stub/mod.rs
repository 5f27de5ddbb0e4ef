use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct XkcdStubConfig {
    pub latest: u32,
    /// Ids answered with 404 even though they are `<= latest`.
    pub missing: Vec<u32>,
}

/// Plays the upstream JSON API: `/info.0.json` and `/{id}/info.0.json`.
pub struct XkcdStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl XkcdStub {
    pub fn spawn(config: XkcdStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start xkcd stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                seen.lock().expect("request log").push(path.clone());

                let id = if path == "/info.0.json" {
                    Some(config.latest)
                } else {
                    path.strip_prefix('/')
                        .and_then(|rest| rest.strip_suffix("/info.0.json"))
                        .and_then(|id| id.parse::<u32>().ok())
                        .filter(|id| {
                            (1..=config.latest).contains(id)
                                && *id != 404
                                && !config.missing.contains(id)
                        })
                };

                let response = match id {
                    Some(id) => tiny_http::Response::from_data(comic_json(id).to_string().into_bytes())
                        .with_header(
                            tiny_http::Header::from_bytes("Content-Type", "application/json")
                                .expect("content-type header"),
                        )
                        .with_header(
                            tiny_http::Header::from_bytes("ETag", format!("\"comic-{id}\""))
                                .expect("etag header"),
                        ),
                    None => tiny_http::Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }
}

impl Drop for XkcdStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn comic_json(id: u32) -> serde_json::Value {
    let title = match id {
        259 => "Clich&eacute;d Exchanges".to_owned(),
        _ => format!("Comic {id}"),
    };
    json!({
        "num": id,
        "safe_title": title,
        "title": title,
        "img": format!("https://imgs.xkcd.com/comics/comic_{id}.png"),
        "alt": format!("alt text {id}"),
        "link": "",
        "news": "",
        "transcript": "",
        "year": "2020",
        "month": "1",
        "day": "2",
    })
}
