
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::catalog::{Catalog, UPLOAD_PATHS};
use crate::probe::{self, Classification, HttpTransport, TransportConfig, Verdict};
use crate::scanner::{ProgressEvent, ScanOptions, Scanner};

#[derive(Clone, Copy, Debug)]
enum Reply {
    Status(u16, &'static str),
    Redirect(&'static str),
    Hang,
}

#[derive(Clone, Debug, Default)]
struct Seen {
    requests: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl Seen {
    fn count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, p, _)| m == method && p == path)
            .count()
    }

    fn user_agents(&self) -> HashSet<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, ua)| ua.clone())
            .collect()
    }
}

// minimal HTTP/1.1 responder, one request per connection
async fn serve(routes: HashMap<&'static str, Reply>) -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Seen::default();
    let recorder = seen.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = String::from_utf8_lossy(&buf).to_string();
                let mut lines = head.lines();
                let mut request_line = lines.next().unwrap_or_default().split_whitespace();
                let method = request_line.next().unwrap_or_default().to_string();
                let path = request_line.next().unwrap_or_default().to_string();
                let user_agent = lines
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("user-agent"))
                    .map(|(_, v)| v.trim().to_string())
                    .unwrap_or_default();
                recorder
                    .requests
                    .lock()
                    .unwrap()
                    .push((method.clone(), path.clone(), user_agent));

                let (status, body, location) = match routes.get(path.as_str()).copied() {
                    Some(Reply::Status(status, body)) => (status, body, None),
                    Some(Reply::Redirect(to)) => (301, "", Some(to)),
                    Some(Reply::Hang) => {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        return;
                    }
                    None => (404, "", None),
                };
                let reason = match status {
                    200 => "OK",
                    301 => "Moved Permanently",
                    403 => "Forbidden",
                    404 => "Not Found",
                    _ => "Other",
                };
                let location = location
                    .map(|to| format!("Location: {to}\r\n"))
                    .unwrap_or_default();
                let mut response = format!(
                    "HTTP/1.1 {status} {reason}\r\n{location}Content-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                if method != "HEAD" {
                    response.push_str(body);
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), seen)
}

fn quick_transport() -> HttpTransport {
    HttpTransport::new(&TransportConfig {
        timeout: Duration::from_millis(500),
        ..TransportConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn http_scan_reports_upload_and_forbidden_paths() {
    let (base, seen) = serve(HashMap::from([
        ("/upload/", Reply::Status(200, "<form>upload form here</form>")),
        ("/files/", Reply::Status(403, "")),
    ]))
    .await;

    let scanner =
        Scanner::new(quick_transport(), Catalog::builtin(), ScanOptions::default()).unwrap();
    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(128);
    let report = scanner.scan(&base, Some(tx)).await.unwrap();

    let got: HashSet<_> = report.results.iter().cloned().collect();
    let want: HashSet<_> = [format!("{base}/upload/"), format!("{base}/files/")]
        .into_iter()
        .collect();
    assert_eq!(got, want);
    assert_eq!(report.probed(), UPLOAD_PATHS.len());

    let mut events = 0;
    while rx.recv().await.is_some() {
        events += 1;
    }
    assert_eq!(events, UPLOAD_PATHS.len());

    // confirmation fetch only happens after a reachable HEAD
    assert_eq!(seen.count("HEAD", "/upload/"), 1);
    assert_eq!(seen.count("GET", "/upload/"), 1);
    assert_eq!(seen.count("HEAD", "/files/"), 1);
    assert_eq!(seen.count("GET", "/files/"), 0);
    assert_eq!(
        seen.user_agents(),
        HashSet::from([probe::DEFAULT_USER_AGENT.to_string()])
    );
}

#[tokio::test]
async fn http_timeout_becomes_absent_without_status() {
    let (base, _) = serve(HashMap::from([("/upload/", Reply::Hang)])).await;

    let transport = HttpTransport::new(&TransportConfig {
        timeout: Duration::from_millis(200),
        ..TransportConfig::default()
    })
    .unwrap();
    let outcome = probe::probe(&transport, &base, "/upload/").await;
    assert_eq!(outcome.classification, Classification::Absent);
    assert_eq!(outcome.status, None);
    assert_eq!(outcome.verdict(), Verdict::NotFound);
}

#[tokio::test]
async fn refused_connection_becomes_absent_without_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = probe::probe(&quick_transport(), &format!("http://{addr}"), "/upload/").await;
    assert_eq!(outcome.status, None);
    assert!(outcome.error.is_some());
    assert_eq!(outcome.verdict(), Verdict::NotFound);
}

#[tokio::test]
async fn custom_header_and_agent_are_sent() {
    let (base, seen) = serve(HashMap::from([("/upload/", Reply::Status(403, ""))])).await;

    let transport = HttpTransport::new(&TransportConfig {
        user_agent: "uploadbuster-test".to_string(),
        header: Some("X-Scan: 1".to_string()),
        ..TransportConfig::default()
    })
    .unwrap();
    let outcome = probe::probe(&transport, &base, "/upload/").await;
    assert_eq!(outcome.status, Some(403));
    assert_eq!(
        seen.user_agents(),
        HashSet::from(["uploadbuster-test".to_string()])
    );
}

#[tokio::test]
async fn extra_paths_are_probed_after_builtin_ones() {
    use std::io::Write;

    let (base, seen) = serve(HashMap::from([(
        "/cgi-bin/upload.pl",
        Reply::Status(200, "File manager"),
    )]))
    .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "/cgi-bin/upload.pl").unwrap();
    let mut catalog = Catalog::builtin();
    catalog
        .extend_from_file(file.path().to_str().unwrap())
        .await
        .unwrap();

    let scanner = Scanner::new(quick_transport(), catalog, ScanOptions::default()).unwrap();
    let report = scanner.scan(&base, None).await.unwrap();
    assert_eq!(report.probed(), UPLOAD_PATHS.len() + 1);
    assert_eq!(report.results, vec![format!("{base}/cgi-bin/upload.pl")]);
    assert_eq!(report.count(Verdict::Found), 1);
    assert_eq!(seen.count("GET", "/cgi-bin/upload.pl"), 1);
}

#[tokio::test]
async fn redirected_upload_page_is_confirmed() {
    let (base, seen) = serve(HashMap::from([
        ("/upload/", Reply::Redirect("/real/")),
        ("/real/", Reply::Status(200, "upload here")),
    ]))
    .await;

    let outcome = probe::probe(&quick_transport(), &base, "/upload/").await;
    assert_eq!(outcome.classification, Classification::Confirmed);
    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.url, format!("{base}/upload/"));
    assert_eq!(outcome.verdict(), Verdict::Found);
    assert_eq!(seen.count("GET", "/real/"), 1);
}

#[tokio::test]
async fn redirect_is_reported_as_is_when_not_followed() {
    let (base, seen) = serve(HashMap::from([
        ("/upload/", Reply::Redirect("/real/")),
        ("/real/", Reply::Status(200, "upload here")),
    ]))
    .await;

    let transport = HttpTransport::new(&TransportConfig {
        timeout: Duration::from_millis(500),
        follow_redirects: false,
        ..TransportConfig::default()
    })
    .unwrap();
    let outcome = probe::probe(&transport, &base, "/upload/").await;
    assert_eq!(outcome.classification, Classification::Absent);
    assert_eq!(outcome.status, Some(301));
    assert_eq!(outcome.verdict(), Verdict::Possible);
    assert_eq!(seen.count("HEAD", "/real/"), 0);
    assert_eq!(seen.count("GET", "/real/"), 0);
}

#[tokio::test]
async fn keywords_past_the_body_cap_are_ignored() {
    let padding = "a".repeat(probe::MAX_BODY_BYTES);
    let late: &'static str = Box::leak(format!("{padding}upload").into_boxed_str());
    let early: &'static str = Box::leak(format!("upload{padding}").into_boxed_str());
    let (base, _) = serve(HashMap::from([
        ("/late/", Reply::Status(200, late)),
        ("/early/", Reply::Status(200, early)),
    ]))
    .await;

    let transport = HttpTransport::new(&TransportConfig::default()).unwrap();
    let outcome = probe::probe(&transport, &base, "/late/").await;
    assert_eq!(outcome.classification, Classification::Absent);
    assert_eq!(outcome.status, Some(200));

    let outcome = probe::probe(&transport, &base, "/early/").await;
    assert_eq!(outcome.classification, Classification::Confirmed);
}
