use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use eegview_core::PipelineConfig;
use eegview_server::{cli::inspect, create_router, AppState, ServerConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "eegview-test-boundary";

// Helper function to create a test router with a small topomap size
fn create_test_router() -> axum::Router {
    let config = ServerConfig {
        pipeline: PipelineConfig {
            topomap_image_size: 64,
            ..PipelineConfig::default()
        },
        ..ServerConfig::default()
    };
    create_router(Arc::new(AppState::new(config)))
}

// Helper function to send a request and get the JSON response
async fn send_request(request: Request<Body>) -> (StatusCode, Value) {
    let response = create_test_router()
        .oneshot(request)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!({}));

    (status, json)
}

enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

// Minimal EDF with identity scaling and 1 s records
fn create_mock_edf(labels: &[&str], sample_rate: usize, seconds: usize) -> Vec<u8> {
    fn field(out: &mut Vec<u8>, s: &str, size: usize) {
        let mut buf = vec![b' '; size];
        let n = s.len().min(size);
        buf[..n].copy_from_slice(&s.as_bytes()[..n]);
        out.extend_from_slice(&buf);
    }

    let ns = labels.len();
    let mut out = Vec::new();
    field(&mut out, "0", 8);
    field(&mut out, "Test Patient", 80);
    field(&mut out, "Test Recording", 80);
    field(&mut out, "01.01.24", 8);
    field(&mut out, "00.00.00", 8);
    field(&mut out, &(256 + 256 * ns).to_string(), 8);
    field(&mut out, "", 44);
    field(&mut out, &seconds.to_string(), 8);
    field(&mut out, "1", 8);
    field(&mut out, &ns.to_string(), 4);

    for label in labels {
        field(&mut out, label, 16);
    }
    for (value, size) in [("", 80), ("uV", 8), ("-32768", 8), ("32767", 8), ("-32768", 8), ("32767", 8), ("", 80)] {
        for _ in labels {
            field(&mut out, value, size);
        }
    }
    for _ in labels {
        field(&mut out, &sample_rate.to_string(), 8);
    }
    for _ in labels {
        field(&mut out, "", 32);
    }

    for record in 0..seconds {
        for ch in 0..ns {
            for s in 0..sample_rate {
                let t = (record * sample_rate + s) as f64 / sample_rate as f64;
                let amplitude = 100.0 * (ch + 1) as f64;
                let sample = (amplitude * (2.0 * PI * 10.0 * t).sin()) as i16;
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }
    out
}

fn csv_export(sample_rate: usize, rows: usize) -> String {
    let mut text = format!(
        "Device: ExampleAmp\nSampling Rate: {} Hz\nIndex,EEG Fp1,EEG Cz,EEG O2\n",
        sample_rate
    );
    for i in 0..rows {
        let v = (2.0 * PI * 10.0 * i as f64 / sample_rate as f64).sin();
        text.push_str(&format!("{},{:.6},{:.6},{:.6}\n", i, v, 2.0 * v, 3.0 * v));
    }
    text
}

const EDF_LABELS: [&str; 5] = ["EEG Fp1-Ref", "EEG C3-Ref", "EEG Cz-Ref", "EEG O1-Ref", "ECG"];

#[tokio::test]
async fn test_ping_and_health() {
    let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
    let (status, json) = send_request(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "alive");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, json) = send_request(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["electrodes"], 25);
}

#[tokio::test]
async fn test_root_banner() {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = create_test_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("running"));
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let (status, json) = send_request(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("/nope"));
}

#[tokio::test]
async fn test_edf_preview() {
    let edf = create_mock_edf(&EDF_LABELS, 128, 2);
    let (status, json) =
        send_request(multipart_request("/edf-preview", &[Part::File("rec.edf", &edf)])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sample_rate"], 128.0);
    assert_eq!(json["channel_names"].as_array().unwrap().len(), 5);
    assert_eq!(json["signals"][0].as_array().unwrap().len(), 256);
    assert_eq!(json["channels"][0]["canonical_label"], "FP1");
    assert_eq!(json["channels"][0]["channel_type"], "eeg");
    assert_eq!(json["channels"][4]["channel_type"], "unknown");
}

#[tokio::test]
async fn test_edf_preview_without_file() {
    let (status, json) =
        send_request(multipart_request("/edf-preview", &[Part::Text("note", "hi")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MISSING_INPUT");
}

#[tokio::test]
async fn test_edf_preview_rejects_text() {
    let csv = csv_export(100, 50);
    let (status, json) = send_request(multipart_request(
        "/edf-preview",
        &[Part::File("rec.edf", csv.as_bytes())],
    ))
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_txt_preview_truncates_to_ten_seconds() {
    let csv = csv_export(100, 1500);
    let (status, json) = send_request(multipart_request(
        "/txt-preview",
        &[Part::File("export.csv", csv.as_bytes())],
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["source"], "tabular");
    assert_eq!(json["sample_rate"], 100.0);
    assert_eq!(json["duration"], 10.0);
    assert_eq!(
        json["channel_names"],
        json!(["EEG Fp1", "EEG Cz", "EEG O2"])
    );
    assert_eq!(json["signals"][0].as_array().unwrap().len(), 1000);
}

#[tokio::test]
async fn test_txt_preview_binary_fallback() {
    let mut bytes = Vec::new();
    for frame in 0..100i16 {
        for ch in 0..8i16 {
            bytes.extend_from_slice(&(frame * 10 + ch).to_le_bytes());
        }
    }
    bytes.push(0x7F);
    let (status, json) =
        send_request(multipart_request("/txt-preview", &[Part::File("raw.dat", &bytes)])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["source"], "binary");
    assert_eq!(json["sample_rate"], 160.0);
    assert_eq!(json["channel_names"][7], "Ch-8");
    assert_eq!(json["signals"][1][2], 21.0);
    assert_eq!(json["signals"][0].as_array().unwrap().len(), 100);
}

#[tokio::test]
async fn test_txt_preview_unsupported() {
    let (status, json) =
        send_request(multipart_request("/txt-preview", &[Part::File("x.bin", b"xyz")])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_edf_channel_data() {
    let edf = create_mock_edf(&EDF_LABELS, 128, 2);

    let (status, json) = send_request(multipart_request(
        "/edf-channel-data",
        &[Part::File("rec.edf", &edf), Part::Text("channel", "EEG Cz-Ref")],
    ))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["channel"], "EEG Cz-Ref");
    assert_eq!(json["sample_rate"], 128.0);
    assert_eq!(json["signal"].as_array().unwrap().len(), 256);

    let (status, json) = send_request(multipart_request(
        "/edf-channel-data",
        &[Part::File("rec.edf", &edf), Part::Text("channel", "Cz")],
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_CHANNEL");

    let (status, json) = send_request(multipart_request(
        "/edf-channel-data",
        &[Part::File("rec.edf", &edf)],
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MISSING_INPUT");
}

#[tokio::test]
async fn test_filter_signal_notch_with_alias() {
    let signal: Vec<f64> = (0..1000)
        .map(|i| (2.0 * PI * 60.0 * i as f64 / 250.0).sin())
        .collect();
    let (status, json) = send_request(json_request(
        "/filter-signal",
        json!({
            "signals": [signal],
            "sample_rate": 250.0,
            "filter_type": "notch",
            "l_freq": [50.0, 60.0]
        }),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    let filtered = json["filtered"][0].as_array().unwrap();
    assert_eq!(filtered.len(), 1000);
    // 60 Hz removed away from the edges
    let mid_peak = filtered[400..600]
        .iter()
        .map(|v| v.as_f64().unwrap().abs())
        .fold(0.0, f64::max);
    assert!(mid_peak < 0.1, "residual {}", mid_peak);
}

#[tokio::test]
async fn test_filter_signal_errors() {
    let (status, json) = send_request(json_request(
        "/filter-signal",
        json!({"signals": [[1.0, 2.0, 3.0]], "sample_rate": 100.0, "filter_type": "wavelet"}),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MISSING_INPUT");

    let (status, json) = send_request(json_request(
        "/filter-signal",
        json!({"signals": [[1.0, 2.0, 3.0]], "sample_rate": 100.0, "filter_type": "bandpass"}),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MISSING_INPUT");

    let (status, json) = send_request(json_request(
        "/filter-signal",
        json!({
            "signals": [[1.0, 2.0, 3.0]],
            "sample_rate": 100.0,
            "filter_type": "bandpass",
            "low": 1.0,
            "high": 80.0
        }),
    ))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "UPSTREAM_COMPUTATION_ERROR");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/psd")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send_request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_psd() {
    let signal: Vec<f64> = (0..1000)
        .map(|i| (2.0 * PI * 10.0 * i as f64 / 100.0).sin())
        .collect();
    let (status, json) = send_request(json_request(
        "/psd",
        json!({"signals": [signal], "sample_rate": 100.0, "fmin": 1.0, "fmax": 30.0}),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    let freqs: Vec<f64> = json["freqs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert!(freqs.iter().all(|&f| (1.0..=30.0).contains(&f)));
    assert_eq!(json["psd"][0].as_array().unwrap().len(), freqs.len());
}

#[tokio::test]
async fn test_psd_empty_signals() {
    let (status, json) = send_request(json_request(
        "/psd",
        json!({"signals": [], "sample_rate": 100.0}),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("No channels selected for PSD"));
}

#[tokio::test]
async fn test_topomap_png() {
    let edf = create_mock_edf(&EDF_LABELS, 128, 4);
    let request = multipart_request(
        "/topomap",
        &[Part::File("rec.edf", &edf), Part::Text("frequency", "10")],
    );
    let response = create_test_router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers["x-topomap-channels"], "4");
    assert_eq!(headers["x-topomap-frequency"], "10");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[1..4], b"PNG");
}

#[tokio::test]
async fn test_topomap_insufficient_channels() {
    let edf = create_mock_edf(&["EEG Fp1-Ref", "EEG Cz-Ref", "ECG"], 128, 4);
    let (status, json) =
        send_request(multipart_request("/topomap", &[Part::File("rec.edf", &edf)])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INSUFFICIENT_CHANNELS");
}

#[tokio::test]
async fn test_topomap_invalid_frequency() {
    let edf = create_mock_edf(&EDF_LABELS, 128, 4);
    let (status, json) = send_request(multipart_request(
        "/topomap",
        &[Part::File("rec.edf", &edf), Part::Text("frequency", "alpha")],
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[test]
fn test_inspect_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("export.csv");
    std::fs::write(&path, csv_export(250, 500)).unwrap();

    let report = inspect(&path, Some("EEG Cz"), &PipelineConfig::default()).unwrap();
    assert_eq!(report.source, "tabular");
    assert_eq!(report.sample_rate, 250.0);
    assert_eq!(report.num_channels, 3);
    assert_eq!(report.num_samples, 500);
    assert_eq!(report.positioned_channels, 3);
    assert_eq!(report.channel_data.unwrap().signal.len(), 500);

    assert!(inspect(&path, Some("Pz"), &PipelineConfig::default()).is_err());
}
