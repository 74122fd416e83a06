use std::{
    env, fs,
    path::{Path, PathBuf},
};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Process configuration, read once at startup. Anything invalid is a
/// fatal error before the listener binds.
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_path: String,
    pub class_list_path: String,
    pub pesticide_csv_path: String,
    pub upload_dir: PathBuf,
    pub keep_uploads: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let body_limit_bytes = {
            let mb = env::var("BODY_LIMIT_MB")
                .unwrap_or_else(|_| "5".into())
                .parse::<usize>()
                .expect("BODY_LIMIT_MB must be a valid integer");
            mb * 1024 * 1024
        };

        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse::<u16>()
            .expect("PORT must be a valid number between 0 and 65535");

        Config {
            port,
            body_limit_bytes,
            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "./model/pest_identifier.pb".into()),
            class_list_path: env::var("CLASS_LIST_PATH")
                .unwrap_or_else(|_| "./model/class_list.txt".into()),
            pesticide_csv_path: env::var("PESTICIDE_CSV_PATH")
                .unwrap_or_else(|_| "./data/natural_pesticides.csv".into()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into()).into(),
            keep_uploads: env::var("KEEP_UPLOADS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

async fn download_file(url: &str, path: &str) {
    log::info!("downloading {} from {}", path, url);

    let mut header_map = HeaderMap::new();

    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .expect("Invalid GITHUB_TOKEN format");
        header_map.insert(HeaderName::from_static("authorization"), auth_value);
    }
    header_map.insert(
        HeaderName::from_static("accept"),
        HeaderValue::from_static("application/octet-stream"),
    );

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .expect("Failed to send request");

    if !response.status().is_success() {
        panic!("Failed to download {}: {}", url, response.status());
    }

    let bytes = response.bytes().await.expect("Failed to read bytes");
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).expect("Failed to create artifact directory");
    }
    fs::write(path, bytes).expect("Failed to write file");
}

/// Fetches any missing startup artifact from its companion URL
/// variable. A missing artifact with no URL configured is fatal.
pub async fn ensure_files_exist(config: &Config) {
    log::info!("checking startup artifacts");

    let artifacts = [
        (&config.model_path, "MODEL_URL"),
        (&config.class_list_path, "CLASS_LIST_URL"),
        (&config.pesticide_csv_path, "PESTICIDE_CSV_URL"),
    ];

    for (path, url_var) in artifacts {
        if !Path::new(path).exists() {
            let url = env::var(url_var)
                .unwrap_or_else(|_| panic!("{} is missing and {} is not set", path, url_var));
            download_file(&url, path).await;
        }
    }
}
