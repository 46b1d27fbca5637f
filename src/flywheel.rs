use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::error::GearError;

#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub parents: HashMap<String, String>,
    #[serde(default)]
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BidsDownload {
    pub acquisition_id: String,
    pub file_name: String,
    pub bids_path: Utf8PathBuf,
    pub bids_name: String,
    pub folder: String,
}

pub trait FlywheelClient: Send + Sync {
    fn get(&self, id: &str) -> Result<Container, GearError>;
    fn gather_bids(
        &self,
        project_label: &str,
        subjects: &[String],
        sessions: &[String],
    ) -> Result<Vec<BidsDownload>, GearError>;
    fn download_file(&self, download: &BidsDownload, destination: &Path)
    -> Result<(), GearError>;
}

#[derive(Debug, Clone, Deserialize)]
struct SessionListing {
    #[serde(rename = "_id")]
    id: String,
    label: String,
    subject: SubjectRef,
}

#[derive(Debug, Clone, Deserialize)]
struct SubjectRef {
    label: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AcquisitionListing {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileEntry {
    name: String,
    #[serde(default)]
    info: FileInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileInfo {
    #[serde(rename = "BIDS", default)]
    bids: Option<BidsInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct BidsInfo {
    #[serde(rename = "Path", default)]
    path: String,
    #[serde(rename = "Folder", default)]
    folder: String,
    #[serde(rename = "Filename", default)]
    filename: String,
    #[serde(rename = "ignore", default)]
    ignore: bool,
}

#[derive(Debug, Clone)]
pub struct FlywheelHttpClient {
    client: Client,
    base_url: String,
}

impl FlywheelHttpClient {
    pub fn new(api_key: &str) -> Result<Self, GearError> {
        let (host, _token) = api_key.split_once(':').ok_or(GearError::InvalidApiKey)?;
        if host.trim().is_empty() {
            return Err(GearError::InvalidApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("vcid-asl-gear/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GearError::FlywheelHttp(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(&format!("scitran-user {api_key}"))
            .map_err(|_| GearError::InvalidApiKey)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GearError::FlywheelHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("https://{}/api", host.trim()),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GearError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "flywheel request failed".to_string());
        Err(GearError::FlywheelStatus { status, message })
    }

    fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T, GearError> {
        let response = request
            .send()
            .map_err(|err| GearError::FlywheelHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .json::<T>()
            .map_err(|err| GearError::FlywheelHttp(err.to_string()))
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, GearError> {
        self.send_json(self.client.get(url))
    }

    fn project_query(&self, label: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(format!("{}/projects", self.base_url))
            .query(&[("filter", format!("label={label}"))])
    }

    fn find_project(&self, label: &str) -> Result<Container, GearError> {
        let projects: Vec<Container> = self.send_json(self.project_query(label))?;
        projects
            .into_iter()
            .find(|project| project.label == label)
            .ok_or_else(|| GearError::ProjectNotFound(label.to_string()))
    }

    fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionListing>, GearError> {
        let url = format!("{}/projects/{}/sessions", self.base_url, project_id);
        self.get_json(&url)
    }

    fn list_acquisitions(&self, session_id: &str) -> Result<Vec<AcquisitionListing>, GearError> {
        let url = format!("{}/sessions/{}/acquisitions", self.base_url, session_id);
        self.get_json(&url)
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), GearError> {
        let mut file =
            File::create(destination).map_err(|err| GearError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| GearError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl FlywheelClient for FlywheelHttpClient {
    fn get(&self, id: &str) -> Result<Container, GearError> {
        let url = format!("{}/containers/{}", self.base_url, id);
        self.get_json(&url)
    }

    fn gather_bids(
        &self,
        project_label: &str,
        subjects: &[String],
        sessions: &[String],
    ) -> Result<Vec<BidsDownload>, GearError> {
        let project = self.find_project(project_label)?;
        let mut downloads = Vec::new();
        for session in self.list_sessions(&project.id)? {
            if !subjects.contains(&session.subject.label) || !sessions.contains(&session.label) {
                continue;
            }
            for acquisition in self.list_acquisitions(&session.id)? {
                for file in acquisition.files {
                    let Some(bids) = file.info.bids else {
                        continue;
                    };
                    if bids.ignore || bids.filename.is_empty() {
                        continue;
                    }
                    downloads.push(BidsDownload {
                        acquisition_id: acquisition.id.clone(),
                        file_name: file.name,
                        bids_path: Utf8PathBuf::from(bids.path),
                        bids_name: bids.filename,
                        folder: bids.folder,
                    });
                }
            }
        }
        Ok(downloads)
    }

    fn download_file(
        &self,
        download: &BidsDownload,
        destination: &Path,
    ) -> Result<(), GearError> {
        let url = format!(
            "{}/acquisitions/{}/files/{}",
            self.base_url, download.acquisition_id, download.file_name
        );
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| GearError::FlywheelHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        self.write_response_to_file(response, destination)
    }
}
