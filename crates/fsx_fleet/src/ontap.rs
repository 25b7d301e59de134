//! Minimal ONTAP REST client (basic auth, JSON bodies).

use log::warn;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Error;
use strum::{AsRefStr, EnumString};

#[derive(Debug, Deserialize)]
struct Records<T> {
    #[serde(default = "Vec::new")]
    records: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeRecord {
    pub uuid: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LunRecord {
    pub uuid: String,
    #[serde(default)]
    pub space: Option<LunSpace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LunSpace {
    #[serde(default)]
    pub size: Option<u64>,
}

impl LunRecord {
    pub fn size(&self) -> Option<u64> {
        self.space.as_ref().and_then(|s| s.size)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SvmPeerRecord {
    pub uuid: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SvmPeerState {
    Peered,
    Pending,
    Initializing,
    Initiated,
    Rejected,
    Suspended,
}

impl SvmPeerRecord {
    pub fn peer_state(&self) -> Option<SvmPeerState> {
        self.state.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Serialize)]
pub struct NameRef {
    pub name: String,
}

impl NameRef {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClusterPeerRemote {
    pub ip_addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClusterPeerEncryption {
    pub proposed: String,
}

#[derive(Debug, Serialize)]
pub struct ClusterPeerCreate {
    pub name: String,
    pub remote: ClusterPeerRemote,
    pub encryption: ClusterPeerEncryption,
    pub passphrase: String,
}

impl ClusterPeerCreate {
    pub fn new(name: &str, remote_lifs: &[String], passphrase: &str) -> Self {
        Self {
            name: name.to_string(),
            remote: ClusterPeerRemote {
                ip_addresses: remote_lifs.to_vec(),
            },
            encryption: ClusterPeerEncryption {
                proposed: "tls_psk".to_string(),
            },
            passphrase: passphrase.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SvmPeerTarget {
    pub svm: NameRef,
    pub cluster: NameRef,
}

#[derive(Debug, Serialize)]
pub struct SvmPeerCreate {
    pub svm: NameRef,
    pub peer: SvmPeerTarget,
    pub applications: Vec<String>,
}

impl SvmPeerCreate {
    pub fn snapmirror(local_svm: &str, peer_svm: &str, peer_cluster: &str) -> Self {
        Self {
            svm: NameRef::new(local_svm),
            peer: SvmPeerTarget {
                svm: NameRef::new(peer_svm),
                cluster: NameRef::new(peer_cluster),
            },
            applications: vec!["snapmirror".to_string()],
        }
    }
}

pub fn parse_records<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, Error> {
    let res: Records<T> = serde_json::from_str(body)
        .map_err(|e| Error::other(format!("Invalid ONTAP response: {e}")))?;
    Ok(res.records)
}

pub struct OntapClient {
    host: String,
    username: String,
    password: String,
    http: Client,
}

impl OntapClient {
    pub fn new(host: &str, username: &str, password: &str, verify_ssl: bool) -> Result<Self, Error> {
        if !verify_ssl {
            warn!("TLS certificate verification disabled for {host}");
        }
        let http = Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| Error::other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            http,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}/api/{}", self.host, path.trim_start_matches('/'))
    }

    /// Sends one request; non-2xx statuses become errors carrying the body.
    fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<(StatusCode, String), Error> {
        let url = self.url(path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .map_err(|e| Error::other(format!("{method} {url} failed: {e}")))?;
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            return Err(Error::other(format!(
                "HTTP {status} from {method} {url}: {text}"
            )));
        }
        Ok((status, text))
    }

    fn get_records<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, Error> {
        let (_, body) = self.send::<()>(Method::GET, path, query, None)?;
        parse_records(&body)
    }

    pub fn get_volume(&self, svm: &str, name: &str) -> Result<VolumeRecord, Error> {
        self.get_records(
            "storage/volumes",
            &[("name", name), ("svm.name", svm), ("fields", "size")],
        )?
        .into_iter()
        .next()
        .ok_or_else(|| Error::other(format!("Volume {name} not found in SVM {svm}")))
    }

    pub fn resize_volume(&self, uuid: &str, size: u64) -> Result<StatusCode, Error> {
        let body = serde_json::json!({ "size": size });
        let (status, _) =
            self.send(Method::PATCH, &format!("storage/volumes/{uuid}"), &[], Some(&body))?;
        Ok(status)
    }

    pub fn get_lun(&self, svm: &str, path: &str) -> Result<LunRecord, Error> {
        self.get_records(
            "storage/luns",
            &[("name", path), ("svm.name", svm), ("fields", "space.size")],
        )?
        .into_iter()
        .next()
        .ok_or_else(|| Error::other(format!("LUN {path} not found in SVM {svm}")))
    }

    pub fn resize_lun(&self, uuid: &str, size: u64) -> Result<StatusCode, Error> {
        let body = serde_json::json!({ "space": { "size": size } });
        let (status, _) =
            self.send(Method::PATCH, &format!("storage/luns/{uuid}"), &[], Some(&body))?;
        Ok(status)
    }

    pub fn create_cluster_peer(&self, req: &ClusterPeerCreate) -> Result<StatusCode, Error> {
        let (status, _) = self.send(Method::POST, "cluster/peers", &[], Some(req))?;
        Ok(status)
    }

    pub fn create_svm_peer(&self, req: &SvmPeerCreate) -> Result<StatusCode, Error> {
        let (status, _) = self.send(Method::POST, "svm/peers", &[], Some(req))?;
        Ok(status)
    }

    pub fn find_svm_peer(&self, svm: &str, peer_svm: &str) -> Result<Option<SvmPeerRecord>, Error> {
        let records = self.get_records(
            "svm/peers",
            &[
                ("svm.name", svm),
                ("peer.svm.name", peer_svm),
                ("fields", "uuid,state"),
            ],
        )?;
        Ok(records.into_iter().next())
    }

    pub fn accept_svm_peer(&self, uuid: &str) -> Result<StatusCode, Error> {
        let body = serde_json::json!({ "state": SvmPeerState::Peered.as_ref() });
        let (status, _) = self.send(Method::PATCH, &format!("svm/peers/{uuid}"), &[], Some(&body))?;
        Ok(status)
    }
}
