//! Client side of the smart HTTP protocol.
//!
//! Reference discovery is a `GET` of `info/refs`; the pack is requested
//! with a protocol v2 `fetch` command `POST`ed to `git-upload-pack`.

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::{GitError, Result};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use twig_storage::ObjectId;

/// Sideband channel carrying pack data.
const BAND_DATA: u8 = 1;
/// Sideband channel carrying progress messages.
const BAND_PROGRESS: u8 = 2;
/// Sideband channel carrying a fatal remote error.
const BAND_ERROR: u8 = 3;

/// Moves bytes to and from a remote.
pub trait Transport {
    /// Issues a GET and returns the body of a successful response.
    fn get(&self, url: &str) -> Result<Bytes>;

    /// Issues a POST and returns the body of a successful response.
    fn post(&self, url: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Result<Bytes>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Whole-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("twig/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
        }
    }
}

/// [`Transport`] over blocking HTTP(S).
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Creates a transport with the given options.
    pub fn new(options: &HttpOptions) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()
            .map_err(|e| GitError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn finish(url: &str, response: reqwest::Result<reqwest::blocking::Response>) -> Result<Bytes> {
        let response =
            response.map_err(|e| GitError::Transport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GitError::Transport(format!("{} returned {}", url, status)));
        }

        response
            .bytes()
            .map_err(|e| GitError::Transport(format!("reading body of {} failed: {}", url, e)))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Bytes> {
        tracing::debug!(url, "GET");
        Self::finish(url, self.client.get(url).send())
    }

    fn post(&self, url: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Result<Bytes> {
        tracing::debug!(url, bytes = body.len(), "POST");
        let mut request = self.client.post(url).body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::finish(url, request.send())
    }
}

/// The refs a remote advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefAdvertisement {
    /// Ref name to object id, `HEAD` included when advertised.
    pub refs: BTreeMap<String, ObjectId>,
    /// Capabilities sent after the first ref.
    pub capabilities: Vec<String>,
}

impl RefAdvertisement {
    /// Returns the id HEAD points at.
    pub fn head(&self) -> Option<ObjectId> {
        self.refs.get("HEAD").copied()
    }

    /// Returns the ref HEAD is attached to.
    ///
    /// Prefers the `symref=HEAD:<ref>` capability; otherwise picks the
    /// first branch whose id matches HEAD's.
    pub fn head_target(&self) -> Option<String> {
        let symref = self
            .capabilities
            .iter()
            .find_map(|cap| cap.strip_prefix("symref=HEAD:"));
        if let Some(target) = symref {
            return Some(target.to_string());
        }

        let head = self.head()?;
        self.refs
            .iter()
            .find(|(name, id)| name.starts_with("refs/heads/") && **id == head)
            .map(|(name, _)| name.clone())
    }

    /// Parses a discovery response body.
    ///
    /// Comment lines (`# service=...`) and flush packets are skipped, and
    /// capabilities are split off at the first NUL. Peeled tag entries
    /// (`^{}`) and the placeholder line of an empty repository are left
    /// out.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut advertisement = Self::default();

        for pkt in PktLineReader::new(body) {
            let pkt = pkt?;
            let Some(data) = pkt.data() else { continue };

            let (line, capabilities) = match data.iter().position(|&b| b == 0) {
                Some(nul) => (&data[..nul], Some(&data[nul + 1..])),
                None => (data, None),
            };
            if let Some(capabilities) = capabilities {
                let capabilities = String::from_utf8_lossy(capabilities);
                advertisement
                    .capabilities
                    .extend(capabilities.split_whitespace().map(str::to_string));
            }

            let line = std::str::from_utf8(line)
                .map_err(|_| GitError::Protocol("ref line is not UTF-8".to_string()))?
                .trim_end_matches('\n');
            if line.starts_with('#') || line.is_empty() {
                continue;
            }

            let (hash, name) = line
                .split_once(' ')
                .ok_or_else(|| GitError::Protocol(format!("malformed ref line: {:?}", line)))?;
            if name.ends_with("^{}") {
                continue;
            }
            let id = ObjectId::from_hex(hash)
                .map_err(|_| GitError::Protocol(format!("malformed ref line: {:?}", line)))?;
            advertisement.refs.insert(name.to_string(), id);
        }

        Ok(advertisement)
    }
}

/// Smart HTTP client for one remote.
pub struct TransportClient<T> {
    transport: T,
}

impl<T: Transport> TransportClient<T> {
    /// Wraps a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Asks the remote which refs it has.
    pub fn discover_refs(&self, base_url: &str) -> Result<RefAdvertisement> {
        let url = format!(
            "{}/info/refs?service=git-upload-pack",
            base_url.trim_end_matches('/')
        );
        let body = self.transport.get(&url)?;
        let advertisement = RefAdvertisement::parse(&body)?;

        tracing::info!(
            url = %base_url,
            refs = advertisement.refs.len(),
            "discovered refs"
        );
        Ok(advertisement)
    }

    /// Requests a pack holding `wants` and everything they reach.
    ///
    /// Returns the raw response body; [`extract_pack`] strips the framing.
    pub fn fetch_pack(&self, base_url: &str, wants: &[ObjectId]) -> Result<Bytes> {
        let url = format!("{}/git-upload-pack", base_url.trim_end_matches('/'));
        let body = fetch_request(wants)?;
        let headers = [
            ("Git-Protocol", "version=2"),
            ("Content-Type", "application/x-git-upload-pack-request"),
        ];

        let response = self.transport.post(&url, &headers, body)?;
        tracing::info!(url = %base_url, bytes = response.len(), "fetched pack response");
        Ok(response)
    }
}

/// Builds a protocol v2 `fetch` request body for `wants`, skipping repeats.
pub fn fetch_request(wants: &[ObjectId]) -> Result<Vec<u8>> {
    let mut writer = PktLineWriter::new(Vec::new());
    writer.write_data(b"command=fetch")?;
    writer.delimiter()?;
    writer.write_data(b"no-progress")?;

    let mut seen = BTreeSet::new();
    for want in wants {
        if seen.insert(*want) {
            writer.write_line(&format!("want {}", want))?;
        }
    }

    writer.write_line("done")?;
    writer.flush_pkt()?;
    Ok(writer.into_inner())
}

/// Pulls the raw pack out of a fetch response.
///
/// Section lines are skipped up to the `packfile` line; after it, sideband
/// channel 1 is pack data, channel 2 is progress, and channel 3 is an error
/// reported by the remote. A body that already is a pack is returned as is.
pub fn extract_pack(body: &[u8]) -> Result<Vec<u8>> {
    if body.starts_with(b"PACK") {
        return Ok(body.to_vec());
    }

    let mut pack = Vec::new();
    let mut in_pack = false;

    for pkt in PktLineReader::new(body) {
        let data = match pkt? {
            PktLine::Data(data) => data,
            PktLine::Flush | PktLine::ResponseEnd if in_pack => break,
            _ => continue,
        };

        if !in_pack {
            if let Some(message) = data.strip_prefix(b"ERR ") {
                return Err(GitError::Transport(format!(
                    "remote error: {}",
                    String::from_utf8_lossy(message).trim_end()
                )));
            }
            in_pack = data.strip_suffix(b"\n").unwrap_or(&data) == b"packfile";
            continue;
        }

        match data.split_first() {
            Some((&BAND_DATA, payload)) => pack.extend_from_slice(payload),
            Some((&BAND_PROGRESS, message)) => {
                tracing::trace!(message = %String::from_utf8_lossy(message).trim_end(), "remote");
            }
            Some((&BAND_ERROR, message)) => {
                return Err(GitError::Transport(format!(
                    "remote error: {}",
                    String::from_utf8_lossy(message).trim_end()
                )));
            }
            Some((band, _)) => {
                return Err(GitError::Protocol(format!("unknown sideband channel {}", band)));
            }
            None => {}
        }
    }

    if !in_pack {
        return Err(GitError::Protocol(
            "response has no packfile section".to_string(),
        ));
    }
    tracing::debug!(bytes = pack.len(), "extracted pack");
    Ok(pack)
}
