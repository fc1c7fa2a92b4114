// Cadence — Unix Domain Socket Server
//
// Listens on a Unix domain socket for newline-delimited JSON-RPC 2.0 requests
// from local services (the lesson scheduler, the web backend). Each
// connection is handled in a spawned tokio task sharing one `Gateway`.
//
// The socket is owner-only; the transport trusts whatever `owner` and `roles`
// a connected client supplies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{UnixListener, UnixStream};

use crate::access::RoleSet;
use crate::error::{CadenceError, Result};
use crate::service::{Caller, Gateway};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};

const DEFAULT_RECENT_LIMIT: usize = 20;

/// Longest request line accepted, newline excluded.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Unix Domain Socket server for Cadence.
pub struct UdsServer {
    gateway: Arc<Gateway>,
    socket_path: PathBuf,
}

impl UdsServer {
    pub fn new(gateway: Arc<Gateway>, socket_path: PathBuf) -> Self {
        Self {
            gateway,
            socket_path,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one, and restrict it to the owner.
    pub async fn bind(&self) -> Result<UnixListener> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        tracing::info!(
            socket = %self.socket_path.display(),
            "Cadence UDS server listening"
        );
        Ok(listener)
    }

    /// Bind and serve until the process is terminated.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            let (stream, _addr) = listener.accept().await?;
            let gateway = self.gateway.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, gateway).await {
                    tracing::error!("Connection handler error: {}", e);
                }
            });
        }
    }
}

/// Reads newline-delimited JSON-RPC requests and writes one response line per
/// request. A line over `MAX_REQUEST_BYTES` gets an `INVALID_REQUEST` response
/// and the connection is closed.
async fn handle_connection(stream: UnixStream, gateway: Arc<Gateway>) -> Result<()> {
    if let Ok(cred) = stream.peer_cred() {
        tracing::debug!(uid = cred.uid(), pid = ?cred.pid(), "Client connected");
    }

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(line) = read_request_line(&mut reader, MAX_REQUEST_BYTES).await? {
        let response = match line {
            RequestLine::Text(text) if text.trim().is_empty() => continue,
            RequestLine::Text(text) => process_request(&text, &gateway).await,
            RequestLine::TooLong => {
                tracing::warn!(limit = MAX_REQUEST_BYTES, "Request line too long, closing");
                let response = JsonRpcResponse::error(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Request exceeds {} bytes", MAX_REQUEST_BYTES),
                );
                write_response(&mut writer, &response).await?;
                break;
            }
        };
        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let mut json = serde_json::to_string(response)
        .map_err(|e| CadenceError::Io(std::io::Error::other(e)))?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum RequestLine {
    Text(String),
    TooLong,
}

/// Read one line of at most `limit` bytes (plus its `\n`). `None` at end of
/// stream. A final line without a newline is still returned.
async fn read_request_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> std::io::Result<Option<RequestLine>> {
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > limit {
        return Ok(Some(RequestLine::TooLong));
    }

    String::from_utf8(buf)
        .map(|text| Some(RequestLine::Text(text)))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Parse and dispatch a single JSON-RPC request.
pub(crate) async fn process_request(raw: &str, gateway: &Gateway) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let id = request.id.clone();
    match dispatch(&request, gateway).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(RpcFailure::BadParams(message)) => JsonRpcResponse::error(id, INVALID_PARAMS, message),
        Err(RpcFailure::UnknownMethod) => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
        ),
        Err(RpcFailure::Gateway(e)) => {
            tracing::debug!(method = %request.method, error = %e, "Request failed");
            JsonRpcResponse::from_error(id, &e)
        }
    }
}

enum RpcFailure {
    BadParams(String),
    UnknownMethod,
    Gateway(CadenceError),
}

impl From<CadenceError> for RpcFailure {
    fn from(e: CadenceError) -> Self {
        RpcFailure::Gateway(e)
    }
}

impl From<serde_json::Error> for RpcFailure {
    fn from(e: serde_json::Error) -> Self {
        RpcFailure::BadParams(format!("Invalid params: {}", e))
    }
}

// ─── Params ──────────────────────────────────────────────────────────────────

/// Roles may arrive as an array of tags or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RolesParam {
    List(Vec<String>),
    Csv(String),
}

impl RolesParam {
    fn into_role_set(self) -> RoleSet {
        match self {
            RolesParam::List(tags) => RoleSet::from_tags(tags),
            RolesParam::Csv(csv) => RoleSet::from_csv(&csv),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallerParams {
    owner: String,
    #[serde(default)]
    roles: Option<RolesParam>,
}

#[derive(Debug, Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StoreParams {
    name: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    #[serde(default)]
    limit: Option<usize>,
}

fn caller_from(params: &Value) -> std::result::Result<Caller, RpcFailure> {
    let raw: CallerParams = serde_json::from_value(params.clone())?;
    let roles = raw
        .roles
        .map(RolesParam::into_role_set)
        .unwrap_or_default();
    Ok(Caller::new(&raw.owner, roles)?)
}

fn parse<T: serde::de::DeserializeOwned>(params: &Value) -> std::result::Result<T, RpcFailure> {
    Ok(serde_json::from_value(params.clone())?)
}

fn to_json<T: serde::Serialize>(value: &T) -> std::result::Result<Value, RpcFailure> {
    serde_json::to_value(value)
        .map_err(|e| RpcFailure::Gateway(CadenceError::Io(std::io::Error::other(e))))
}

// ─── Method Dispatch ─────────────────────────────────────────────────────────

async fn dispatch(
    request: &JsonRpcRequest,
    gateway: &Gateway,
) -> std::result::Result<Value, RpcFailure> {
    let params = &request.params;
    if !params.is_object() {
        return Err(RpcFailure::BadParams(
            "params must be an object with an 'owner' field".to_string(),
        ));
    }

    match request.method.as_str() {
        "vault.store" => {
            let caller = caller_from(params)?;
            let p: StoreParams = parse(params)?;
            gateway.store_credential(&caller, &p.name, &p.secret)?;
            Ok(json!({ "stored": true, "name": p.name }))
        }
        "vault.get" => {
            let caller = caller_from(params)?;
            let p: NameParams = parse(params)?;
            let secret = gateway.get_credential(&caller, &p.name)?;
            Ok(json!({ "name": p.name, "secret": secret.as_str() }))
        }
        "vault.list" => {
            let caller = caller_from(params)?;
            let summaries = gateway.list_credentials(&caller)?;
            to_json(&summaries)
        }
        "vault.delete" => {
            let caller = caller_from(params)?;
            let p: NameParams = parse(params)?;
            let deleted = gateway.delete_credential(&caller, &p.name)?;
            Ok(json!({ "deleted": deleted, "name": p.name }))
        }
        "knowledge.search" => {
            let caller = caller_from(params)?;
            let p: QueryParams = parse(params)?;
            let items = gateway.search_knowledge(&caller, &p.query)?;
            to_json(&items)
        }
        "knowledge.answer" => {
            let caller = caller_from(params)?;
            let p: QueryParams = parse(params)?;
            let answer = gateway.ask(&caller, &p.query).await?;
            to_json(&answer)
        }
        "access.permissions" => {
            let caller = caller_from(params)?;
            let grant = gateway.permissions(&caller)?;
            to_json(&grant)
        }
        "audit.recent" => {
            let caller = caller_from(params)?;
            let p: LimitParams = parse(params)?;
            let entries =
                gateway.recent_usage(&caller, p.limit.unwrap_or(DEFAULT_RECENT_LIMIT))?;
            to_json(&entries)
        }
        "audit.summary" => {
            let caller = caller_from(params)?;
            let summary = gateway.usage_summary(&caller)?;
            to_json(&summary)
        }
        _ => Err(RpcFailure::UnknownMethod),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
