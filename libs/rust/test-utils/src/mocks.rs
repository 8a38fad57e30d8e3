//! In-memory Vault server.
//!
//! [`FakeVault`] answers the `v1` routes the client uses from a single
//! mutable state, so multi-step flows (initialize, unseal, mount, remount,
//! seal) behave as they would against a real server. It is served by a
//! `wiremock` server, which also records every request for assertions.

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::fixtures;

#[derive(Debug, Clone)]
struct Mount {
    kind: String,
    description: String,
}

impl Mount {
    fn new(kind: &str, description: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct AuditDevice {
    kind: String,
    description: String,
    options: Value,
}

#[derive(Debug, Clone)]
struct User {
    password: String,
    policies: Vec<String>,
}

#[derive(Debug)]
struct State {
    initialized: bool,
    sealed: bool,
    threshold: u32,
    keys: Vec<String>,
    accepted: Vec<String>,
    unseal_calls: usize,
    root_token: Option<String>,
    tokens: BTreeMap<String, Vec<String>>,
    issued: u64,
    mounts: BTreeMap<String, Mount>,
    auth: BTreeMap<String, Mount>,
    audit: BTreeMap<String, AuditDevice>,
    policies: BTreeMap<String, String>,
    raw: BTreeMap<String, String>,
    secrets: BTreeMap<String, Value>,
    users: BTreeMap<(String, String), User>,
}

fn respond(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

fn no_content() -> ResponseTemplate {
    ResponseTemplate::new(204)
}

fn error(status: u16, message: &str) -> ResponseTemplate {
    respond(status, fixtures::errors(&[message]))
}

fn not_found() -> ResponseTemplate {
    respond(404, json!({ "errors": [] }))
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

fn split_policies(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn caller_token(request: &Request) -> Option<String> {
    if let Some(token) = request.headers.get("x-vault-token").and_then(|v| v.to_str().ok()) {
        return Some(token.to_string());
    }
    request
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix("token="))
        })
        .map(str::to_string)
}

impl State {
    fn new() -> Self {
        let mounts = BTreeMap::from([
            ("secret".to_string(), Mount::new("generic", "generic secret storage")),
            ("cubbyhole".to_string(), Mount::new("cubbyhole", "per-token private secret storage")),
            ("sys".to_string(), Mount::new("system", "system endpoints")),
        ]);
        let auth = BTreeMap::from([("token".to_string(), Mount::new("token", "token based credentials"))]);
        let policies = BTreeMap::from([("root".to_string(), String::new())]);

        Self {
            initialized: false,
            sealed: true,
            threshold: 0,
            keys: Vec::new(),
            accepted: Vec::new(),
            unseal_calls: 0,
            root_token: None,
            tokens: BTreeMap::new(),
            issued: 0,
            mounts,
            auth,
            audit: BTreeMap::new(),
            policies,
            raw: BTreeMap::new(),
            secrets: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }

    fn issue_token(&mut self, policies: Vec<String>) -> String {
        self.issued += 1;
        let id = format!("{:08x}-0000-4000-8000-{:012x}", self.issued, self.issued);
        self.tokens.insert(id.clone(), policies);
        id
    }

    fn login_response(&self, id: &str) -> ResponseTemplate {
        let policies = self.tokens.get(id).cloned().unwrap_or_default();
        let policies: Vec<&str> = policies.iter().map(String::as_str).collect();
        respond(200, fixtures::login(id, &policies))
    }

    fn seal_status(&self) -> Value {
        let shares = u32::try_from(self.keys.len()).unwrap_or(u32::MAX);
        let progress = u32::try_from(self.accepted.len()).unwrap_or(u32::MAX);
        fixtures::seal_status(self.sealed, self.threshold, shares, progress)
    }

    fn handle(&mut self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().trim_start_matches("/v1/").trim_end_matches('/').to_string();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let segments: Vec<&str> = path.split('/').collect();
        let method = request.method.as_str();

        match (method, segments.as_slice()) {
            ("GET", ["sys", "init"]) => return respond(200, json!({ "initialized": self.initialized })),
            ("PUT" | "POST", ["sys", "init"]) => return self.initialize(&body),
            ("GET", ["sys", "seal-status"]) => return respond(200, self.seal_status()),
            ("PUT" | "POST", ["sys", "unseal"]) => return self.unseal(&body),
            ("GET", ["sys", "health"]) => {
                return respond(
                    200,
                    json!({
                        "initialized": self.initialized,
                        "sealed": self.sealed,
                        "standby": false,
                        "server_time_utc": 0,
                    }),
                );
            }
            ("GET", ["sys", "leader"]) => {
                return respond(
                    200,
                    json!({ "ha_enabled": false, "is_self": false, "leader_address": "" }),
                );
            }
            _ => {}
        }

        if !self.initialized {
            return error(400, "Vault is not initialized");
        }
        if self.sealed {
            if matches!((method, segments.as_slice()), ("PUT" | "POST", ["sys", "seal"])) {
                self.accepted.clear();
                return no_content();
            }
            return error(503, "Vault is sealed");
        }

        let is_login = matches!(segments.as_slice(), ["auth", _, "login", ..]);
        if !is_login && !caller_token(request).is_some_and(|t| self.tokens.contains_key(&t)) {
            return error(403, "permission denied");
        }

        match (method, segments.as_slice()) {
            ("PUT" | "POST", ["sys", "seal"]) => {
                self.sealed = true;
                self.accepted.clear();
                no_content()
            }
            (_, ["sys", "mounts", ..] | ["sys", "remount"]) => self.mounts_route(method, &segments[2..], &body),
            (_, ["sys", "auth", ..]) => self.auth_mounts_route(method, &segments[2..], &body),
            (_, ["sys", "policy", ..]) => self.policy_route(method, &segments[2..], &body),
            (_, ["sys", "audit", ..]) => self.audit_route(method, &segments[2..], &body),
            (_, ["sys", "raw", rest @ ..]) => self.raw_route(method, &rest.join("/"), &body),
            ("PUT" | "POST", ["sys", "renew", rest @ ..]) => respond(
                200,
                json!({
                    "lease_id": rest.join("/"),
                    "lease_duration": body.get("increment").and_then(Value::as_u64).unwrap_or(3600),
                    "renewable": true,
                }),
            ),
            ("PUT" | "POST", ["sys", "revoke" | "revoke-prefix", ..]) => no_content(),
            (_, ["auth", "token", rest @ ..]) => self.token_route(method, rest, &body, request),
            (_, ["auth", mount, rest @ ..]) => self.auth_route(method, mount, rest, &body),
            _ => self.secret_route(method, &path, &body),
        }
    }

    fn initialize(&mut self, body: &Value) -> ResponseTemplate {
        if self.initialized {
            return error(400, "Vault is already initialized");
        }
        let shares = body.get("secret_shares").and_then(Value::as_u64).unwrap_or(0);
        let threshold = body.get("secret_threshold").and_then(Value::as_u64).unwrap_or(0);
        if threshold == 0 || threshold > shares {
            return error(400, "invalid seal configuration: threshold must be between 1 and shares");
        }

        self.keys = (1..=shares).map(|i| format!("{:02x}", i % 256).repeat(32)).collect();
        self.threshold = u32::try_from(threshold).unwrap_or(u32::MAX);
        let root = self.issue_token(vec!["root".to_string()]);
        self.root_token = Some(root.clone());
        self.initialized = true;
        self.sealed = true;

        respond(200, json!({ "keys": self.keys, "root_token": root }))
    }

    fn unseal(&mut self, body: &Value) -> ResponseTemplate {
        self.unseal_calls += 1;
        if !self.initialized {
            return error(400, "server is not yet initialized");
        }
        if body.get("reset").and_then(Value::as_bool) == Some(true) {
            self.accepted.clear();
            return respond(200, self.seal_status());
        }
        let Some(key) = str_field(body, "key") else {
            return error(400, "'key' must be specified in request body as JSON, or 'reset' set to true");
        };
        if !self.sealed {
            return respond(200, self.seal_status());
        }
        if !self.keys.iter().any(|k| k == key) {
            return error(400, "invalid key");
        }
        if !self.accepted.iter().any(|k| k == key) {
            self.accepted.push(key.to_string());
        }
        if self.accepted.len() >= self.threshold as usize {
            self.sealed = false;
            self.accepted.clear();
        }
        respond(200, self.seal_status())
    }

    fn mounts_route(&mut self, method: &str, rest: &[&str], body: &Value) -> ResponseTemplate {
        match (method, rest) {
            ("GET", []) => {
                let table: Map<String, Value> = self
                    .mounts
                    .iter()
                    .map(|(name, m)| {
                        (
                            format!("{name}/"),
                            json!({ "type": m.kind, "description": m.description, "config": {} }),
                        )
                    })
                    .collect();
                respond(200, Value::Object(table))
            }
            ("POST" | "PUT", []) => {
                let (Some(from), Some(to)) = (str_field(body, "from"), str_field(body, "to")) else {
                    return error(400, "both 'from' and 'to' are required");
                };
                self.remount(from.trim_matches('/'), to.trim_matches('/'))
            }
            ("POST" | "PUT", name) => {
                let name = name.join("/");
                if self.mounts.contains_key(&name) {
                    return error(400, &format!("existing mount at {name}/"));
                }
                let Some(kind) = str_field(body, "type") else {
                    return error(400, "backend type must be specified as a string");
                };
                let description = str_field(body, "description").unwrap_or_default();
                self.mounts.insert(name, Mount::new(kind, description));
                no_content()
            }
            ("DELETE", name) => {
                let name = name.join("/");
                if self.mounts.remove(&name).is_none() {
                    return error(400, &format!("no matching mount at '{name}/'"));
                }
                let prefix = format!("{name}/");
                self.secrets.retain(|path, _| !path.starts_with(&prefix));
                no_content()
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn remount(&mut self, from: &str, to: &str) -> ResponseTemplate {
        if self.mounts.contains_key(to) {
            return error(400, &format!("existing mount at {to}/"));
        }
        let Some(mount) = self.mounts.remove(from) else {
            return error(400, &format!("no matching mount at '{from}/'"));
        };
        self.mounts.insert(to.to_string(), mount);

        let prefix = format!("{from}/");
        let moved: Vec<String> = self.secrets.keys().filter(|p| p.starts_with(&prefix)).cloned().collect();
        for path in moved {
            if let Some(value) = self.secrets.remove(&path) {
                self.secrets.insert(format!("{to}/{}", &path[prefix.len()..]), value);
            }
        }
        no_content()
    }

    fn auth_mounts_route(&mut self, method: &str, rest: &[&str], body: &Value) -> ResponseTemplate {
        match (method, rest) {
            ("GET", []) => {
                let table: Map<String, Value> = self
                    .auth
                    .iter()
                    .map(|(name, m)| (format!("{name}/"), json!({ "type": m.kind, "description": m.description })))
                    .collect();
                respond(200, Value::Object(table))
            }
            ("POST" | "PUT", name) if !name.is_empty() => {
                let name = name.join("/");
                if self.auth.contains_key(&name) {
                    return error(400, &format!("path is already in use at {name}/"));
                }
                let Some(kind) = str_field(body, "type") else {
                    return error(400, "backend type must be specified as a string");
                };
                let description = str_field(body, "description").unwrap_or_default();
                self.auth.insert(name, Mount::new(kind, description));
                no_content()
            }
            ("DELETE", name) if !name.is_empty() => {
                let name = name.join("/");
                if name == "token" {
                    return error(400, "token credential backend cannot be disabled");
                }
                self.auth.remove(&name);
                no_content()
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn policy_route(&mut self, method: &str, rest: &[&str], body: &Value) -> ResponseTemplate {
        match (method, rest) {
            ("GET", []) => {
                let names: Vec<&String> = self.policies.keys().collect();
                respond(200, json!({ "policies": names, "keys": names }))
            }
            ("GET", [name]) => self
                .policies
                .get(*name)
                .map_or_else(not_found, |rules| respond(200, fixtures::policy(name, rules))),
            ("PUT" | "POST", [name]) => {
                let Some(rules) = str_field(body, "rules") else {
                    return error(400, "'rules' parameter not supplied");
                };
                self.policies.insert((*name).to_string(), rules.to_string());
                no_content()
            }
            ("DELETE", [name]) => {
                if *name == "root" {
                    return error(400, "cannot delete root policy");
                }
                self.policies.remove(*name);
                no_content()
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn audit_route(&mut self, method: &str, rest: &[&str], body: &Value) -> ResponseTemplate {
        match (method, rest) {
            ("GET", []) => {
                let table: Map<String, Value> = self
                    .audit
                    .iter()
                    .map(|(name, d)| {
                        (
                            format!("{name}/"),
                            json!({ "type": d.kind, "description": d.description, "options": d.options }),
                        )
                    })
                    .collect();
                respond(200, Value::Object(table))
            }
            ("PUT" | "POST", name) if !name.is_empty() => {
                let name = name.join("/");
                if self.audit.contains_key(&name) {
                    return error(400, "path already in use");
                }
                let Some(kind) = str_field(body, "type") else {
                    return error(400, "audit type must be specified");
                };
                let device = AuditDevice {
                    kind: kind.to_string(),
                    description: str_field(body, "description").unwrap_or_default().to_string(),
                    options: body.get("options").cloned().unwrap_or_else(|| json!({})),
                };
                self.audit.insert(name, device);
                no_content()
            }
            ("DELETE", name) if !name.is_empty() => {
                self.audit.remove(&name.join("/"));
                no_content()
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn raw_route(&mut self, method: &str, key: &str, body: &Value) -> ResponseTemplate {
        match method {
            "GET" => self
                .raw
                .get(key)
                .map_or_else(not_found, |value| respond(200, json!({ "value": value }))),
            "PUT" | "POST" => {
                let Some(value) = str_field(body, "value") else {
                    return error(400, "'value' must be a string");
                };
                self.raw.insert(key.to_string(), value.to_string());
                no_content()
            }
            "DELETE" => {
                self.raw.remove(key);
                no_content()
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn token_route(&mut self, method: &str, rest: &[&str], body: &Value, request: &Request) -> ResponseTemplate {
        match (method, rest) {
            ("POST" | "PUT", ["create"]) => {
                let mut policies = split_policies(body.get("policies"));
                if policies.is_empty() {
                    policies = caller_token(request)
                        .and_then(|t| self.tokens.get(&t).cloned())
                        .unwrap_or_default();
                }
                let id = match str_field(body, "id") {
                    Some(id) => {
                        self.tokens.insert(id.to_string(), policies);
                        id.to_string()
                    }
                    None => self.issue_token(policies),
                };
                self.login_response(&id)
            }
            ("GET", ["lookup-self"]) => {
                let id = caller_token(request).unwrap_or_default();
                self.lookup(&id)
            }
            ("GET", ["lookup", id]) => self.lookup(id),
            ("POST" | "PUT", ["revoke" | "revoke-orphan", id]) => {
                self.tokens.remove(*id);
                no_content()
            }
            ("POST" | "PUT", ["revoke-prefix", ..]) => no_content(),
            ("POST" | "PUT", ["renew", id]) => {
                if self.tokens.contains_key(*id) {
                    self.login_response(id)
                } else {
                    error(400, "invalid lease ID")
                }
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn lookup(&self, id: &str) -> ResponseTemplate {
        self.tokens.get(id).map_or_else(not_found, |policies| {
            let policies: Vec<&str> = policies.iter().map(String::as_str).collect();
            respond(200, fixtures::token_lookup(id, &policies))
        })
    }

    fn auth_route(&mut self, method: &str, mount: &str, rest: &[&str], body: &Value) -> ResponseTemplate {
        if !self.auth.contains_key(mount) {
            return error(404, &format!("no handler for route 'auth/{mount}'"));
        }
        match (method, rest) {
            ("POST" | "PUT", ["login", username]) => {
                let key = (mount.to_string(), (*username).to_string());
                let password = str_field(body, "password").unwrap_or_default();
                let Some(policies) = self
                    .users
                    .get(&key)
                    .filter(|user| user.password == password)
                    .map(|user| user.policies.clone())
                else {
                    return error(400, "invalid username or password");
                };
                let id = self.issue_token(policies);
                self.login_response(&id)
            }
            ("POST" | "PUT", ["users", username]) => {
                let user = User {
                    password: str_field(body, "password").unwrap_or_default().to_string(),
                    policies: split_policies(body.get("policies")),
                };
                self.users.insert((mount.to_string(), (*username).to_string()), user);
                no_content()
            }
            ("DELETE", ["users", username]) => {
                self.users.remove(&(mount.to_string(), (*username).to_string()));
                no_content()
            }
            _ => error(405, "unsupported operation"),
        }
    }

    fn mount_of(&self, path: &str) -> Option<String> {
        self.mounts
            .keys()
            .filter(|name| path == name.as_str() || path.starts_with(&format!("{name}/")))
            .max_by_key(|name| name.len())
            .cloned()
    }

    fn secret_route(&mut self, method: &str, path: &str, body: &Value) -> ResponseTemplate {
        let Some(mount) = self.mount_of(path) else {
            return error(404, &format!("no handler for route '{path}'"));
        };
        match method {
            "GET" => self
                .secrets
                .get(path)
                .map_or_else(not_found, |data| respond(200, fixtures::secret(data.clone()))),
            "POST" | "PUT" => {
                if path == mount {
                    return error(405, "unsupported operation");
                }
                self.secrets.insert(path.to_string(), body.clone());
                no_content()
            }
            "DELETE" => {
                self.secrets.remove(path);
                no_content()
            }
            "LIST" => {
                let prefix = format!("{path}/");
                let keys: BTreeSet<String> = self
                    .secrets
                    .keys()
                    .filter_map(|p| p.strip_prefix(&prefix))
                    .map(|rest| match rest.split_once('/') {
                        Some((head, _)) => format!("{head}/"),
                        None => rest.to_string(),
                    })
                    .collect();
                if keys.is_empty() {
                    return not_found();
                }
                respond(200, json!({ "data": { "keys": keys } }))
            }
            _ => error(405, "unsupported operation"),
        }
    }
}

struct Responder {
    state: Arc<Mutex<State>>,
}

impl Respond for Responder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.state.lock().handle(request)
    }
}

/// An in-memory Vault server, uninitialized and sealed on start.
pub struct FakeVault {
    server: MockServer,
    state: Arc<Mutex<State>>,
}

impl FakeVault {
    /// Start a fresh server.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(State::new()));
        Mock::given(any())
            .respond_with(Responder {
                state: Arc::clone(&state),
            })
            .mount(&server)
            .await;
        Self { server, state }
    }

    /// Start a server that is already initialized with one share and
    /// unsealed. Use [`FakeVault::root_token`] to authenticate.
    pub async fn start_unsealed() -> Self {
        let vault = Self::start().await;
        {
            let mut state = vault.state.lock();
            let _ = state.initialize(&json!({ "secret_shares": 1, "secret_threshold": 1 }));
            state.sealed = false;
        }
        vault
    }

    /// Base URL, to be used as the client address.
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// The root credential, once initialized.
    #[must_use]
    pub fn root_token(&self) -> Option<String> {
        self.state.lock().root_token.clone()
    }

    /// The key shares, once initialized.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().keys.clone()
    }

    /// Whether the server is sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed
    }

    /// Number of `/sys/unseal` calls received.
    #[must_use]
    pub fn unseal_calls(&self) -> usize {
        self.state.lock().unseal_calls
    }

    /// Mount names currently present.
    #[must_use]
    pub fn mount_names(&self) -> Vec<String> {
        self.state.lock().mounts.keys().cloned().collect()
    }

    /// Stored policy document.
    #[must_use]
    pub fn policy_document(&self, name: &str) -> Option<String> {
        self.state.lock().policies.get(name).cloned()
    }

    /// Stored secret body.
    #[must_use]
    pub fn secret(&self, path: &str) -> Option<Value> {
        self.state.lock().secrets.get(path.trim_matches('/')).cloned()
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

impl std::fmt::Debug for FakeVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeVault")
            .field("uri", &self.server.uri())
            .finish_non_exhaustive()
    }
}
