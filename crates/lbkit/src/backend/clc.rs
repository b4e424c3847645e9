//! CenturyLink Cloud v2 backend.
//!
//! This module provides the [`ClcBackend`] implementation, which maps each
//! [`Backend`] call onto one request against the shared load-balancer
//! endpoints (`/v2/sharedLoadBalancers/{alias}/{location}/...`).
//!
//! # Authentication
//!
//! Requests carry a bearer token. When the [`ApiConfig`] holds a username and
//! password instead of a token, [`ClcBackend::new`] exchanges them once via
//! `POST /v2/authentication/login`.

use crate::backend::Backend;
use crate::config::{ApiConfig, Credentials};
use crate::error::{Error, Result};
use crate::types::{LoadBalancer, NewLoadBalancer, NewPool, Node, Operation, Pool, Scope};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = "lbkit-rs";

/// CenturyLink Cloud v2 API backend.
///
/// # Example
///
/// ```no_run
/// use lbkit::backend::clc::ClcBackend;
/// use lbkit::backend::Backend;
/// use lbkit::{ApiConfig, Scope};
///
/// let config = ApiConfig::from_env().unwrap();
/// let backend = ClcBackend::new(&config).unwrap();
/// let lbs = backend.list_load_balancers(&Scope::new("TEST", "WA1")).unwrap();
/// println!("Found {} load balancers", lbs.len());
/// ```
pub struct ClcBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base URL, without trailing slash.
    endpoint: String,
    /// Bearer token sent with every request.
    token: String,
}

impl ClcBackend {
    /// Create a backend from configuration, logging in if needed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let agent = build_agent(config.timeout);
        let endpoint = config.endpoint.trim_end_matches('/').to_string();

        let token = match &config.credentials {
            Credentials::Token(token) => token.clone(),
            Credentials::Login { username, password } => login(&agent, &endpoint, username, password)?,
        };

        Ok(Self {
            agent,
            endpoint,
            token,
        })
    }

    /// Create a backend with an already issued bearer token.
    #[must_use]
    pub fn with_token(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            agent: build_agent(timeout),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the URL for the load balancers of a scope.
    fn load_balancers_url(&self, scope: &Scope) -> String {
        format!(
            "{}/v2/sharedLoadBalancers/{}/{}",
            self.endpoint, scope.alias, scope.location
        )
    }

    /// Build the URL for one load balancer.
    fn load_balancer_url(&self, scope: &Scope, lb_id: &str) -> String {
        format!("{}/{}", self.load_balancers_url(scope), lb_id)
    }

    /// Build the URL for the pools of a load balancer.
    fn pools_url(&self, scope: &Scope, lb_id: &str) -> String {
        format!("{}/pools", self.load_balancer_url(scope, lb_id))
    }

    /// Build the URL for one pool.
    fn pool_url(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> String {
        format!("{}/{}", self.pools_url(scope, lb_id), pool_id)
    }

    /// Build the URL for the nodes of a pool.
    fn nodes_url(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> String {
        format!("{}/nodes", self.pool_url(scope, lb_id, pool_id))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get_json<T: DeserializeOwned>(&self, operation: Operation, url: &str) -> Result<T> {
        log::debug!("{operation}: GET {url}");
        self.agent
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("Authorization", self.bearer())
            .call()
            .map_err(|e| Error::from_ureq(operation, e))?
            .body_mut()
            .read_json()
            .map_err(|e| Error::from_ureq(operation, e))
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, operation: Operation, url: &str, body: &B) -> Result<T> {
        log::debug!("{operation}: POST {url}");
        self.agent
            .post(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("Authorization", self.bearer())
            .send_json(body)
            .map_err(|e| Error::from_ureq(operation, e))?
            .body_mut()
            .read_json()
            .map_err(|e| Error::from_ureq(operation, e))
    }

    fn put_json<B: Serialize>(&self, operation: Operation, url: &str, body: &B) -> Result<()> {
        log::debug!("{operation}: PUT {url}");
        self.agent
            .put(url)
            .header("User-Agent", USER_AGENT)
            .header("Authorization", self.bearer())
            .send_json(body)
            .map_err(|e| Error::from_ureq(operation, e))?;
        Ok(())
    }

    fn delete(&self, operation: Operation, url: &str) -> Result<()> {
        log::debug!("{operation}: DELETE {url}");
        self.agent
            .delete(url)
            .header("User-Agent", USER_AGENT)
            .header("Authorization", self.bearer())
            .call()
            .map_err(|e| Error::from_ureq(operation, e))?;
        Ok(())
    }
}

impl Backend for ClcBackend {
    fn list_load_balancers(&self, scope: &Scope) -> Result<Vec<LoadBalancer>> {
        self.get_json(Operation::ListLoadBalancers, &self.load_balancers_url(scope))
    }

    fn list_pools(&self, scope: &Scope, lb_id: &str) -> Result<Vec<Pool>> {
        self.get_json(Operation::ListPools, &self.pools_url(scope, lb_id))
    }

    fn list_nodes(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> Result<Vec<Node>> {
        self.get_json(Operation::ListNodes, &self.nodes_url(scope, lb_id, pool_id))
    }

    fn create_load_balancer(&self, scope: &Scope, spec: &NewLoadBalancer) -> Result<LoadBalancer> {
        self.post_json(
            Operation::CreateLoadBalancer,
            &self.load_balancers_url(scope),
            spec,
        )
    }

    fn create_pool(&self, scope: &Scope, lb_id: &str, spec: &NewPool) -> Result<Pool> {
        self.post_json(Operation::CreatePool, &self.pools_url(scope, lb_id), spec)
    }

    fn delete_load_balancer(&self, scope: &Scope, lb_id: &str) -> Result<()> {
        self.delete(
            Operation::DeleteLoadBalancer,
            &self.load_balancer_url(scope, lb_id),
        )
    }

    fn delete_pool(&self, scope: &Scope, lb_id: &str, pool_id: &str) -> Result<()> {
        self.delete(Operation::DeletePool, &self.pool_url(scope, lb_id, pool_id))
    }

    fn set_pool_nodes(&self, scope: &Scope, lb_id: &str, pool_id: &str, nodes: &[Node]) -> Result<()> {
        self.put_json(
            Operation::SetPoolNodes,
            &self.nodes_url(scope, lb_id, pool_id),
            &nodes,
        )
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

fn login(agent: &ureq::Agent, endpoint: &str, username: &str, password: &str) -> Result<String> {
    let url = format!("{endpoint}/v2/authentication/login");
    log::debug!("login: POST {url} as {username}");

    let response: LoginResponse = agent
        .post(&url)
        .header("Accept", "application/json")
        .header("User-Agent", USER_AGENT)
        .send_json(LoginRequest { username, password })
        .map_err(|e| Error::from_ureq(Operation::Login, e))?
        .body_mut()
        .read_json()
        .map_err(|e| Error::from_ureq(Operation::Login, e))?;

    Ok(response.bearer_token)
}

// =============================================================================
// Authentication wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    bearer_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Method, Persistence, Status};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// One request as seen by [`stub_server`].
    #[derive(Debug)]
    struct Recorded {
        method: String,
        path: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    impl Recorded {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    /// Serve the canned `(status, body)` replies, one connection each, and
    /// hand back every request received. Returns the base URL.
    fn stub_server(replies: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Recorded>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (status, body) in replies {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                tx.send(read_request(&mut reader)).unwrap();

                let mut stream = stream;
                write!(
                    stream,
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
        });

        (base, rx)
    }

    fn read_request(reader: &mut impl BufRead) -> Recorded {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let mut parts = line.split_whitespace();
        let method = parts.next().unwrap().to_string();
        let path = parts.next().unwrap().to_string();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').unwrap();
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let header = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };

        let body = if let Some(len) = header("content-length") {
            let mut buf = vec![0; len.parse().unwrap()];
            reader.read_exact(&mut buf).unwrap();
            String::from_utf8(buf).unwrap()
        } else if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
            read_chunked(reader)
        } else {
            String::new()
        };

        Recorded {
            method,
            path,
            headers,
            body,
        }
    }

    fn read_chunked(reader: &mut impl BufRead) -> String {
        let mut body = Vec::new();
        loop {
            let mut size = String::new();
            reader.read_line(&mut size).unwrap();
            let size = usize::from_str_radix(size.trim(), 16).unwrap();
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).unwrap();
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
        String::from_utf8(body).unwrap()
    }

    fn stub_backend(base: &str) -> ClcBackend {
        ClcBackend::with_token(base, "tok", Duration::from_secs(5))
    }

    fn backend() -> ClcBackend {
        ClcBackend::with_token("https://api.ctl.io", "token", Duration::from_secs(5))
    }

    fn scope() -> Scope {
        Scope::new("TEST", "WA1")
    }

    #[test]
    fn test_load_balancers_url() {
        assert_eq!(
            backend().load_balancers_url(&scope()),
            "https://api.ctl.io/v2/sharedLoadBalancers/TEST/WA1"
        );
    }

    #[test]
    fn test_pool_and_node_urls() {
        let backend = backend();
        assert_eq!(
            backend.pools_url(&scope(), "lb1"),
            "https://api.ctl.io/v2/sharedLoadBalancers/TEST/WA1/lb1/pools"
        );
        assert_eq!(
            backend.pool_url(&scope(), "lb1", "p1"),
            "https://api.ctl.io/v2/sharedLoadBalancers/TEST/WA1/lb1/pools/p1"
        );
        assert_eq!(
            backend.nodes_url(&scope(), "lb1", "p1"),
            "https://api.ctl.io/v2/sharedLoadBalancers/TEST/WA1/lb1/pools/p1/nodes"
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let backend = ClcBackend::with_token("https://api.example.com/", "t", Duration::from_secs(1));
        assert_eq!(backend.endpoint(), "https://api.example.com");
        assert_eq!(
            backend.load_balancer_url(&scope(), "lb1"),
            "https://api.example.com/v2/sharedLoadBalancers/TEST/WA1/lb1"
        );
    }

    #[test]
    fn test_new_with_token_skips_login() {
        let config = ApiConfig::new(Credentials::Token("abc".to_string()))
            .endpoint("http://127.0.0.1:9");
        let backend = ClcBackend::new(&config).unwrap();
        assert_eq!(backend.bearer(), "Bearer abc");
    }

    #[test]
    fn test_login_response_decodes() {
        let json = r#"{"userName":"jdoe","accountAlias":"TEST","locationAlias":"WA1","roles":[],"bearerToken":"xyz"}"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.bearer_token, "xyz");
    }

    #[test]
    fn test_list_load_balancers_sends_bearer_get() {
        let (base, rx) = stub_server(vec![(
            200,
            r#"[{"id":"lb1","name":"web","description":"web","status":"enabled","ipAddress":"10.1.1.1"}]"#,
        )]);

        let lbs = stub_backend(&base).list_load_balancers(&scope()).unwrap();
        assert_eq!(lbs.len(), 1);
        assert_eq!(lbs[0].id, "lb1");
        assert_eq!(lbs[0].ip_address.as_deref(), Some("10.1.1.1"));

        let req = rx.recv().unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/v2/sharedLoadBalancers/TEST/WA1");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        assert_eq!(req.header("user-agent"), Some(USER_AGENT));
    }

    #[test]
    fn test_list_pools_and_nodes_paths() {
        let (base, rx) = stub_server(vec![
            (200, r#"[{"id":"p1","port":"443","method":"roundRobin","persistence":"standard"}]"#),
            (200, r#"[{"ipAddress":"10.0.0.1","privatePort":80,"status":"disabled"}]"#),
        ]);
        let backend = stub_backend(&base);

        let pools = backend.list_pools(&scope(), "lb1").unwrap();
        assert_eq!(pools[0].port, 443);
        let nodes = backend.list_nodes(&scope(), "lb1", "p1").unwrap();
        assert_eq!(nodes, vec![Node::new("10.0.0.1", 80).with_status(Status::Disabled)]);

        assert_eq!(rx.recv().unwrap().path, "/v2/sharedLoadBalancers/TEST/WA1/lb1/pools");
        assert_eq!(
            rx.recv().unwrap().path,
            "/v2/sharedLoadBalancers/TEST/WA1/lb1/pools/p1/nodes"
        );
    }

    #[test]
    fn test_create_load_balancer_posts_payload() {
        let (base, rx) = stub_server(vec![(
            200,
            r#"{"id":"lb9","name":"web","description":"front","status":"disabled"}"#,
        )]);
        let spec = NewLoadBalancer {
            name: "web".into(),
            description: "front".into(),
            status: Status::Disabled,
        };

        let lb = stub_backend(&base).create_load_balancer(&scope(), &spec).unwrap();
        assert_eq!(lb.id, "lb9");

        let req = rx.recv().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v2/sharedLoadBalancers/TEST/WA1");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        assert_eq!(
            req.json(),
            serde_json::json!({"name": "web", "description": "front", "status": "disabled"})
        );
    }

    #[test]
    fn test_create_pool_posts_payload() {
        let (base, rx) = stub_server(vec![(
            200,
            r#"{"id":"p2","port":80,"method":"leastConnection","persistence":"sticky"}"#,
        )]);
        let spec = NewPool {
            port: 80,
            method: Method::LeastConnection,
            persistence: Persistence::Sticky,
        };

        let pool = stub_backend(&base).create_pool(&scope(), "lb1", &spec).unwrap();
        assert_eq!(pool.id, "p2");

        let req = rx.recv().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v2/sharedLoadBalancers/TEST/WA1/lb1/pools");
        assert_eq!(req.json()["port"], 80);
    }

    #[test]
    fn test_set_pool_nodes_puts_full_list() {
        let (base, rx) = stub_server(vec![(200, "")]);
        let nodes = vec![
            Node::new("10.0.0.1", 80),
            Node::new("10.0.0.2", 8080).with_status(Status::Disabled),
        ];

        stub_backend(&base)
            .set_pool_nodes(&scope(), "lb1", "p1", &nodes)
            .unwrap();

        let req = rx.recv().unwrap();
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path, "/v2/sharedLoadBalancers/TEST/WA1/lb1/pools/p1/nodes");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        assert_eq!(req.json(), serde_json::to_value(&nodes).unwrap());
        assert_eq!(req.json().as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_set_pool_nodes_empty_list_is_sent() {
        let (base, rx) = stub_server(vec![(200, "")]);

        stub_backend(&base)
            .set_pool_nodes(&scope(), "lb1", "p1", &[])
            .unwrap();

        assert_eq!(rx.recv().unwrap().json(), serde_json::json!([]));
    }

    #[test]
    fn test_deletes_use_delete_verb() {
        let (base, rx) = stub_server(vec![(204, ""), (204, "")]);
        let backend = stub_backend(&base);

        backend.delete_pool(&scope(), "lb1", "p1").unwrap();
        backend.delete_load_balancer(&scope(), "lb1").unwrap();

        let pool = rx.recv().unwrap();
        assert_eq!(pool.method, "DELETE");
        assert_eq!(pool.path, "/v2/sharedLoadBalancers/TEST/WA1/lb1/pools/p1");
        let lb = rx.recv().unwrap();
        assert_eq!(lb.method, "DELETE");
        assert_eq!(lb.path, "/v2/sharedLoadBalancers/TEST/WA1/lb1");
        assert_eq!(lb.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn test_error_status_maps_to_transport() {
        let (base, _rx) = stub_server(vec![(404, r#"{"message":"not found"}"#)]);

        let err = stub_backend(&base).list_pools(&scope(), "gone").unwrap_err();
        match err {
            Error::Transport {
                operation, status, ..
            } => {
                assert_eq!(operation, Operation::ListPools);
                assert_eq!(status, Some(404));
            }
            other => panic!("Expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_server_error_on_put_names_operation() {
        let (base, _rx) = stub_server(vec![(500, "")]);

        let err = stub_backend(&base)
            .set_pool_nodes(&scope(), "lb1", "p1", &[])
            .unwrap_err();
        assert_eq!(err.operation(), Some(Operation::SetPoolNodes));
        assert!(matches!(err, Error::Transport { status: Some(500), .. }));
    }

    #[test]
    fn test_malformed_body_maps_to_invalid_response() {
        let (base, _rx) = stub_server(vec![(200, r#"{"not": "a list"}"#)]);

        let err = stub_backend(&base).list_load_balancers(&scope()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidResponse {
                operation: Operation::ListLoadBalancers,
                ..
            }
        ));
    }

    #[test]
    fn test_login_exchanges_credentials_for_token() {
        let (base, rx) = stub_server(vec![
            (200, r#"{"userName":"jdoe","accountAlias":"TEST","bearerToken":"fresh"}"#),
            (200, "[]"),
        ]);
        let config = ApiConfig::new(Credentials::Login {
            username: "jdoe".into(),
            password: "secret".into(),
        })
        .endpoint(base);

        let backend = ClcBackend::new(&config).unwrap();
        assert!(backend.list_load_balancers(&scope()).unwrap().is_empty());

        let login = rx.recv().unwrap();
        assert_eq!(login.method, "POST");
        assert_eq!(login.path, "/v2/authentication/login");
        assert_eq!(login.header("authorization"), None);
        assert_eq!(
            login.json(),
            serde_json::json!({"username": "jdoe", "password": "secret"})
        );

        let list = rx.recv().unwrap();
        assert_eq!(list.header("authorization"), Some("Bearer fresh"));
    }

    #[test]
    fn test_rejected_login_is_a_login_failure() {
        let (base, _rx) = stub_server(vec![(400, r#"{"message":"bad credentials"}"#)]);
        let config = ApiConfig::new(Credentials::Login {
            username: "jdoe".into(),
            password: "wrong".into(),
        })
        .endpoint(base);

        let Err(err) = ClcBackend::new(&config) else {
            panic!("Expected login to fail");
        };
        assert_eq!(err.operation(), Some(Operation::Login));
        assert!(matches!(err, Error::Transport { status: Some(400), .. }));
    }

    #[test]
    fn test_login_request_body() {
        let body = serde_json::to_value(LoginRequest {
            username: "jdoe",
            password: "secret",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"username": "jdoe", "password": "secret"}));
    }
}
