//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use action_gateway::config::GatewayConfig;
use action_gateway::dispatch::{
    file, DiskFileSource, FileSource, ForwardSpec, ReplySpec, Transport,
};
use action_gateway::http::GatewayServer;
use action_gateway::lifecycle::Shutdown;
use action_gateway::routing::{Action, Handler, HandlerError, Registry, Resource};
use action_gateway::security::{
    AuthError, AuthProvider, Identity, InMemoryAuthProvider, PolicyStore,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub policy: Arc<PolicyStore>,
    pub config_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/websocket", self.addr)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bind first so handlers can know the server address.
pub async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Serve `registry` on `listener` until the returned gateway is dropped.
pub async fn start(
    listener: TcpListener,
    config: GatewayConfig,
    registry: Registry,
    provider: Arc<dyn AuthProvider>,
) -> TestGateway {
    start_with_files(listener, config, registry, provider, Arc::new(DiskFileSource)).await
}

/// Like [`start`], with statics read through `files`.
pub async fn start_with_files(
    listener: TcpListener,
    mut config: GatewayConfig,
    registry: Registry,
    provider: Arc<dyn AuthProvider>,
    files: Arc<dyn FileSource>,
) -> TestGateway {
    let addr = listener.local_addr().unwrap();
    config.observability.metrics_enabled = false;

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server = GatewayServer::with_file_source(config, registry, provider, files);
    let policy = server.policy();
    let server_shutdown = shutdown.signal();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        addr,
        shutdown,
        policy,
        config_tx,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// The `test` resource used across suites.
pub fn test_resource(addr: SocketAddr) -> Resource {
    let forward_target = format!("http://userman:hi@{}/api/test/call/10/20", addr);
    let proxy_target = forward_target.clone();

    Resource::new("test")
        .action(
            Action::new("call", Handler::new(|env| async move { Ok(env.reply("ta-da!")) }))
                .url("/test/call/:one/:two"),
        )
        .action(
            Action::new(
                "forward",
                Handler::new(move |env| {
                    let target = forward_target.clone();
                    async move { Ok(env.forward_to(ForwardSpec::new(target)).await?) }
                }),
            )
            .url("/test/forward/:one/:two"),
        )
        .action(
            Action::new(
                "echo",
                Handler::new(|env| async move {
                    Ok(env.reply("echo-echo-echo-echo-echo-o-o-o-o-o-o-oooooo"))
                }),
            )
            .pattern(regex::Regex::new(r".*/echo").unwrap()),
        )
        .action(
            Action::new("args", Handler::new(|env| async move { Ok(args_reply(env)) }))
                .method("post")
                .url("/test/args/:one/:two/:three/:four")
                .topic("args"),
        )
        .action(Action::new(
            "error",
            Handler::new(|_env| async move { Err(HandlerError::from("I am bad at things!")) }),
        ))
        .action(Action::new(
            "file",
            Handler::new(|env| async move {
                Ok(env.reply_with_file("text/plain", "hello.txt", file::from_bytes("hello, world!")))
            }),
        ))
        .action(Action::new(
            "proxy",
            Handler::new(move |env| {
                let target = proxy_target.clone();
                async move {
                    if env.transport() == Transport::WebSocket {
                        Ok(env.reply("Proxy not supported over websockets"))
                    } else {
                        Ok(env.forward_to(ForwardSpec::new(target)).await?)
                    }
                }
            }),
        ))
        .action(Action::new(
            "thing",
            Handler::new(|env| async move { Ok(env.redirect("/api/test/call/1/2")) }),
        ))
        .action(
            Action::new(
                "extension",
                Handler::new(|env| async move {
                    let seen = env.extension("preparsed").cloned().unwrap_or(Value::Null);
                    Ok(env.reply(ReplySpec::new(json!({ "preparsed": seen }))))
                }),
            )
            .url("/test/extension/:one"),
        )
}

fn args_reply(env: action_gateway::Environment) -> action_gateway::Outcome {
    let data = env.data().clone();
    let field = |name: &str| data.get(name).cloned().unwrap_or(Value::Null);
    let param = |name: &str| env.param(name).map(Value::from).unwrap_or(Value::Null);
    let values = json!([
        field("one"),
        field("two"),
        field("three"),
        field("four"),
        param("one"),
        param("two"),
        param("three"),
        param("four"),
    ]);
    let spec = ReplySpec::new(values)
        .header("test-header", "look a header value!")
        .cookie(
            "an-cookie",
            action_gateway::dispatch::CookieSpec::new("chocolate chip"),
        );
    env.reply(spec)
}

/// A handler that always panics.
pub fn failing_handler() -> Handler {
    Handler::new(|_env| async move {
        if true {
            panic!("I am bad at things!");
        }
        Ok(action_gateway::Outcome::Reply("unreachable".into()))
    })
}

/// In-memory users, except that the `usererror` user's roles cannot be read,
/// an `explode` role panics the permission check and the `unreachable` token
/// fails to resolve.
pub struct MisbehavingProvider {
    pub inner: InMemoryAuthProvider,
}

#[async_trait]
impl AuthProvider for MisbehavingProvider {
    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        if token == "unreachable" {
            return Err(AuthError::Unavailable("token store offline".into()));
        }
        self.inner.resolve_token(token).await
    }

    async fn verify_password(
        &self,
        name: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError> {
        self.inner.verify_password(name, password).await
    }

    async fn lookup_user(&self, name: &str) -> Result<Option<Identity>, AuthError> {
        self.inner.lookup_user(name).await
    }

    async fn roles_for(&self, identity: &Identity) -> Result<BTreeSet<String>, AuthError> {
        if identity.name == "usererror" {
            return Err(AuthError::CorruptRoles(identity.name.clone()));
        }
        self.inner.roles_for(identity).await
    }

    async fn check_permission(
        &self,
        roles: &BTreeSet<String>,
        required: &BTreeSet<String>,
    ) -> Result<bool, AuthError> {
        if roles.contains("explode") {
            panic!("permission store exploded");
        }
        self.inner.check_permission(roles, required).await
    }
}
