//! In-memory node controller.
//!
//! Keeps the node's bookkeeping (layout, roles, apps, users, properties)
//! in concurrent maps so the RPC surface is usable on a single node. It
//! does not touch proxies, cron or databases.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::schema::ControllerConfig;
use crate::controller::{Controller, ControllerError, Outcome};
use crate::lifecycle::state::RunningState;
use crate::security::Secret;

const OK: &str = "OK";
const SUPPORTED_SUFFIXES: &[&str] = &["tar.gz", "zip"];
const SUPPORTED_LANGUAGES: &[&str] = &["python27", "java", "go", "php"];
const ACCOUNT_TYPES: &[&str] = &["user", "xmpp_user", "app"];
const STOP_POLL: Duration = Duration::from_millis(100);
/// Upload reservations kept for status polling. The oldest is dropped first.
const MAX_UPLOAD_RESERVATIONS: usize = 256;

/// Everything a controller needs from the shell at construction.
#[derive(Debug, Clone)]
pub struct ControllerContext {
    pub secret: Secret,
    pub state: Arc<RunningState>,
    pub config: ControllerConfig,
}

#[derive(Debug, Clone, Default, Serialize)]
struct AppRecord {
    owner: Option<String>,
    language: Option<String>,
    location: Option<String>,
    http_port: Option<u16>,
    https_port: Option<u16>,
    routes: Vec<String>,
}

#[derive(Debug, Clone)]
struct UploadRecord {
    status: String,
    seq: u64,
}

#[derive(Debug, Clone)]
struct UserRecord {
    password_hash: String,
    account_type: String,
    is_cloud_admin: bool,
    capabilities: Value,
}

pub struct NodeController {
    secret: Secret,
    state: Arc<RunningState>,
    duty_cycle: Duration,
    started_at: Instant,

    roles: ArcSwap<Vec<String>>,
    layout: ArcSwap<Value>,
    options: ArcSwap<Value>,
    deployment_id: ArcSwap<Option<String>>,
    restart_queue: ArcSwap<Vec<String>>,

    apps: DashMap<String, AppRecord>,
    uploads: DashMap<String, UploadRecord>,
    upload_seq: AtomicU64,
    users: DashMap<String, UserRecord>,
    properties: DashMap<String, String>,

    node_read_only: AtomicBool,
    deployment_read_only: AtomicBool,
    blob_server_routed: AtomicBool,
    stopping: AtomicBool,
    stop_deployment: AtomicBool,
}

impl NodeController {
    pub fn new(ctx: ControllerContext) -> Self {
        Self {
            secret: ctx.secret,
            state: ctx.state,
            duty_cycle: ctx.config.duty_cycle(),
            started_at: Instant::now(),
            roles: ArcSwap::from_pointee(Vec::new()),
            layout: ArcSwap::from_pointee(Value::Array(Vec::new())),
            options: ArcSwap::from_pointee(Value::Object(Default::default())),
            deployment_id: ArcSwap::from_pointee(None),
            restart_queue: ArcSwap::from_pointee(Vec::new()),
            apps: DashMap::new(),
            uploads: DashMap::new(),
            upload_seq: AtomicU64::new(0),
            users: DashMap::new(),
            properties: DashMap::new(),
            node_read_only: AtomicBool::new(false),
            deployment_read_only: AtomicBool::new(false),
            blob_server_routed: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            stop_deployment: AtomicBool::new(false),
        }
    }

    /// True once `kill` has been accepted.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Whether the last accepted `kill` asked for the whole deployment.
    pub fn stop_deployment_requested(&self) -> bool {
        self.stop_deployment.load(Ordering::SeqCst)
    }

    fn should_stop(&self) -> bool {
        self.is_stopping() || self.state.signal_received()
    }

    /// Sleep for one duty cycle, returning early if a stop is requested.
    fn idle(&self) {
        let deadline = Instant::now() + self.duty_cycle;
        while !self.should_stop() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(STOP_POLL.min(deadline - now));
        }
    }

    fn reserve_upload(&self, reservation_id: String) {
        while self.uploads.len() >= MAX_UPLOAD_RESERVATIONS {
            let oldest = self
                .uploads
                .iter()
                .min_by_key(|e| e.value().seq)
                .map(|e| e.key().clone());
            match oldest {
                Some(id) => {
                    self.uploads.remove(&id);
                }
                None => break,
            }
        }
        self.uploads.insert(
            reservation_id,
            UploadRecord {
                status: "starting".to_string(),
                seq: self.upload_seq.fetch_add(1, Ordering::SeqCst),
            },
        );
    }

    fn require_app(&self, name: &str) -> Outcome<()> {
        if self.apps.contains_key(name) {
            Ok(())
        } else {
            Err(ControllerError::NotFound(format!("app {}", name)))
        }
    }

    fn stats(&self) -> Value {
        json!({
            "roles": *self.roles.load_full(),
            "apps": self.apps.len(),
            "uploads": self.uploads.len(),
            "uptime_secs": self.started_at.elapsed().as_secs(),
            "done_loading": self.state.is_done_loading(),
            "read_only": self.node_read_only.load(Ordering::SeqCst),
        })
    }

    fn user_summaries(&self) -> BTreeMap<String, Value> {
        self.users
            .iter()
            .map(|e| {
                let user = e.value();
                let summary = json!({
                    "account_type": user.account_type,
                    "is_cloud_admin": user.is_cloud_admin,
                    "capabilities": user.capabilities,
                });
                (e.key().clone(), summary)
            })
            .collect()
    }

    fn nodes(&self) -> Vec<Value> {
        match &*self.layout.load_full() {
            Value::Array(nodes) => nodes.clone(),
            _ => Vec::new(),
        }
    }
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn non_empty(field: &str, value: &str) -> Outcome<()> {
    if value.trim().is_empty() {
        Err(ControllerError::InvalidArgument(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> Outcome<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ControllerError::InvalidArgument(format!(
            "{} must be one of {:?}, got {:?}",
            field, allowed, value
        )))
    }
}

impl Controller for NodeController {
    fn job(&self) -> String {
        let roles = self.roles.load();
        if roles.is_empty() {
            "none".to_string()
        } else {
            roles.join(":")
        }
    }

    fn job_start(&self, secret: &str) -> Outcome<()> {
        self.secret.verify(secret)?;
        self.state.mark_done_initializing();
        tracing::info!(job = %self.job(), "Controller main loop starting");

        let mut cycles: u64 = 0;
        while !self.should_stop() {
            if cycles == 0 {
                self.state.mark_done_loading();
            }
            cycles += 1;
            tracing::debug!(cycles, apps = self.apps.len(), "Controller heartbeat");
            self.idle();
        }

        tracing::info!(
            cycles,
            stop_deployment = self.stop_deployment_requested(),
            "Controller main loop finished"
        );
        Ok(())
    }

    fn authorize(&self, secret: &str) -> Outcome<()> {
        self.secret.verify(secret)
    }

    fn is_done_initializing(&self, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self.state.is_done_initializing())
    }

    fn is_done_loading(&self, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self.state.is_done_loading())
    }

    fn get_role_info(&self, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        Ok(Value::Array(self.nodes()))
    }

    fn get_app_info_map(&self, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        let map: BTreeMap<String, AppRecord> = self
            .apps
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(json!(map))
    }

    fn relocate_app(&self, appid: String, http_port: u16, https_port: u16, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        if http_port == 0 || https_port == 0 || http_port == https_port {
            return Err(ControllerError::InvalidArgument(
                "http_port and https_port must be distinct and non-zero".into(),
            ));
        }
        let mut app = self
            .apps
            .get_mut(&appid)
            .ok_or_else(|| ControllerError::NotFound(format!("app {}", appid)))?;
        app.http_port = Some(http_port);
        app.https_port = Some(https_port);
        tracing::info!(app = %appid, http_port, https_port, "App relocated");
        Ok(OK.to_string())
    }

    fn kill(&self, stop_deployment: bool, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.stop_deployment.store(stop_deployment, Ordering::SeqCst);
        self.stopping.store(true, Ordering::SeqCst);
        tracing::info!(
            stop_deployment,
            expected = self.state.signal_received(),
            "Controller kill requested"
        );
        Ok(OK.to_string())
    }

    fn set_parameters(&self, layout: Value, options: Value, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        if !layout.is_array() {
            return Err(ControllerError::InvalidArgument("layout must be a list of nodes".into()));
        }
        if !options.is_object() {
            return Err(ControllerError::InvalidArgument("options must be a map".into()));
        }
        if let Some(id) = options.get("deployment_id").and_then(Value::as_str) {
            self.deployment_id.store(Arc::new(Some(id.to_string())));
        }
        self.layout.store(Arc::new(layout));
        self.options.store(Arc::new(options));
        Ok(OK.to_string())
    }

    fn status(&self, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        Ok(format!(
            "job={} apps={} done_loading={} uptime={}s",
            self.job(),
            self.apps.len(),
            self.state.is_done_loading(),
            self.started_at.elapsed().as_secs()
        ))
    }

    fn get_stats(&self, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        Ok(self.stats())
    }

    fn get_stats_json(&self, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        serde_json::to_string(&self.stats()).map_err(|e| ControllerError::Failed(e.to_string()))
    }

    fn get_application_cron_info(&self, app_name: String, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        self.require_app(&app_name)?;
        Ok(json!({ "app": app_name, "entries": [] }))
    }

    fn upload_app(&self, archived_file: String, file_suffix: String, email: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("archived_file", &archived_file)?;
        non_empty("email", &email)?;
        one_of("file_suffix", &file_suffix, SUPPORTED_SUFFIXES)?;

        let reservation_id = uuid::Uuid::new_v4().to_string();
        self.reserve_upload(reservation_id.clone());
        tracing::info!(%reservation_id, %email, "App upload reserved");
        Ok(reservation_id)
    }

    fn get_app_upload_status(&self, reservation_id: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.uploads
            .get(&reservation_id)
            .map(|r| r.value().status.clone())
            .ok_or_else(|| ControllerError::NotFound(format!("reservation {}", reservation_id)))
    }

    fn get_database_information(&self, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        let options = self.options.load();
        Ok(json!({
            "table": options.get("table").cloned().unwrap_or(Value::Null),
            "replication": options.get("replication").cloned().unwrap_or(Value::Null),
        }))
    }

    fn get_api_status(&self, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        let status = if self.state.is_done_loading() { "running" } else { "starting" };
        Ok(json!({ "controller": status }))
    }

    fn stop_app(&self, app_name: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.apps
            .remove(&app_name)
            .ok_or_else(|| ControllerError::NotFound(format!("app {}", app_name)))?;
        tracing::info!(app = %app_name, "App stopped");
        Ok(OK.to_string())
    }

    fn update(&self, app_names: Vec<String>, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        for name in &app_names {
            self.require_app(name)?;
        }
        self.restart_queue.store(Arc::new(app_names));
        Ok(OK.to_string())
    }

    fn set_apps_to_restart(&self, apps_to_restart: Vec<String>, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.restart_queue.store(Arc::new(apps_to_restart));
        Ok(OK.to_string())
    }

    fn get_all_public_ips(&self, secret: &str) -> Outcome<Vec<String>> {
        self.secret.verify(secret)?;
        Ok(self
            .nodes()
            .iter()
            .filter_map(|node| node.get("public_ip").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn get_online_users_list(&self, secret: &str) -> Outcome<Vec<String>> {
        self.secret.verify(secret)?;
        let mut users: Vec<String> = self.users.iter().map(|e| e.key().clone()).collect();
        users.sort();
        Ok(users)
    }

    fn done_uploading(&self, appname: String, location: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("appname", &appname)?;
        self.apps.entry(appname).or_default().location = Some(location);
        Ok(OK.to_string())
    }

    fn is_app_running(&self, appname: String, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self
            .apps
            .get(&appname)
            .map(|app| !app.routes.is_empty())
            .unwrap_or(false))
    }

    fn backup_appscale(&self, backup_in_info: Value, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        if !backup_in_info.is_object() {
            return Err(ControllerError::InvalidArgument("backup_in_info must be a map".into()));
        }
        let backup_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(%backup_id, "Backup requested");
        Ok(backup_id)
    }

    fn add_role(&self, new_role: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("new_role", &new_role)?;
        self.roles.rcu(|roles| {
            let mut roles = (**roles).clone();
            if !roles.contains(&new_role) {
                roles.push(new_role.clone());
            }
            roles
        });
        Ok(OK.to_string())
    }

    fn remove_role(&self, old_role: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        if !self.roles.load().contains(&old_role) {
            return Err(ControllerError::NotFound(format!("role {}", old_role)));
        }
        self.roles.rcu(|roles| {
            roles
                .iter()
                .filter(|r| **r != old_role)
                .cloned()
                .collect::<Vec<_>>()
        });
        Ok(OK.to_string())
    }

    fn start_roles_on_nodes(&self, ips_hash: Value, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        let map = ips_hash
            .as_object()
            .ok_or_else(|| ControllerError::InvalidArgument("ips_hash must map roles to ips".into()))?;
        for (role, ips) in map {
            if !ips.is_array() {
                return Err(ControllerError::InvalidArgument(format!(
                    "ips for role {} must be a list",
                    role
                )));
            }
        }
        tracing::info!(roles = map.len(), "Role start requested");
        Ok(OK.to_string())
    }

    fn gather_logs(&self, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        Ok(uuid::Uuid::new_v4().to_string())
    }

    fn add_routing_for_appserver(&self, app_id: String, ip: String, port: u16, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("ip", &ip)?;
        let mut app = self
            .apps
            .get_mut(&app_id)
            .ok_or_else(|| ControllerError::NotFound(format!("app {}", app_id)))?;
        let route = format!("{}:{}", ip, port);
        if !app.routes.contains(&route) {
            app.routes.push(route);
        }
        Ok(OK.to_string())
    }

    fn add_routing_for_blob_server(&self, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.blob_server_routed.store(true, Ordering::SeqCst);
        Ok(OK.to_string())
    }

    fn remove_appserver_from_haproxy(&self, app_id: String, ip: String, port: u16, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        let mut app = self
            .apps
            .get_mut(&app_id)
            .ok_or_else(|| ControllerError::NotFound(format!("app {}", app_id)))?;
        let route = format!("{}:{}", ip, port);
        let before = app.routes.len();
        app.routes.retain(|r| *r != route);
        if app.routes.len() == before {
            return Err(ControllerError::NotFound(format!("route {} for app {}", route, app_id)));
        }
        Ok(OK.to_string())
    }

    fn run_groomer(&self, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        tracing::info!("Groomer run requested");
        Ok(OK.to_string())
    }

    fn get_property(&self, property_regex: String, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        let pattern = regex_lite::Regex::new(&property_regex)
            .map_err(|e| ControllerError::InvalidArgument(format!("property_regex: {}", e)))?;
        let matched: BTreeMap<String, String> = self
            .properties
            .iter()
            .filter(|e| pattern.is_match(e.key()))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(json!(matched))
    }

    fn set_property(&self, property_name: String, property_value: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("property_name", &property_name)?;
        self.properties.insert(property_name, property_value);
        Ok(OK.to_string())
    }

    fn deployment_id_exists(&self, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self.deployment_id.load().is_some())
    }

    fn get_deployment_id(&self, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        let id = self.deployment_id.load_full();
        (*id)
            .clone()
            .ok_or_else(|| ControllerError::NotFound("deployment id".into()))
    }

    fn set_deployment_id(&self, id: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("id", &id)?;
        self.deployment_id.store(Arc::new(Some(id)));
        Ok(OK.to_string())
    }

    fn set_node_read_only(&self, read_only: bool, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.node_read_only.store(read_only, Ordering::SeqCst);
        Ok(OK.to_string())
    }

    fn set_read_only(&self, read_only: bool, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        self.deployment_read_only.store(read_only, Ordering::SeqCst);
        self.node_read_only.store(read_only, Ordering::SeqCst);
        Ok(OK.to_string())
    }

    fn get_all_stats(&self, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        Ok(json!({
            "nodes": self.nodes().len(),
            "deployment_read_only": self.deployment_read_only.load(Ordering::SeqCst),
            "blob_server_routed": self.blob_server_routed.load(Ordering::SeqCst),
            "restart_queue": *self.restart_queue.load_full(),
            "users": self.user_summaries(),
            "this_node": self.stats(),
        }))
    }

    fn does_app_exist(&self, appname: String, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self.apps.contains_key(&appname))
    }

    fn reset_password(&self, username: String, password: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("password", &password)?;
        let mut user = self
            .users
            .get_mut(&username)
            .ok_or_else(|| ControllerError::NotFound(format!("user {}", username)))?;
        user.password_hash = hash_password(&password);
        Ok(OK.to_string())
    }

    fn does_user_exist(&self, username: String, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self.users.contains_key(&username))
    }

    fn create_user(&self, username: String, password: String, account_type: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("username", &username)?;
        non_empty("password", &password)?;
        one_of("account_type", &account_type, ACCOUNT_TYPES)?;

        match self.users.entry(username) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(ControllerError::InvalidArgument(
                format!("user {} already exists", e.key()),
            )),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(UserRecord {
                    password_hash: hash_password(&password),
                    account_type,
                    is_cloud_admin: false,
                    capabilities: Value::Array(Vec::new()),
                });
                Ok(OK.to_string())
            }
        }
    }

    fn set_admin_role(&self, username: String, is_cloud_admin: bool, capabilities: Value, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        let mut user = self
            .users
            .get_mut(&username)
            .ok_or_else(|| ControllerError::NotFound(format!("user {}", username)))?;
        user.is_cloud_admin = is_cloud_admin;
        user.capabilities = capabilities;
        Ok(OK.to_string())
    }

    fn get_app_data(&self, app_id: String, secret: &str) -> Outcome<Value> {
        self.secret.verify(secret)?;
        self.apps
            .get(&app_id)
            .map(|app| json!(app.value()))
            .ok_or_else(|| ControllerError::NotFound(format!("app {}", app_id)))
    }

    fn reserve_app_id(&self, username: String, app_id: String, app_language: String, secret: &str) -> Outcome<String> {
        self.secret.verify(secret)?;
        non_empty("app_id", &app_id)?;
        one_of("app_language", &app_language, SUPPORTED_LANGUAGES)?;
        if !self.users.contains_key(&username) {
            return Err(ControllerError::NotFound(format!("user {}", username)));
        }

        match self.apps.entry(app_id) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(ControllerError::InvalidArgument(
                format!("app id {} is already reserved", e.key()),
            )),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(AppRecord {
                    owner: Some(username),
                    language: Some(app_language),
                    ..AppRecord::default()
                });
                Ok(OK.to_string())
            }
        }
    }

    fn primary_db_is_up(&self, secret: &str) -> Outcome<bool> {
        self.secret.verify(secret)?;
        Ok(self.state.is_done_loading())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "node-secret";

    fn controller() -> NodeController {
        NodeController::new(ControllerContext {
            secret: Secret::new(SECRET),
            state: Arc::new(RunningState::new()),
            config: ControllerConfig { duty_cycle_secs: 1 },
        })
    }

    #[test]
    fn bad_secret_has_no_side_effects() {
        let c = controller();
        assert_eq!(
            c.set_property("k".into(), "v".into(), "wrong"),
            Err(ControllerError::Unauthorized)
        );
        assert_eq!(c.kill(true, "wrong"), Err(ControllerError::Unauthorized));
        assert!(!c.is_stopping());
        assert_eq!(c.get_property(".*".into(), SECRET).unwrap(), json!({}));
    }

    #[test]
    fn properties_filter_by_regex() {
        let c = controller();
        c.set_property("login_ip".into(), "10.0.0.1".into(), SECRET).unwrap();
        c.set_property("logins".into(), "3".into(), SECRET).unwrap();
        c.set_property("verbose".into(), "true".into(), SECRET).unwrap();

        let got = c.get_property("^login".into(), SECRET).unwrap();
        assert_eq!(got, json!({ "login_ip": "10.0.0.1", "logins": "3" }));

        assert!(matches!(
            c.get_property("(".into(), SECRET),
            Err(ControllerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn roles_drive_job() {
        let c = controller();
        assert_eq!(c.job(), "none");
        c.add_role("shadow".into(), SECRET).unwrap();
        c.add_role("load_balancer".into(), SECRET).unwrap();
        c.add_role("shadow".into(), SECRET).unwrap();
        assert_eq!(c.job(), "shadow:load_balancer");

        c.remove_role("shadow".into(), SECRET).unwrap();
        assert_eq!(c.job(), "load_balancer");
        assert!(matches!(
            c.remove_role("shadow".into(), SECRET),
            Err(ControllerError::NotFound(_))
        ));
    }

    #[test]
    fn app_lifecycle() {
        let c = controller();
        c.create_user("a@example.com".into(), "pw".into(), "user".into(), SECRET).unwrap();
        c.reserve_app_id("a@example.com".into(), "guestbook".into(), "python27".into(), SECRET)
            .unwrap();
        assert!(c.does_app_exist("guestbook".into(), SECRET).unwrap());
        assert!(!c.is_app_running("guestbook".into(), SECRET).unwrap());

        c.add_routing_for_appserver("guestbook".into(), "10.0.0.2".into(), 20000, SECRET)
            .unwrap();
        assert!(c.is_app_running("guestbook".into(), SECRET).unwrap());

        c.relocate_app("guestbook".into(), 8080, 4380, SECRET).unwrap();
        let data = c.get_app_data("guestbook".into(), SECRET).unwrap();
        assert_eq!(data["http_port"], 8080);
        assert_eq!(data["owner"], "a@example.com");

        c.remove_appserver_from_haproxy("guestbook".into(), "10.0.0.2".into(), 20000, SECRET)
            .unwrap();
        assert!(!c.is_app_running("guestbook".into(), SECRET).unwrap());

        c.stop_app("guestbook".into(), SECRET).unwrap();
        assert!(!c.does_app_exist("guestbook".into(), SECRET).unwrap());
    }

    #[test]
    fn users_are_unique_and_passwords_hidden() {
        let c = controller();
        c.create_user("u".into(), "pw".into(), "user".into(), SECRET).unwrap();
        assert!(matches!(
            c.create_user("u".into(), "pw".into(), "user".into(), SECRET),
            Err(ControllerError::InvalidArgument(_))
        ));
        assert!(matches!(
            c.create_user("v".into(), "pw".into(), "root".into(), SECRET),
            Err(ControllerError::InvalidArgument(_))
        ));
        c.reset_password("u".into(), "new".into(), SECRET).unwrap();
        assert_eq!(c.users.get("u").unwrap().password_hash, hash_password("new"));
        assert_eq!(c.get_online_users_list(SECRET).unwrap(), vec!["u".to_string()]);
    }

    #[test]
    fn upload_reservations_are_capped_oldest_first() {
        let c = controller();
        let upload = || {
            c.upload_app("/tmp/app.zip".into(), "zip".into(), "a@example.com".into(), SECRET)
                .unwrap()
        };
        let first = upload();
        let second = upload();
        for _ in 2..MAX_UPLOAD_RESERVATIONS {
            upload();
        }
        assert_eq!(c.uploads.len(), MAX_UPLOAD_RESERVATIONS);

        let newest = upload();
        assert_eq!(c.uploads.len(), MAX_UPLOAD_RESERVATIONS);
        assert!(matches!(
            c.get_app_upload_status(first, SECRET),
            Err(ControllerError::NotFound(_))
        ));
        assert_eq!(c.get_app_upload_status(second, SECRET).unwrap(), "starting");
        assert_eq!(c.get_app_upload_status(newest, SECRET).unwrap(), "starting");
    }

    #[test]
    fn uploads_get_reservations() {
        let c = controller();
        let id = c
            .upload_app("/tmp/app.tar.gz".into(), "tar.gz".into(), "a@example.com".into(), SECRET)
            .unwrap();
        assert_eq!(c.get_app_upload_status(id, SECRET).unwrap(), "starting");
        assert!(matches!(
            c.upload_app("/tmp/app.rar".into(), "rar".into(), "a@example.com".into(), SECRET),
            Err(ControllerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parameters_set_layout_and_deployment_id() {
        let c = controller();
        assert!(!c.deployment_id_exists(SECRET).unwrap());
        c.set_parameters(
            json!([{ "public_ip": "1.2.3.4", "jobs": ["shadow"] }, { "public_ip": "1.2.3.5" }]),
            json!({ "deployment_id": "dep-1", "table": "cassandra" }),
            SECRET,
        )
        .unwrap();

        assert_eq!(c.get_deployment_id(SECRET).unwrap(), "dep-1");
        assert_eq!(c.get_all_public_ips(SECRET).unwrap(), vec!["1.2.3.4", "1.2.3.5"]);
        assert_eq!(c.get_database_information(SECRET).unwrap()["table"], "cassandra");
        assert!(matches!(
            c.set_parameters(json!({}), json!({}), SECRET),
            Err(ControllerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn job_start_runs_until_killed() {
        let c = Arc::new(controller());
        let runner = {
            let c = c.clone();
            std::thread::spawn(move || c.job_start(SECRET))
        };

        while !c.state.is_done_loading() {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(c.is_done_initializing(SECRET).unwrap());

        c.kill(false, SECRET).unwrap();
        assert_eq!(runner.join().unwrap(), Ok(()));
        assert!(!c.stop_deployment_requested());
    }

    #[test]
    fn job_start_rejects_bad_secret() {
        let c = controller();
        assert_eq!(c.job_start("nope"), Err(ControllerError::Unauthorized));
        assert!(!c.state.is_done_initializing());
    }
}
