//! The controller boundary.
//!
//! # Responsibilities
//! - Define the operations a controller offers to remote callers
//! - Define the startup entry point and the `job` accessor the shell uses
//!
//! # Design Decisions
//! - Every remotely callable operation takes a trailing `secret` and must
//!   check it before doing anything else; the RPC gateway does not
//! - Methods are synchronous and take `&self`; implementations synchronize
//!   internally because calls arrive concurrently from the blocking pool
//! - `job`, `job_start` and `authorize` are part of the trait but are never
//!   registered with the gateway

pub mod node;

use serde_json::Value;
use thiserror::Error;

pub use node::{ControllerContext, NodeController};

/// Errors a controller operation can report to its caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    /// Caller's secret did not match.
    #[error("bad secret")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Failed(String),
}

pub type Outcome<T> = Result<T, ControllerError>;

/// The privileged object exposed over RPC.
pub trait Controller: Send + Sync + 'static {
    /// Roles this node currently runs.
    fn job(&self) -> String;

    /// Controller main loop. Blocks until the controller is killed.
    fn job_start(&self, secret: &str) -> Outcome<()>;

    /// Check a caller's secret and do nothing else.
    fn authorize(&self, secret: &str) -> Outcome<()>;

    fn is_done_initializing(&self, secret: &str) -> Outcome<bool>;
    fn is_done_loading(&self, secret: &str) -> Outcome<bool>;
    fn get_role_info(&self, secret: &str) -> Outcome<Value>;
    fn get_app_info_map(&self, secret: &str) -> Outcome<Value>;
    fn relocate_app(&self, appid: String, http_port: u16, https_port: u16, secret: &str) -> Outcome<String>;

    /// Stop this node. With `stop_deployment`, ask the whole deployment to stop.
    fn kill(&self, stop_deployment: bool, secret: &str) -> Outcome<String>;

    fn set_parameters(&self, layout: Value, options: Value, secret: &str) -> Outcome<String>;
    fn status(&self, secret: &str) -> Outcome<String>;
    fn get_stats(&self, secret: &str) -> Outcome<Value>;
    fn get_stats_json(&self, secret: &str) -> Outcome<String>;
    fn get_application_cron_info(&self, app_name: String, secret: &str) -> Outcome<Value>;

    /// Accept an app archive. Returns a reservation id to poll with
    /// `get_app_upload_status`.
    fn upload_app(&self, archived_file: String, file_suffix: String, email: String, secret: &str) -> Outcome<String>;
    fn get_app_upload_status(&self, reservation_id: String, secret: &str) -> Outcome<String>;
    fn get_database_information(&self, secret: &str) -> Outcome<Value>;
    fn get_api_status(&self, secret: &str) -> Outcome<Value>;
    fn stop_app(&self, app_name: String, secret: &str) -> Outcome<String>;
    fn update(&self, app_names: Vec<String>, secret: &str) -> Outcome<String>;
    fn set_apps_to_restart(&self, apps_to_restart: Vec<String>, secret: &str) -> Outcome<String>;
    fn get_all_public_ips(&self, secret: &str) -> Outcome<Vec<String>>;
    fn get_online_users_list(&self, secret: &str) -> Outcome<Vec<String>>;
    fn done_uploading(&self, appname: String, location: String, secret: &str) -> Outcome<String>;
    fn is_app_running(&self, appname: String, secret: &str) -> Outcome<bool>;
    fn backup_appscale(&self, backup_in_info: Value, secret: &str) -> Outcome<String>;
    fn add_role(&self, new_role: String, secret: &str) -> Outcome<String>;
    fn remove_role(&self, old_role: String, secret: &str) -> Outcome<String>;
    fn start_roles_on_nodes(&self, ips_hash: Value, secret: &str) -> Outcome<String>;
    fn gather_logs(&self, secret: &str) -> Outcome<String>;
    fn add_routing_for_appserver(&self, app_id: String, ip: String, port: u16, secret: &str) -> Outcome<String>;
    fn add_routing_for_blob_server(&self, secret: &str) -> Outcome<String>;
    fn remove_appserver_from_haproxy(&self, app_id: String, ip: String, port: u16, secret: &str) -> Outcome<String>;
    fn run_groomer(&self, secret: &str) -> Outcome<String>;

    /// Properties whose names match `property_regex`.
    fn get_property(&self, property_regex: String, secret: &str) -> Outcome<Value>;
    fn set_property(&self, property_name: String, property_value: String, secret: &str) -> Outcome<String>;
    fn deployment_id_exists(&self, secret: &str) -> Outcome<bool>;
    fn get_deployment_id(&self, secret: &str) -> Outcome<String>;
    fn set_deployment_id(&self, id: String, secret: &str) -> Outcome<String>;
    fn set_node_read_only(&self, read_only: bool, secret: &str) -> Outcome<String>;
    fn set_read_only(&self, read_only: bool, secret: &str) -> Outcome<String>;
    fn get_all_stats(&self, secret: &str) -> Outcome<Value>;
    fn does_app_exist(&self, appname: String, secret: &str) -> Outcome<bool>;
    fn reset_password(&self, username: String, password: String, secret: &str) -> Outcome<String>;
    fn does_user_exist(&self, username: String, secret: &str) -> Outcome<bool>;
    fn create_user(&self, username: String, password: String, account_type: String, secret: &str) -> Outcome<String>;
    fn set_admin_role(&self, username: String, is_cloud_admin: bool, capabilities: Value, secret: &str) -> Outcome<String>;
    fn get_app_data(&self, app_id: String, secret: &str) -> Outcome<Value>;
    fn reserve_app_id(&self, username: String, app_id: String, app_language: String, secret: &str) -> Outcome<String>;
    fn primary_db_is_up(&self, secret: &str) -> Outcome<bool>;
}
