//! The allow-list of remotely callable controller operations.
//!
//! The table is declared once below and built at startup. Anything not
//! listed here has no handler, including controller methods such as
//! `job_start`.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::controller::{Controller, ControllerError};
use crate::rpc::error::CallError;

/// Name of the trailing parameter every registration ends with.
pub const SECRET_PARAM: &str = "secret";

pub type Handler<C> = fn(&C, Vec<Value>) -> Result<Value, CallError>;

/// One remotely callable operation.
pub struct MethodRegistration<C> {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub handler: Handler<C>,
}

impl<C> MethodRegistration<C> {
    /// Arrange `params` into positional order.
    ///
    /// Accepts a positional array of exactly the registered arity, an
    /// object keyed by the registered parameter names, or nothing for a
    /// method without parameters.
    pub fn positional(&self, params: Option<Value>) -> Result<Vec<Value>, CallError> {
        let args = match params {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(args)) => args,
            Some(Value::Object(mut named)) => {
                let mut args = Vec::with_capacity(self.params.len());
                for name in self.params {
                    let value = named.remove(*name).ok_or_else(|| {
                        CallError::InvalidParams(format!("{}: missing parameter {}", self.name, name))
                    })?;
                    args.push(value);
                }
                if let Some(extra) = named.keys().next() {
                    return Err(CallError::InvalidParams(format!(
                        "{}: unknown parameter {}",
                        self.name, extra
                    )));
                }
                args
            }
            Some(_) => {
                return Err(CallError::InvalidParams(format!(
                    "{}: params must be a list or a map",
                    self.name
                )))
            }
        };

        if args.len() != self.params.len() {
            return Err(CallError::InvalidParams(format!(
                "{}: expected {} parameters ({}), got {}",
                self.name,
                self.params.len(),
                self.params.join(", "),
                args.len()
            )));
        }
        Ok(args)
    }
}

/// Read-only lookup from method name to registration.
pub struct MethodTable<C> {
    methods: HashMap<&'static str, MethodRegistration<C>>,
}

impl<C: Controller> MethodTable<C> {
    /// Build the table from the declared registrations.
    pub fn new() -> Self {
        Self::from_registrations(registrations())
    }
}

impl<C> MethodTable<C> {
    pub fn from_registrations(registrations: Vec<MethodRegistration<C>>) -> Self {
        let mut methods = HashMap::with_capacity(registrations.len());
        for reg in registrations {
            debug_assert_eq!(reg.params.last(), Some(&SECRET_PARAM), "{} lacks a secret", reg.name);
            let name = reg.name;
            let previous = methods.insert(name, reg);
            debug_assert!(previous.is_none(), "{} registered twice", name);
        }
        Self { methods }
    }

    pub fn get(&self, name: &str) -> Option<&MethodRegistration<C>> {
        self.methods.get(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<C: Controller> Default for MethodTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Positional argument cursor used by the generated handlers.
struct Args {
    method: &'static str,
    values: std::vec::IntoIter<Value>,
}

impl Args {
    /// Take the trailing secret off `values`. A secret that is not a string
    /// can never match.
    fn split(method: &'static str, mut values: Vec<Value>) -> Result<(Self, String), CallError> {
        let secret = match values.pop() {
            Some(Value::String(secret)) => secret,
            _ => return Err(ControllerError::Unauthorized.into()),
        };
        let args = Self {
            method,
            values: values.into_iter(),
        };
        Ok((args, secret))
    }

    fn next<T: DeserializeOwned>(&mut self, param: &str) -> Result<T, CallError> {
        let value = self.values.next().ok_or_else(|| {
            CallError::InvalidParams(format!("{}: missing parameter {}", self.method, param))
        })?;
        serde_json::from_value(value)
            .map_err(|e| CallError::InvalidParams(format!("{}: {}: {}", self.method, param, e)))
    }
}

/// The secret a caller sent, if one can be found in unvalidated params.
pub fn claimed_secret(params: Option<&Value>) -> Option<&str> {
    match params? {
        Value::Array(args) => args.last()?.as_str(),
        Value::Object(named) => named.get(SECRET_PARAM)?.as_str(),
        _ => None,
    }
}

/// Report `err` only to an authorized caller; everyone else gets the
/// authorization fault.
pub fn reject<C: Controller>(controller: &C, secret: &str, err: CallError) -> CallError {
    match controller.authorize(secret) {
        Ok(()) => err,
        Err(denied) => denied.into(),
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, CallError> {
    serde_json::to_value(value).map_err(|e| CallError::Internal(e.to_string()))
}

/// Declares the allow-list. Each entry names a `Controller` method and its
/// business parameters; the trailing `secret` is appended to every entry.
macro_rules! method_table {
    ($( $name:ident ( $( $param:ident ),* ) ; )*) => {
        /// Every remotely callable operation, in declaration order.
        pub fn registrations<C: Controller>() -> Vec<MethodRegistration<C>> {
            vec![
                $(
                    MethodRegistration {
                        name: stringify!($name),
                        params: &[ $( stringify!($param), )* SECRET_PARAM ],
                        handler: |controller: &C, values: Vec<Value>| -> Result<Value, CallError> {
                            #[allow(unused_mut, unused_variables)]
                            let (mut args, secret) = Args::split(stringify!($name), values)?;
                            $(
                                let $param = match args.next(stringify!($param)) {
                                    Ok(value) => value,
                                    Err(e) => return Err(reject(controller, &secret, e)),
                                };
                            )*
                            encode(controller.$name( $( $param, )* &secret )?)
                        },
                    },
                )*
            ]
        }
    };
}

method_table! {
    is_done_initializing();
    is_done_loading();
    get_role_info();
    get_app_info_map();
    relocate_app(appid, http_port, https_port);
    kill(stop_deployment);
    set_parameters(layout, options);
    status();
    get_stats();
    get_stats_json();
    get_application_cron_info(app_name);
    upload_app(archived_file, file_suffix, email);
    get_app_upload_status(reservation_id);
    get_database_information();
    get_api_status();
    stop_app(app_name);
    update(app_names);
    set_apps_to_restart(apps_to_restart);
    get_all_public_ips();
    get_online_users_list();
    done_uploading(appname, location);
    is_app_running(appname);
    backup_appscale(backup_in_info);
    add_role(new_role);
    remove_role(old_role);
    start_roles_on_nodes(ips_hash);
    gather_logs();
    add_routing_for_appserver(app_id, ip, port);
    add_routing_for_blob_server();
    remove_appserver_from_haproxy(app_id, ip, port);
    run_groomer();
    get_property(property_regex);
    set_property(property_name, property_value);
    deployment_id_exists();
    get_deployment_id();
    set_deployment_id(id);
    set_node_read_only(read_only);
    set_read_only(read_only);
    get_all_stats();
    does_app_exist(appname);
    reset_password(username, password);
    does_user_exist(username);
    create_user(username, password, account_type);
    set_admin_role(username, is_cloud_admin, capabilities);
    get_app_data(app_id);
    reserve_app_id(username, app_id, app_language);
    primary_db_is_up();
}
