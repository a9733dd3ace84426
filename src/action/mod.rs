//! Action requests, responses and routing.
//!
//! A transport hands raw bytes to [`Request::decode`], the orchestrator runs
//! the installed [`Handler`] (usually an [`ActionMux`]) against a
//! [`ResponseWriter`], and the finished [`Response`] is encoded back in the
//! request's encoding.
//!
//! # Example
//!
//! ```ignore
//! let mut mux = ActionMux::new();
//! mux.register_fn(actions::GET_VERSION, |w, _r| {
//!     w.write_data(json!({"version": "1.0.0", "onebot_version": "12"}));
//! });
//! mux.register_extended_fn("some_action", |w, _r| {
//!     w.write_data("It works!");
//! });
//! ```

mod mux;
mod params;
mod request;
mod response;

pub use mux::{ActionMux, Handler, HandlerFn};
pub use params::{ParamError, ParamGetter, Params};
pub use request::{Action, Request};
pub use response::{Response, ResponseWriter, Status};

/// Protocol return codes.
pub mod retcode {
    pub const OK: i64 = 0;

    pub const BAD_REQUEST: i64 = 10001;
    /// The requested action is not registered.
    pub const UNSUPPORTED_ACTION: i64 = 10002;
    pub const BAD_PARAM: i64 = 10003;
    pub const UNSUPPORTED_PARAM: i64 = 10004;
    pub const UNSUPPORTED_SEGMENT: i64 = 10005;
    pub const BAD_SEGMENT_DATA: i64 = 10006;
    pub const UNSUPPORTED_SEGMENT_DATA: i64 = 10007;
    /// Several bots share the runtime and the request named none.
    pub const WHO_AM_I: i64 = 10101;
    pub const UNKNOWN_SELF: i64 = 10102;

    pub const BAD_HANDLER: i64 = 20001;
    pub const INTERNAL_HANDLER_ERROR: i64 = 20002;
}

/// Names of standard core actions.
pub mod actions {
    /// Answered by the HTTP transport itself, never by a registered handler.
    pub const GET_LATEST_EVENTS: &str = "get_latest_events";
    pub const GET_SUPPORTED_ACTIONS: &str = "get_supported_actions";
    pub const GET_STATUS: &str = "get_status";
    pub const GET_VERSION: &str = "get_version";

    pub const SEND_MESSAGE: &str = "send_message";
    pub const DELETE_MESSAGE: &str = "delete_message";

    pub const GET_SELF_INFO: &str = "get_self_info";
    pub const GET_USER_INFO: &str = "get_user_info";
    pub const GET_FRIEND_LIST: &str = "get_friend_list";

    pub const GET_GROUP_INFO: &str = "get_group_info";
    pub const GET_GROUP_LIST: &str = "get_group_list";
    pub const GET_GROUP_MEMBER_INFO: &str = "get_group_member_info";
    pub const GET_GROUP_MEMBER_LIST: &str = "get_group_member_list";
    pub const SET_GROUP_NAME: &str = "set_group_name";
    pub const LEAVE_GROUP: &str = "leave_group";

    pub const UPLOAD_FILE: &str = "upload_file";
    pub const GET_FILE: &str = "get_file";
}
