pub mod admin_lists;
pub mod app_state;
pub mod list;
pub mod notification;
