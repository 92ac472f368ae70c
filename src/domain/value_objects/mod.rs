pub mod project_ref;
pub mod remote_url;
