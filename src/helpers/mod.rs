pub mod handler_404;
pub mod json_response;
