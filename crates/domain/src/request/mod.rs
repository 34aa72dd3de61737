//! API request types

mod api_request;

pub use api_request::{
    ACCEPT, APPLICATION_JSON, AUTHORIZATION, ApiRequest, CONTENT_TYPE, HttpMethod,
};
