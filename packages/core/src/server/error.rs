//! Rejection handling for the conversion service

use crate::convert::ConvertError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Application errors surfaced as warp rejections
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),
}

impl warp::reject::Reject for ServiceError {}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

fn status_for(err: &Rejection) -> (StatusCode, &'static str) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "Invalid Body")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Length Required")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type")
    } else if let Some(e) = err.find::<ServiceError>() {
        error!("unhandled application error: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        error!("unhandled error: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

/// Turn any rejection into a JSON error response
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = status_for(&err);
    let json = warp::reply::json(&ErrorResponse {
        message: message.into(),
    });
    Ok(warp::reply::with_status(json, code))
}
