//! Media storage module
//!
//! Handles image upload and deletion on an S3-compatible bucket.

mod media;

pub use media::{DataUrl, MediaKind, MediaStorage};

pub(crate) fn build_s3_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    // Plain http endpoints are allowed for local object stores.
    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}
