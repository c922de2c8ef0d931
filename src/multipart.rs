//! `multipart/form-data` body for `POST /analyze`.
//!
//! The backend contract fixes field names and filenames per side
//! ([`ImageSide`]): a single photo travels as `image` / `coin_image.jpg`,
//! a pair as `front_image` / `coin_front.jpg` then `back_image` /
//! `coin_back.jpg`. Every part is:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="<field>"; filename="<file>"\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <bytes>\r\n
//! ```
//!
//! followed once by `--<boundary>--\r\n`.
//!
//! [`encode`] is a pure function of its inputs; randomness lives only in
//! [`choose_boundary`].

use crate::model::{AnalysisRequest, ImageSide};
use uuid::Uuid;

/// An encoded body plus the boundary its `Content-Type` must announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub boundary: String,
    pub bytes: Vec<u8>,
}

impl MultipartBody {
    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// A fresh random boundary token.
pub fn generate_boundary() -> String {
    format!("Boundary-{}", Uuid::new_v4().simple())
}

/// Pick a boundary that occurs in none of the request's images.
pub fn choose_boundary(request: &AnalysisRequest) -> String {
    loop {
        let boundary = generate_boundary();
        let collides = request
            .parts()
            .iter()
            .any(|(_, image)| contains(&image.bytes, boundary.as_bytes()));
        if !collides {
            return boundary;
        }
    }
}

/// Serialize the request's images under `boundary`.
pub fn encode(request: &AnalysisRequest, boundary: &str) -> Vec<u8> {
    let parts = request.parts();
    let mut body = Vec::with_capacity(request.image_bytes() + parts.len() * 160 + 64);

    for (side, image) in parts {
        write_part_header(&mut body, boundary, side, image.content_type);
        body.extend_from_slice(&image.bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Choose a boundary and encode in one step.
pub fn build_body(request: &AnalysisRequest) -> MultipartBody {
    let boundary = choose_boundary(request);
    let bytes = encode(request, &boundary);
    MultipartBody { boundary, bytes }
}

fn write_part_header(body: &mut Vec<u8>, boundary: &str, side: ImageSide, content_type: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            side.field_name(),
            side.filename()
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
