//! Image validation contract and `/images/{id}` reference helpers.
//!
//! Server and client must agree on the same allow-list and size limit so the
//! error messages a user sees match what the blob store enforces.

use crate::entry::ValidationError;
use crate::id::ObjectId;

/// Content types accepted for entry images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Largest accepted image: 5 MiB.
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Message for an image over [`MAX_IMAGE_SIZE`].
pub const IMAGE_TOO_LARGE: &str = "Image size must be less than 5MB";

/// Path prefix of an image reference stored on an entry.
pub const IMAGE_URL_PREFIX: &str = "/images/";

pub fn is_allowed_image_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(content_type.trim()))
}

pub fn validate_content_type(content_type: &str) -> Result<(), ValidationError> {
    if !is_allowed_image_type(content_type) {
        return Err(ValidationError::new(
            "Please select a valid image file (JPEG, PNG, or WebP)",
        ));
    }
    Ok(())
}

pub fn validate_size(size: u64) -> Result<(), ValidationError> {
    if size > MAX_IMAGE_SIZE {
        return Err(ValidationError::new(IMAGE_TOO_LARGE));
    }
    Ok(())
}

/// Reference embedded in an entry's `imageUrl`.
pub fn image_url(id: &ObjectId) -> String {
    format!("{IMAGE_URL_PREFIX}{id}")
}

/// Extract the blob id from a reference.
///
/// Only the exact shape `/images/<24 lowercase hex>` is accepted; anything
/// else is treated as malformed.
pub fn parse_image_url(url: &str) -> Option<ObjectId> {
    url.strip_prefix(IMAGE_URL_PREFIX)
        .and_then(|rest| ObjectId::from_hex(rest).ok())
}
