use crate::error::{AppError, AppResult};

pub const MAX_PHOTO_REF_LEN: usize = 2048;

/// Trimmed display name, non-empty and at most `max_len` characters
pub fn group_name(name: &str, max_len: usize) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if name.chars().count() > max_len {
        return Err(AppError::BadRequest(format!(
            "name must be at most {} characters",
            max_len
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(AppError::BadRequest("name must not contain control characters".into()));
    }
    Ok(name.to_string())
}

/// Photo references are opaque tokens or URLs: one non-empty word, bounded length
pub fn photo_ref(photo: &str) -> AppResult<String> {
    if photo.is_empty() {
        return Err(AppError::BadRequest("photo reference must not be empty".into()));
    }
    if photo.len() > MAX_PHOTO_REF_LEN {
        return Err(AppError::BadRequest(format!(
            "photo reference must be at most {} bytes",
            MAX_PHOTO_REF_LEN
        )));
    }
    if photo.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::BadRequest("photo reference is malformed".into()));
    }
    Ok(photo.to_string())
}
