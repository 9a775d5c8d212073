/// Image types accepted for upload.
pub const IMAGE_MIMES: &[&str] = &[
    "image/jpg",
    "image/jpeg",
    "image/png",
    "image/svg",
    "image/gif",
];

/// Checks a declared content type against an allow-list.
///
/// The comparison is an exact string match on the type the client declared;
/// the bytes are never inspected here.
pub fn validate_mime<S: AsRef<str>>(typ: &str, allowed: &[S]) -> bool {
    allowed.iter().any(|m| m.as_ref() == typ)
}
