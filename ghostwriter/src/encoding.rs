use crate::error::Error;

/// Decodes template bytes as strict UTF-8.
///
/// NUL bytes are rejected before decoding is attempted.  No normalization is
/// applied: a leading byte order mark is kept as-is.
pub fn decode(bytes: &[u8]) -> Result<&str, Error> {
    if bytes.contains(&0) {
        return Err(Error::encoding(
            "Template file contains invalid binary data",
        ));
    }
    std::str::from_utf8(bytes)
        .map_err(|_| Error::encoding("Template file contains invalid UTF-8 bytes"))
}
