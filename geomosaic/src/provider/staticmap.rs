//! Static-map tile URL construction.
//!
//! Builds the provider request for one tile: a signed or unsigned query
//! against the static-map endpoint with the parameters
//! `center`, `zoom`, `size`, `scale`, `maptype=satellite`, `format`, `key`,
//! in that exact insertion order (the signature covers the ordered query).

use super::signing::{sign_path_query, SigningError};

/// Provider host, scheme included.
pub const STATIC_MAP_HOST: &str = "https://maps.googleapis.com";

/// Provider endpoint path.
pub const STATIC_MAP_PATH: &str = "/maps/api/staticmap";

/// Parameters shared by every tile URL of a job.
#[derive(Debug, Clone)]
pub struct StaticMapParams<'a> {
    pub zoom: u8,
    pub tile_size_px: u32,
    pub scale: u8,
    pub api_key: &'a str,
    pub signing_secret: Option<&'a str>,
}

/// Builds the full tile URL for the given center coordinate.
///
/// The center is formatted with 10 decimal places. When a signing secret is
/// present the canonical `path?query` is HMAC-SHA1 signed and the signature
/// appended as the final parameter.
pub fn build_tile_url(
    lat: f64,
    lon: f64,
    params: &StaticMapParams<'_>,
) -> Result<String, SigningError> {
    let center = format!("{:.10},{:.10}", lat, lon);
    let size = format!("{0}x{0}", params.tile_size_px);

    let query = [
        ("center", center.as_str()),
        ("zoom", &params.zoom.to_string()),
        ("size", &size),
        ("scale", &params.scale.to_string()),
        ("maptype", "satellite"),
        ("format", "jpg"),
        ("key", params.api_key),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, encode_component(v)))
    .collect::<Vec<_>>()
    .join("&");

    let resource = format!("{}?{}", STATIC_MAP_PATH, query);

    match params.signing_secret {
        Some(secret) => {
            let signature = sign_path_query(&resource, secret)?;
            Ok(format!(
                "{}{}&signature={}",
                STATIC_MAP_HOST, resource, signature
            ))
        }
        None => Ok(format!("{}{}", STATIC_MAP_HOST, resource)),
    }
}

/// Percent-encodes one query component.
///
/// Matches the provider's canonical form: unreserved characters
/// (`A-Z a-z 0-9 - _ . ~`) pass through, space becomes `+`, everything else
/// becomes uppercase `%XX`. The comma in `center` is the common case.
fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(api_key: &str) -> StaticMapParams<'_> {
        StaticMapParams {
            zoom: 19,
            tile_size_px: 640,
            scale: 2,
            api_key,
            signing_secret: None,
        }
    }

    #[test]
    fn test_unsigned_url_exact_form() {
        let url = build_tile_url(50.45, 30.525, &params("test-key")).unwrap();
        assert_eq!(
            url,
            "https://maps.googleapis.com/maps/api/staticmap\
             ?center=50.4500000000%2C30.5250000000&zoom=19&size=640x640\
             &scale=2&maptype=satellite&format=jpg&key=test-key"
        );
    }

    #[test]
    fn test_center_has_ten_decimal_places() {
        let url = build_tile_url(1.5, -2.0, &params("k")).unwrap();
        assert!(url.contains("center=1.5000000000%2C-2.0000000000"));
    }

    #[test]
    fn test_parameter_order_is_fixed() {
        let url = build_tile_url(0.0, 0.0, &params("k")).unwrap();
        let positions: Vec<usize> = ["center=", "zoom=", "size=", "scale=", "maptype=", "format=", "key="]
            .iter()
            .map(|p| url.find(p).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_signed_url_appends_signature_last() {
        let mut p = params("test-key");
        p.signing_secret = Some("bXktc2VjcmV0LWtleS0xMjM=");
        let url = build_tile_url(50.45, 30.525, &p).unwrap();

        // Signature matches the precomputed reference for this exact resource.
        assert!(url.ends_with("&signature=Lz4IuoZLiaIByA_GhMvjl-4Vm_c="));
        // The signed URL is the unsigned URL plus the signature parameter.
        let unsigned = build_tile_url(50.45, 30.525, &params("test-key")).unwrap();
        assert!(url.starts_with(&unsigned));
    }

    #[test]
    fn test_invalid_secret_surfaces_error() {
        let mut p = params("k");
        p.signing_secret = Some("!!not-base64!!");
        assert!(build_tile_url(0.0, 0.0, &p).is_err());
    }

    #[test]
    fn test_encode_component_passthrough_and_escapes() {
        assert_eq!(encode_component("abc-123_.~"), "abc-123_.~");
        assert_eq!(encode_component("a,b"), "a%2Cb");
        assert_eq!(encode_component("a b"), "a+b");
        assert_eq!(encode_component("50.45,-30.5"), "50.45%2C-30.5");
    }
}
