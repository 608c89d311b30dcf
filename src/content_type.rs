// Response content negotiation
// Parses Content-Type headers and decodes reply bodies accordingly

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::transport::RawResponse;

/// Media type every JSON reply must carry
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// Parse a Content-Type header into its media type and parameter map.
///
/// `"application/json; charset=utf-8"` yields `("application/json",
/// {charset: utf-8})`. Parameter values may be quoted, so values containing
/// `;` or spaces survive tokenization. A missing header is a validation
/// error, not a default.
pub fn parse_content_type(header: Option<&str>) -> Result<(String, HashMap<String, String>)> {
    let header = header.ok_or(ClientError::MissingContentType)?;

    match header.split_once(';') {
        Some((media, params)) => {
            let media = media.trim().to_string();
            Ok((media, parse_parameters(params)?))
        }
        None => Ok((header.trim().to_string(), HashMap::new())),
    }
}

/// Tokenize a parameter block shell-style into key=value pairs.
fn parse_parameters(params: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for token in tokenize(params)? {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ClientError::MalformedParameter(token.clone()))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

/// Split on unquoted whitespace, honouring single quotes, double quotes and
/// backslash escapes (outside single quotes).
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    loop {
        let Some(c) = chars.next() else { break };
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => {
                            return Err(ClientError::MalformedParameter(
                                "unterminated single quote".to_string(),
                            ))
                        }
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => current.push(c),
                            None => {
                                return Err(ClientError::MalformedParameter(
                                    "dangling escape".to_string(),
                                ))
                            }
                        },
                        Some(c) => current.push(c),
                        None => {
                            return Err(ClientError::MalformedParameter(
                                "unterminated double quote".to_string(),
                            ))
                        }
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(c) => current.push(c),
                    None => {
                        return Err(ClientError::MalformedParameter(
                            "dangling escape".to_string(),
                        ))
                    }
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Decode reply body bytes according to the negotiated charset.
///
/// No charset means utf-8. Charsets beyond utf-8/us-ascii are rejected
/// rather than guessed at.
pub fn decode_body(body: &[u8], charset: Option<&str>) -> Result<String> {
    let charset = charset.map(|c| c.trim().to_ascii_lowercase());
    match charset.as_deref() {
        None | Some("utf-8") | Some("utf8") => String::from_utf8(body.to_vec())
            .map_err(|_| ClientError::BodyDecode {
                charset: "utf-8".to_string(),
            }),
        Some(ascii @ ("us-ascii" | "ascii")) => {
            if !body.is_ascii() {
                return Err(ClientError::BodyDecode {
                    charset: ascii.to_string(),
                });
            }
            String::from_utf8(body.to_vec()).map_err(|_| ClientError::BodyDecode {
                charset: ascii.to_string(),
            })
        }
        Some(other) => Err(ClientError::UnsupportedCharset(other.to_string())),
    }
}

/// Negotiate and decode a JSON reply body.
///
/// Requires a Content-Type of `application/json`, decodes the body in the
/// declared charset and parses it as JSON.
pub fn decode_json_reply(response: &RawResponse) -> Result<Value> {
    let (media_type, params) = parse_content_type(response.content_type())?;
    if media_type != MEDIA_TYPE_JSON {
        return Err(ClientError::UnexpectedContentType(media_type));
    }

    let body = decode_body(&response.body, params.get("charset").map(String::as_str))?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_media_type_without_parameters() {
        let (media, params) = parse_content_type(Some("application/json")).unwrap();
        assert_eq!(media, "application/json");
        assert!(params.is_empty());
    }

    #[test]
    fn test_media_type_with_charset() {
        let (media, params) = parse_content_type(Some("application/json; charset=utf-8")).unwrap();
        assert_eq!(media, "application/json");
        assert_eq!(params.get("charset").map(String::as_str), Some("utf-8"));
    }

    #[test]
    fn test_media_type_is_trimmed() {
        let (media, _) = parse_content_type(Some("  application/json  ; charset=utf-8")).unwrap();
        assert_eq!(media, "application/json");
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let err = parse_content_type(None).unwrap_err();
        assert!(matches!(err, ClientError::MissingContentType));
    }

    #[test]
    fn test_quoted_parameter_values_survive() {
        let (_, params) =
            parse_content_type(Some("application/json; profile=\"a b; c\" charset=utf-8"))
                .unwrap();
        assert_eq!(params.get("profile").map(String::as_str), Some("a b; c"));
        assert_eq!(params.get("charset").map(String::as_str), Some("utf-8"));
    }

    #[test]
    fn test_single_quoted_parameter() {
        let (_, params) = parse_content_type(Some("text/plain; note='x y'")).unwrap();
        assert_eq!(params.get("note").map(String::as_str), Some("x y"));
    }

    #[test]
    fn test_parameter_without_equals_is_rejected() {
        let err = parse_content_type(Some("application/json; charset")).unwrap_err();
        assert!(matches!(err, ClientError::MalformedParameter(_)));
    }

    #[test]
    fn test_unterminated_quote_is_rejected() {
        let err = parse_content_type(Some("application/json; charset=\"utf-8")).unwrap_err();
        assert!(matches!(err, ClientError::MalformedParameter(_)));
    }

    #[test]
    fn test_decode_body_default_is_utf8() {
        assert_eq!(decode_body("h\u{e9}llo".as_bytes(), None).unwrap(), "héllo");
    }

    #[test]
    fn test_decode_body_honours_declared_charset() {
        assert_eq!(decode_body(b"plain", Some("US-ASCII")).unwrap(), "plain");

        let err = decode_body("héllo".as_bytes(), Some("us-ascii")).unwrap_err();
        assert!(matches!(err, ClientError::BodyDecode { .. }));

        let err = decode_body(b"anything", Some("iso-8859-1")).unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedCharset(_)));
    }

    #[test]
    fn test_decode_body_invalid_utf8() {
        let err = decode_body(&[0xff, 0xfe, 0x00], Some("utf-8")).unwrap_err();
        assert!(matches!(err, ClientError::BodyDecode { .. }));
    }

    proptest! {
        #[test]
        fn parse_round_trips_simple_parameters(
            keys in proptest::collection::vec("[a-z]{1,8}", 1..4),
            values in proptest::collection::vec("[a-zA-Z0-9._-]{1,12}", 1..4),
        ) {
            let pairs: Vec<(String, String)> = keys
                .into_iter()
                .zip(values)
                .collect::<std::collections::HashMap<_, _>>()
                .into_iter()
                .collect();
            let rendered = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            let header = format!("application/json; {}", rendered);

            let (media, params) = parse_content_type(Some(&header)).unwrap();
            prop_assert_eq!(media, "application/json");
            for (k, v) in &pairs {
                prop_assert_eq!(params.get(k.as_str()), Some(v));
            }
        }
    }
}
