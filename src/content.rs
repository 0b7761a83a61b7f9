//! Content presets and payload encoding.
//!
//! Turns a typed [`ContentRequest`] into the exact text payload a QR reader
//! expects for that content kind: `WIFI:` network descriptors, `mailto:` and
//! `tel:`/`sms:` URIs, vCard 3.0 blocks, `geo:` URIs, and plain text or web
//! addresses. Encoding is pure and deterministic; all validation happens here,
//! before any symbol work.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::QrError;

// RFC 3986 unreserved characters stay literal; everything else is escaped.
const QUERY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// WiFi network security type, as written into the `T:` field.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiSecurity {
    #[default]
    Wpa,
    Wep,
    NoPass,
}

impl core::fmt::Display for WifiSecurity {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(match self {
            WifiSecurity::Wpa => "WPA",
            WifiSecurity::Wep => "WEP",
            WifiSecurity::NoPass => "nopass",
        })
    }
}

/// A request to encode one of the supported content kinds.
///
/// Each variant carries the typed fields of its kind; optional fields may be
/// left empty and are omitted from the payload. Serde-tagged so a settings
/// layer or batch manifest can carry requests as data.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRequest {
    /// Arbitrary text, passed through verbatim.
    PlainText { text: String },
    /// A web address; a missing scheme is defaulted to `https://`.
    Website { url: String },
    /// WiFi network join descriptor.
    Wifi {
        ssid: String,
        password: Option<String>,
        security: WifiSecurity,
        hidden: bool,
    },
    /// `mailto:` URI with optional prefilled subject and body.
    Email {
        address: String,
        subject: String,
        body: String,
    },
    /// `tel:` URI. Formatting characters in the number are dropped.
    Phone { number: String },
    /// `sms:` URI with optional prefilled message.
    Sms { number: String, message: String },
    /// vCard 3.0 contact card. Only the name is required.
    VCard {
        name: String,
        organization: String,
        title: String,
        phone: String,
        email: String,
    },
    /// `geo:` URI pointing at a latitude/longitude pair.
    Geo { latitude: f64, longitude: f64 },
}

impl ContentRequest {
    /// A short human-readable summary of the request's primary field, used for
    /// content-derived filenames.
    pub fn summary(&self) -> &str {
        match self {
            ContentRequest::PlainText { text } => text,
            ContentRequest::Website { url } => url,
            ContentRequest::Wifi { ssid, .. } => ssid,
            ContentRequest::Email { address, .. } => address,
            ContentRequest::Phone { number } => number,
            ContentRequest::Sms { number, .. } => number,
            ContentRequest::VCard { name, .. } => name,
            ContentRequest::Geo { .. } => "geo",
        }
    }
}

/// The payload text produced from a [`ContentRequest`], paired with the
/// request it came from.
#[derive(Clone, PartialEq, Debug)]
pub struct EncodedPayload {
    text: String,
    request: ContentRequest,
}

impl EncodedPayload {
    /// The exact text to encode into the symbol.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The request this payload was built from.
    pub fn request(&self) -> &ContentRequest {
        &self.request
    }
}

/// Encodes a content request into its payload text.
///
/// # Errors
///
/// [`QrError::InvalidInput`] naming the offending field when a required field
/// is empty or a value fails its range check.
pub fn encode(request: &ContentRequest) -> Result<EncodedPayload, QrError> {
    let text = match request {
        ContentRequest::PlainText { text } => {
            if text.is_empty() {
                return Err(invalid("text", "must not be empty"));
            }
            text.clone()
        }
        ContentRequest::Website { url } => {
            let url = url.trim();
            if url.is_empty() {
                return Err(invalid("url", "must not be empty"));
            }
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_owned()
            } else {
                format!("https://{url}")
            }
        }
        ContentRequest::Wifi {
            ssid,
            password,
            security,
            hidden,
        } => {
            if ssid.is_empty() {
                return Err(invalid("ssid", "must not be empty"));
            }
            let password = password.as_deref().unwrap_or("");
            // A missing password always means an open network, whatever the
            // requested security type says.
            let security = if password.is_empty() {
                WifiSecurity::NoPass
            } else {
                *security
            };
            format!(
                "WIFI:T:{};S:{};P:{};H:{};;",
                security,
                escape_wifi(ssid),
                escape_wifi(password),
                hidden
            )
        }
        ContentRequest::Email {
            address,
            subject,
            body,
        } => {
            if address.is_empty() {
                return Err(invalid("address", "must not be empty"));
            }
            let mut uri = format!("mailto:{address}");
            let mut params: Vec<String> = Vec::new();
            if !subject.is_empty() {
                params.push(format!(
                    "subject={}",
                    utf8_percent_encode(subject, QUERY_SET)
                ));
            }
            if !body.is_empty() {
                params.push(format!("body={}", utf8_percent_encode(body, QUERY_SET)));
            }
            if !params.is_empty() {
                uri.push('?');
                uri.push_str(&params.join("&"));
            }
            uri
        }
        ContentRequest::Phone { number } => {
            let digits = strip_phone(number);
            if digits.is_empty() {
                return Err(invalid("number", "contains no digits"));
            }
            format!("tel:{digits}")
        }
        ContentRequest::Sms { number, message } => {
            let digits = strip_phone(number);
            if digits.is_empty() {
                return Err(invalid("number", "contains no digits"));
            }
            let mut uri = format!("sms:{digits}");
            if !message.is_empty() {
                uri.push_str(&format!("?body={}", utf8_percent_encode(message, QUERY_SET)));
            }
            uri
        }
        ContentRequest::VCard {
            name,
            organization,
            title,
            phone,
            email,
        } => {
            if name.is_empty() {
                return Err(invalid("name", "must not be empty"));
            }
            let mut lines = vec![
                "BEGIN:VCARD".to_owned(),
                "VERSION:3.0".to_owned(),
                format!("FN:{name}"),
            ];
            if !organization.is_empty() {
                lines.push(format!("ORG:{organization}"));
            }
            if !title.is_empty() {
                lines.push(format!("TITLE:{title}"));
            }
            if !phone.is_empty() {
                lines.push(format!("TEL:{phone}"));
            }
            if !email.is_empty() {
                lines.push(format!("EMAIL:{email}"));
            }
            lines.push("END:VCARD".to_owned());
            lines.join("\n")
        }
        ContentRequest::Geo {
            latitude,
            longitude,
        } => {
            if !(-90.0..=90.0).contains(latitude) {
                return Err(invalid("latitude", "must be within [-90, 90]"));
            }
            if !(-180.0..=180.0).contains(longitude) {
                return Err(invalid("longitude", "must be within [-180, 180]"));
            }
            format!("geo:{latitude:.6},{longitude:.6}")
        }
    };
    Ok(EncodedPayload {
        text,
        request: request.clone(),
    })
}

fn invalid(field: &'static str, reason: &str) -> QrError {
    QrError::InvalidInput {
        field,
        reason: reason.to_owned(),
    }
}

// Backslash-escapes the characters the WIFI format reserves.
fn escape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ';' | ',' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// Keeps only digits and a leading-style '+'; everything else is formatting.
fn strip_phone(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let payload = encode(&ContentRequest::PlainText {
            text: "hello".into(),
        })
        .unwrap();
        assert_eq!(payload.text(), "hello");
    }

    #[test]
    fn empty_plain_text_is_rejected() {
        let err = encode(&ContentRequest::PlainText { text: String::new() }).unwrap_err();
        assert!(matches!(err, QrError::InvalidInput { field: "text", .. }));
    }

    #[test]
    fn website_gets_https_prefix_and_trim() {
        let payload = encode(&ContentRequest::Website {
            url: "  example.com/page  ".into(),
        })
        .unwrap();
        assert_eq!(payload.text(), "https://example.com/page");

        let payload = encode(&ContentRequest::Website {
            url: "http://example.com".into(),
        })
        .unwrap();
        assert_eq!(payload.text(), "http://example.com");
    }

    #[test]
    fn wifi_payload_escapes_reserved_characters() {
        let payload = encode(&ContentRequest::Wifi {
            ssid: "Cafe;Net".into(),
            password: Some("pa,ss\"w\\d".into()),
            security: WifiSecurity::Wpa,
            hidden: false,
        })
        .unwrap();
        assert_eq!(
            payload.text(),
            "WIFI:T:WPA;S:Cafe\\;Net;P:pa\\,ss\\\"w\\\\d;H:false;;"
        );
    }

    #[test]
    fn wifi_without_password_becomes_open_network() {
        let payload = encode(&ContentRequest::Wifi {
            ssid: "OpenNet".into(),
            password: None,
            security: WifiSecurity::Wpa,
            hidden: true,
        })
        .unwrap();
        assert_eq!(payload.text(), "WIFI:T:nopass;S:OpenNet;P:;H:true;;");
    }

    #[test]
    fn wifi_requires_ssid() {
        let err = encode(&ContentRequest::Wifi {
            ssid: String::new(),
            password: None,
            security: WifiSecurity::Wpa,
            hidden: false,
        })
        .unwrap_err();
        assert!(matches!(err, QrError::InvalidInput { field: "ssid", .. }));
    }

    #[test]
    fn email_encodes_subject_and_body() {
        let payload = encode(&ContentRequest::Email {
            address: "a@b.com".into(),
            subject: "Hello World".into(),
            body: "Line 1 & 2".into(),
        })
        .unwrap();
        assert_eq!(
            payload.text(),
            "mailto:a@b.com?subject=Hello%20World&body=Line%201%20%26%202"
        );
    }

    #[test]
    fn email_without_extras_is_bare_mailto() {
        let payload = encode(&ContentRequest::Email {
            address: "a@b.com".into(),
            subject: String::new(),
            body: String::new(),
        })
        .unwrap();
        assert_eq!(payload.text(), "mailto:a@b.com");
    }

    #[test]
    fn phone_number_is_stripped_to_digits() {
        let payload = encode(&ContentRequest::Phone {
            number: "(555) 123-4567".into(),
        })
        .unwrap();
        assert_eq!(payload.text(), "tel:5551234567");

        let payload = encode(&ContentRequest::Phone {
            number: "+1 555 123 4567".into(),
        })
        .unwrap();
        assert_eq!(payload.text(), "tel:+15551234567");
    }

    #[test]
    fn phone_without_digits_is_rejected() {
        let err = encode(&ContentRequest::Phone {
            number: "call me".into(),
        })
        .unwrap_err();
        assert!(matches!(err, QrError::InvalidInput { field: "number", .. }));
    }

    #[test]
    fn sms_carries_percent_encoded_message() {
        let payload = encode(&ContentRequest::Sms {
            number: "555-0100".into(),
            message: "On my way!".into(),
        })
        .unwrap();
        assert_eq!(payload.text(), "sms:5550100?body=On%20my%20way%21");
    }

    #[test]
    fn vcard_omits_blank_optional_fields() {
        let payload = encode(&ContentRequest::VCard {
            name: "Ada Lovelace".into(),
            organization: String::new(),
            title: "Analyst".into(),
            phone: "555-0100".into(),
            email: String::new(),
        })
        .unwrap();
        assert_eq!(
            payload.text(),
            "BEGIN:VCARD\nVERSION:3.0\nFN:Ada Lovelace\nTITLE:Analyst\nTEL:555-0100\nEND:VCARD"
        );
    }

    #[test]
    fn geo_formats_six_decimal_places() {
        let payload = encode(&ContentRequest::Geo {
            latitude: 52.520008,
            longitude: 13.404954,
        })
        .unwrap();
        assert_eq!(payload.text(), "geo:52.520008,13.404954");
    }

    #[test]
    fn geo_rejects_out_of_range_coordinates() {
        let err = encode(&ContentRequest::Geo {
            latitude: 91.0,
            longitude: 0.0,
        })
        .unwrap_err();
        assert!(matches!(err, QrError::InvalidInput { field: "latitude", .. }));

        let err = encode(&ContentRequest::Geo {
            latitude: 0.0,
            longitude: -200.0,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            QrError::InvalidInput {
                field: "longitude",
                ..
            }
        ));
    }
}
