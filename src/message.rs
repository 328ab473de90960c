// Certificate update envelope
//
// Canonical JSON shape published to subscribers. One message per X.509
// leaf, built straight from the parsed certificate.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use x509_parser::der_parser::oid::Oid;
use x509_parser::prelude::*;

/// Envelope published for every newly-logged certificate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertMessage {
    pub message_type: String,
    pub data: MessageData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageData {
    pub update_type: String,
    pub cert_index: u64,
    pub cert_link: String,
    /// Wall-clock time of normalization, fractional UNIX seconds
    pub seen: f64,
    pub source: MessageSource,
    pub leaf_cert: LeafCert,
}

/// The log a certificate was observed in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSource {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeafCert {
    pub subject: CertDn,
    pub issuer: CertDn,
    pub extensions: CertExtensions,
    pub not_before: i64,
    pub not_after: i64,
    pub serial_number: String,
    /// Colon-separated uppercase SHA-1 over the DER encoding
    pub fingerprint: String,
    pub all_domains: Vec<String>,
    pub signature_algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_der: Option<String>,
}

/// Distinguished-name view: structured attributes plus the aggregated
/// OpenSSL-style `/Type=Value` string in original RDN order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertDn {
    pub aggregated: String,
    #[serde(rename = "C")]
    pub c: Option<String>,
    #[serde(rename = "ST")]
    pub st: Option<String>,
    #[serde(rename = "L")]
    pub l: Option<String>,
    #[serde(rename = "O")]
    pub o: Option<String>,
    #[serde(rename = "OU")]
    pub ou: Option<String>,
    #[serde(rename = "CN")]
    pub cn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertExtensions {
    #[serde(rename = "subjectAltName")]
    pub subject_alt_name: String,
    #[serde(rename = "basicConstraints", default, skip_serializing_if = "Option::is_none")]
    pub basic_constraints: Option<String>,
    #[serde(rename = "keyUsage", default, skip_serializing_if = "Option::is_none")]
    pub key_usage: Option<String>,
    #[serde(rename = "extendedKeyUsage", default, skip_serializing_if = "Option::is_none")]
    pub extended_key_usage: Option<String>,
    #[serde(
        rename = "authorityKeyIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub authority_key_identifier: Option<String>,
    #[serde(
        rename = "subjectKeyIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_key_identifier: Option<String>,
}

impl CertMessage {
    /// Build the envelope for one X.509 leaf observed at `cert_index`.
    pub fn from_x509(
        log_url: &str,
        log_name: &str,
        cert_index: u64,
        der: &[u8],
        cert: &X509Certificate,
    ) -> Self {
        let cert_link = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            log_url.trim_end_matches('/'),
            cert_index,
            cert_index
        );
        let seen = Utc::now().timestamp_nanos_opt().unwrap_or_default() as f64 / 1e9;
        let (extensions, dns_names) = cert_extensions(cert);

        let mut msg = CertMessage {
            message_type: "certificate_update".to_string(),
            data: MessageData {
                update_type: "X509Certificate".to_string(),
                cert_index,
                cert_link,
                seen,
                source: MessageSource {
                    url: log_url.to_string(),
                    name: log_name.to_string(),
                },
                leaf_cert: LeafCert {
                    subject: cert_dn(cert.subject()),
                    issuer: cert_dn(cert.issuer()),
                    extensions,
                    not_before: cert.validity().not_before.timestamp(),
                    not_after: cert.validity().not_after.timestamp(),
                    serial_number: cert.serial.to_str_radix(16).to_uppercase(),
                    fingerprint: colon_hex(&openssl::sha::sha1(der)),
                    all_domains: Vec::new(),
                    signature_algorithm: signature_algorithm_label(cert),
                    // TODO: expose an option to populate as_der; the raw
                    // encoding is large and most consumers skip it
                    as_der: None,
                },
            },
        };

        let cn = msg.data.leaf_cert.subject.cn.clone();
        if let Some(cn) = cn {
            msg.add_domain(&cn);
        }
        msg.add_domains(dns_names.iter().map(String::as_str));
        msg
    }

    /// Record a domain, skipping empty values and duplicates.
    pub fn add_domain(&mut self, domain: &str) {
        if domain.is_empty() {
            return;
        }
        let domains = &mut self.data.leaf_cert.all_domains;
        if domains.iter().any(|d| d == domain) {
            return;
        }
        domains.push(domain.to_string());
    }

    pub fn add_domains<'a>(&mut self, domains: impl IntoIterator<Item = &'a str>) {
        for domain in domains {
            self.add_domain(domain);
        }
    }
}

/// Uppercase colon-separated hex, the fingerprint rendering
fn colon_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn dn_type_label(oid: &Oid) -> String {
    match oid.to_id_string().as_str() {
        "2.5.4.3" => "CN".to_string(),
        "2.5.4.6" => "C".to_string(),
        "2.5.4.7" => "L".to_string(),
        "2.5.4.8" => "ST".to_string(),
        "2.5.4.10" => "O".to_string(),
        "2.5.4.11" => "OU".to_string(),
        other => other.to_string(),
    }
}

/// Flatten an X.509 name into the structured + aggregated view. Attribute
/// values are used raw; a value containing `/` or `=` corrupts the
/// aggregated string, matching the historical output.
fn cert_dn(name: &X509Name) -> CertDn {
    let mut dn = CertDn::default();
    for rdn in name.iter() {
        for attr in rdn.iter() {
            let value = match attr.as_str() {
                Ok(value) => value,
                Err(_) => continue,
            };
            let label = dn_type_label(attr.attr_type());
            dn.aggregated.push('/');
            dn.aggregated.push_str(&label);
            dn.aggregated.push('=');
            dn.aggregated.push_str(value);
            match label.as_str() {
                "C" => dn.c = Some(value.to_string()),
                "ST" => dn.st = Some(value.to_string()),
                "L" => dn.l = Some(value.to_string()),
                "O" => dn.o = Some(value.to_string()),
                "OU" => dn.ou = Some(value.to_string()),
                "CN" => dn.cn = Some(value.to_string()),
                _ => {}
            }
        }
    }
    dn
}

fn format_ip(raw: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(raw) {
        IpAddr::from(octets).to_string()
    } else if let Ok(octets) = <[u8; 16]>::try_from(raw) {
        IpAddr::from(octets).to_string()
    } else {
        raw.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Extract the extension view plus the DNS SANs used for `all_domains`.
fn cert_extensions(cert: &X509Certificate) -> (CertExtensions, Vec<String>) {
    let mut exts = CertExtensions::default();
    let mut dns_names = Vec::new();

    let mut sans = Vec::new();
    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => {
                    sans.push(format!("DNS:{}", dns));
                    dns_names.push(dns.to_string());
                }
                GeneralName::IPAddress(ip) => {
                    sans.push(format!("IP Address:{}", format_ip(ip)));
                }
                GeneralName::RFC822Name(email) => {
                    sans.push(format!("email:{}", email));
                }
                _ => {}
            }
        }
    }
    exts.subject_alt_name = sans.join(", ");

    // Only set when the extension is present
    if let Ok(Some(bc)) = cert.basic_constraints() {
        exts.basic_constraints = Some(if bc.value.ca {
            "CA:TRUE".to_string()
        } else {
            "CA:FALSE".to_string()
        });
    }

    if let Ok(Some(ku)) = cert.key_usage() {
        let labels = key_usage_labels(ku.value);
        if !labels.is_empty() {
            exts.key_usage = Some(labels);
        }
    }

    if let Ok(Some(eku)) = cert.extended_key_usage() {
        let labels = extended_key_usage_labels(eku.value);
        if !labels.is_empty() {
            exts.extended_key_usage = Some(labels);
        }
    }

    if let Ok(Some(ext)) =
        cert.get_extension_unique(&oid_registry::OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER)
    {
        if let ParsedExtension::AuthorityKeyIdentifier(aki) = ext.parsed_extension() {
            if let Some(key_id) = &aki.key_identifier {
                exts.authority_key_identifier = Some(format!("keyid:{}\n", colon_hex(key_id.0)));
            }
        }
    }

    if let Ok(Some(ext)) =
        cert.get_extension_unique(&oid_registry::OID_X509_EXT_SUBJECT_KEY_IDENTIFIER)
    {
        if let ParsedExtension::SubjectKeyIdentifier(key_id) = ext.parsed_extension() {
            exts.subject_key_identifier = Some(colon_hex(key_id.0));
        }
    }

    (exts, dns_names)
}

fn key_usage_labels(ku: &KeyUsage) -> String {
    let mut labels = Vec::new();
    if ku.digital_signature() {
        labels.push("Digital Signature");
    }
    if ku.non_repudiation() {
        labels.push("Content Commitment");
    }
    if ku.key_encipherment() {
        labels.push("Key Encipherment");
    }
    if ku.data_encipherment() {
        labels.push("Data Encipherment");
    }
    if ku.key_agreement() {
        labels.push("Key Agreement");
    }
    if ku.key_cert_sign() {
        labels.push("Certificate Sign");
    }
    if ku.crl_sign() {
        labels.push("CRL Sign");
    }
    if ku.encipher_only() {
        labels.push("Encipher Only");
    }
    if ku.decipher_only() {
        labels.push("Decipher Only");
    }
    labels.join(", ")
}

fn extended_key_usage_labels(eku: &ExtendedKeyUsage) -> String {
    let mut labels: Vec<String> = Vec::new();
    if eku.server_auth {
        labels.push("TLS Web Server Authentication".to_string());
    }
    if eku.client_auth {
        labels.push("TLS Web Client Authentication".to_string());
    }
    if eku.code_signing {
        labels.push("Code Signing".to_string());
    }
    if eku.email_protection {
        labels.push("E-mail Protection".to_string());
    }
    if eku.time_stamping {
        labels.push("Time Stamping".to_string());
    }
    for oid in &eku.other {
        labels.push(oid.to_id_string());
    }
    labels.join(", ")
}

fn signature_algorithm_label(cert: &X509Certificate) -> String {
    let alg = &cert.signature_algorithm;
    let label = match alg.algorithm.to_id_string().as_str() {
        "1.2.840.113549.1.1.2" => "md2, rsa",
        "1.2.840.113549.1.1.4" => "md5, rsa",
        "1.2.840.113549.1.1.5" => "sha1, rsa",
        "1.2.840.113549.1.1.11" => "sha256, rsa",
        "1.2.840.113549.1.1.12" => "sha384, rsa",
        "1.2.840.113549.1.1.13" => "sha512, rsa",
        "1.2.840.113549.1.1.10" => rsa_pss_label(alg),
        "1.2.840.10040.4.3" => "sha1, dsa",
        "2.16.840.1.101.3.4.3.2" => "sha256, dsa",
        "1.2.840.10045.4.1" => "sha1, ecdsa",
        "1.2.840.10045.4.3.2" => "sha256, ecdsa",
        "1.2.840.10045.4.3.3" => "sha384, ecdsa",
        "1.2.840.10045.4.3.4" => "sha512, ecdsa",
        "1.3.101.112" => "ed25519",
        _ => "unknown",
    };
    label.to_string()
}

/// RSASSA-PSS names the hash inside the algorithm parameters.
fn rsa_pss_label(alg: &AlgorithmIdentifier) -> &'static str {
    use x509_parser::signature_algorithm::SignatureAlgorithm;

    match SignatureAlgorithm::try_from(alg) {
        Ok(SignatureAlgorithm::RSASSA_PSS(params)) => {
            match params.hash_algorithm_oid().to_id_string().as_str() {
                "2.16.840.1.101.3.4.2.1" => "sha256, rsa-pss",
                "2.16.840.1.101.3.4.2.2" => "sha384, rsa-pss",
                "2.16.840.1.101.3.4.2.3" => "sha512, rsa-pss",
                _ => "unknown",
            }
        }
        _ => "unknown",
    }
}
