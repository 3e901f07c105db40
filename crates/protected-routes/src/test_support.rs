//! RSA fixtures and token minting shared by the unit tests.

use crate::auth::keys::VerificationKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};

/// Private JWKs: they still carry `d`, `p`, `q`, ... so tests also cover
/// stripping.
pub(crate) const PRIMARY_JWK: &str = include_str!("../fixtures/primary.jwk.json");
pub(crate) const PRIMARY_PEM: &str = include_str!("../fixtures/primary.pem");
pub(crate) const OTHER_JWK: &str = include_str!("../fixtures/other.jwk.json");
pub(crate) const OTHER_PEM: &str = include_str!("../fixtures/other.pem");

pub(crate) fn jwk(json: &str) -> VerificationKey {
    VerificationKey::from_json(serde_json::from_str(json).unwrap()).unwrap()
}

pub(crate) fn mint(pem: &str, kid: &str, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_owned());
    mint_with_header(header, pem, claims)
}

pub(crate) fn mint_with_header(header: Header, pem: &str, claims: &serde_json::Value) -> String {
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}
