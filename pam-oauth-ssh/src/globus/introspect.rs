//! Token introspection record (RFC 7662 with Globus Auth extensions).

use crate::decoder::{self, DecodeError, Decoder, Field, JsonKind};
use serde_json::Value;

const RESOURCE: &str = "Introspect";

const ACTIVE: Field = Field::required("active", JsonKind::Bool);
const SCOPE: Field = Field::required("scope", JsonKind::String);
const CLIENT_ID: Field = Field::required("client_id", JsonKind::String);
const SUB: Field = Field::required("sub", JsonKind::String);
const USERNAME: Field = Field::required("username", JsonKind::String);
const ISS: Field = Field::required("iss", JsonKind::String);
const EMAIL: Field = Field::required("email", JsonKind::String);
const EXP: Field = Field::required("exp", JsonKind::Int);
const IAT: Field = Field::required("iat", JsonKind::Int);
const NBF: Field = Field::required("nbf", JsonKind::Int);
const AUD: Field = Field::required("aud", JsonKind::Array);
const IDENTITIES_SET: Field = Field::optional("identities_set", JsonKind::Array);
const SESSION_INFO: Field = Field::optional("session_info", JsonKind::Object);

const SESSION_ID: Field = Field::required("session_id", JsonKind::String);
const AUTHENTICATIONS: Field = Field::optional("authentications", JsonKind::Object);

const IDP: Field = Field::required("idp", JsonKind::String);
const AUTH_TIME: Field = Field::required("auth_time", JsonKind::Int);
const AMR: Field = Field::optional("amr", JsonKind::Array);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Introspect {
    pub active: bool,
    pub scope: String,
    pub client_id: String,
    pub sub: String,
    pub username: String,
    pub issuer: String,
    pub email: String,
    pub expiry: i64,
    pub issued_at: i64,
    pub not_before: i64,
    pub audiences: Vec<String>,
    pub identities_set: Option<Vec<String>>,
    pub session_info: Option<SessionInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub authentications: Option<Vec<Authentication>>,
}

/// One authentication event of the session, keyed by the identity that
/// performed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authentication {
    pub identity_id: String,
    pub idp: String,
    pub auth_time: i64,
    pub amr: Amr,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Amr {
    pub mfa: bool,
}

impl Amr {
    fn from_claims(claims: &[String]) -> Self {
        Self {
            mfa: claims.iter().any(|c| c == "mfa"),
        }
    }
}

impl Introspect {
    /// Top-level descriptor table, in decode order.
    pub const FIELDS: &'static [Field] = &[
        ACTIVE,
        SCOPE,
        CLIENT_ID,
        SUB,
        USERNAME,
        ISS,
        EMAIL,
        EXP,
        IAT,
        NBF,
        AUD,
        IDENTITIES_SET,
        SESSION_INFO,
    ];

    /// Fields of `session_info`.
    pub const SESSION_FIELDS: &'static [Field] = &[SESSION_ID, AUTHENTICATIONS];

    /// Fields of each record under `session_info.authentications`.
    pub const AUTHENTICATION_FIELDS: &'static [Field] = &[IDP, AUTH_TIME, AMR];

    pub fn from_json_str(body: &str) -> Result<Self, DecodeError> {
        let value = decoder::parse(RESOURCE, body)?;
        Self::from_json(&value)
    }

    /// Decode an introspection response.
    ///
    /// An inactive token stops decoding after `active`; every other field is
    /// left at its zero value whatever the body contains.
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let d = Decoder::new(RESOURCE, value)?;

        if !d.require::<bool>(&ACTIVE)? {
            return Ok(Self::default());
        }

        Ok(Self {
            active: true,
            scope: d.require(&SCOPE)?,
            client_id: d.require(&CLIENT_ID)?,
            sub: d.require(&SUB)?,
            username: d.require(&USERNAME)?,
            issuer: d.require(&ISS)?,
            email: d.require(&EMAIL)?,
            expiry: d.require(&EXP)?,
            issued_at: d.require(&IAT)?,
            not_before: d.require(&NBF)?,
            audiences: d.require(&AUD)?,
            identities_set: d.get(&IDENTITIES_SET)?,
            session_info: d
                .nested(&SESSION_INFO)?
                .map(|s| decode_session_info(&s))
                .transpose()?,
        })
    }

    /// Authentication records of the session, empty when none were sent.
    pub fn authentications(&self) -> &[Authentication] {
        self.session_info
            .as_ref()
            .and_then(|s| s.authentications.as_deref())
            .unwrap_or(&[])
    }
}

fn decode_session_info(d: &Decoder<'_>) -> Result<SessionInfo, DecodeError> {
    Ok(SessionInfo {
        session_id: d.require(&SESSION_ID)?,
        authentications: d.entries(&AUTHENTICATIONS, |identity_id, a| {
            let amr: Option<Vec<String>> = a.get(&AMR)?;
            Ok(Authentication {
                identity_id: identity_id.to_owned(),
                idp: a.require(&IDP)?,
                auth_time: a.require(&AUTH_TIME)?,
                amr: amr.map(|c| Amr::from_claims(&c)).unwrap_or_default(),
            })
        })?,
    })
}
