//! Identities resource: linked identities plus their provider catalog.

use crate::decoder::{self, DecodeError, Decoder, Field, JsonKind};
use serde_json::Value;

const RESOURCE: &str = "Identities";

const INCLUDED: Field = Field::required("included", JsonKind::Object);
const IDENTITIES: Field = Field::required("identities", JsonKind::Array);

const IDENTITY_PROVIDERS: Field = Field::required("identity_providers", JsonKind::Array);

const PROVIDER_ID: Field = Field::required("id", JsonKind::String);
const PROVIDER_NAME: Field = Field::required("name", JsonKind::String);
const SHORT_NAME: Field = Field::optional("short_name", JsonKind::String);
const DOMAINS: Field = Field::required("domains", JsonKind::Array);
const ALTERNATIVE_NAMES: Field = Field::required("alternative_names", JsonKind::Array);

const IDENTITY_ID: Field = Field::required("id", JsonKind::String);
const IDENTITY_USERNAME: Field = Field::required("username", JsonKind::String);
const STATUS: Field = Field::required("status", JsonKind::String);
const IDENTITY_PROVIDER: Field = Field::required("identity_provider", JsonKind::String);
const IDENTITY_EMAIL: Field = Field::optional("email", JsonKind::String);
const IDENTITY_NAME: Field = Field::optional("name", JsonKind::String);
const ORGANIZATION: Field = Field::optional("organization", JsonKind::String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    Unused,
    Used,
    Private,
    Closed,
}

impl IdentityStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "unused" => Some(Self::Unused),
            "used" => Some(Self::Used),
            "private" => Some(Self::Private),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProvider {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub domains: Vec<String>,
    pub alternative_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub status: IdentityStatus,
    pub identity_provider: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    pub providers: Vec<IdentityProvider>,
    pub identities: Vec<Identity>,
}

impl IdentitySet {
    pub const FIELDS: &'static [Field] = &[INCLUDED, IDENTITIES];

    pub const PROVIDER_FIELDS: &'static [Field] = &[
        PROVIDER_ID,
        PROVIDER_NAME,
        SHORT_NAME,
        DOMAINS,
        ALTERNATIVE_NAMES,
    ];

    pub const IDENTITY_FIELDS: &'static [Field] = &[
        IDENTITY_ID,
        IDENTITY_USERNAME,
        STATUS,
        IDENTITY_PROVIDER,
        IDENTITY_EMAIL,
        IDENTITY_NAME,
        ORGANIZATION,
    ];

    pub fn from_json_str(body: &str) -> Result<Self, DecodeError> {
        let value = decoder::parse(RESOURCE, body)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let d = Decoder::new(RESOURCE, value)?;

        let included = d.require_nested(&INCLUDED)?;
        let providers = included
            .each(&IDENTITY_PROVIDERS, |p| decode_provider(&p))?
            .unwrap_or_default();

        let identities = d
            .each(&IDENTITIES, |i| decode_identity(&i))?
            .unwrap_or_default();

        Ok(Self {
            providers,
            identities,
        })
    }

    /// Look up a provider by id in the catalog.
    pub fn provider(&self, id: &str) -> Option<&IdentityProvider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn identity(&self, id: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.id == id)
    }
}

fn decode_provider(d: &Decoder<'_>) -> Result<IdentityProvider, DecodeError> {
    Ok(IdentityProvider {
        id: d.require(&PROVIDER_ID)?,
        name: d.require(&PROVIDER_NAME)?,
        short_name: d.get(&SHORT_NAME)?,
        domains: d.require(&DOMAINS)?,
        alternative_names: d.require(&ALTERNATIVE_NAMES)?,
    })
}

fn decode_identity(d: &Decoder<'_>) -> Result<Identity, DecodeError> {
    let id = d.require(&IDENTITY_ID)?;
    let username = d.require(&IDENTITY_USERNAME)?;
    let status: String = d.require(&STATUS)?;
    let status = IdentityStatus::parse(&status).ok_or_else(|| d.invalid_value(&STATUS, &status))?;

    Ok(Identity {
        id,
        username,
        status,
        identity_provider: d.require(&IDENTITY_PROVIDER)?,
        email: d.get(&IDENTITY_EMAIL)?,
        name: d.get(&IDENTITY_NAME)?,
        organization: d.get(&ORGANIZATION)?,
    })
}
