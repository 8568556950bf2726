//! Client registration record. Only the fqdn list feeds policy decisions.

use crate::decoder::{self, DecodeError, Decoder, Field, JsonKind};
use serde_json::Value;

const RESOURCE: &str = "Client";

const ENVELOPE: Field = Field::required("client", JsonKind::Object);

const ID: Field = Field::required("id", JsonKind::String);
const NAME: Field = Field::required("name", JsonKind::String);
const VISIBILITY: Field = Field::required("visibility", JsonKind::String);
const FQDNS: Field = Field::required("fqdns", JsonKind::Array);
const SCOPES: Field = Field::required("scopes", JsonKind::Array);
const GRANT_TYPES: Field = Field::required("grant_types", JsonKind::Array);
const REDIRECT_URIS: Field = Field::required("redirect_uris", JsonKind::Array);
const PUBLIC_CLIENT: Field = Field::optional("public_client", JsonKind::Bool);
const PROJECT: Field = Field::optional("project", JsonKind::String);
const PARENT_CLIENT: Field = Field::optional("parent_client", JsonKind::String);
const REQUIRED_IDP: Field = Field::optional("required_idp", JsonKind::String);
const PRESELECT_IDP: Field = Field::optional("preselect_idp", JsonKind::String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub visibility: String,
    pub fqdns: Vec<String>,
    pub scopes: Vec<String>,
    pub grant_types: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub public_client: Option<bool>,
    pub project: Option<String>,
    pub parent_client: Option<String>,
    pub required_idp: Option<String>,
    pub preselect_idp: Option<String>,
}

impl Client {
    /// Fields of the object inside the `client` envelope.
    pub const FIELDS: &'static [Field] = &[
        ID,
        NAME,
        VISIBILITY,
        FQDNS,
        SCOPES,
        GRANT_TYPES,
        REDIRECT_URIS,
        PUBLIC_CLIENT,
        PROJECT,
        PARENT_CLIENT,
        REQUIRED_IDP,
        PRESELECT_IDP,
    ];

    pub fn from_json_str(body: &str) -> Result<Self, DecodeError> {
        let value = decoder::parse(RESOURCE, body)?;
        Self::from_json(&value)
    }

    /// Decode a `{"client": {...}}` response.
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let envelope = Decoder::new(RESOURCE, value)?;
        let d = envelope.require_nested(&ENVELOPE)?;

        Ok(Self {
            id: d.require(&ID)?,
            name: d.require(&NAME)?,
            visibility: d.require(&VISIBILITY)?,
            fqdns: d.require(&FQDNS)?,
            scopes: d.require(&SCOPES)?,
            grant_types: d.require(&GRANT_TYPES)?,
            redirect_uris: d.require(&REDIRECT_URIS)?,
            public_client: d.get(&PUBLIC_CLIENT)?,
            project: d.get(&PROJECT)?,
            parent_client: d.get(&PARENT_CLIENT)?,
            required_idp: d.get(&REQUIRED_IDP)?,
            preselect_idp: d.get(&PRESELECT_IDP)?,
        })
    }
}
