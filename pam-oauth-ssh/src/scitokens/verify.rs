//! SciToken verification with issuer-published keys.

use super::jwks::{select_key, JwksClient};
use super::{ScitokenClaims, ScitokenError, ScitokenVerifier};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

pub struct JwksVerifier {
    issuers: Vec<String>,
    audience: String,
    keys: JwksClient,
}

impl JwksVerifier {
    /// Trust `issuers`; tokens must name `audience` (this host's name).
    pub fn new(issuers: &[String], audience: &str) -> Result<Self, ScitokenError> {
        Ok(Self {
            issuers: issuers
                .iter()
                .map(|i| i.trim_end_matches('/').to_string())
                .collect(),
            audience: audience.to_string(),
            keys: JwksClient::new()?,
        })
    }

    /// Verifier for this host, with the audience taken from its hostname.
    pub fn for_host(issuers: &[String]) -> Result<Self, ScitokenError> {
        let hostname = gethostname::gethostname().to_string_lossy().to_string();
        Self::new(issuers, &hostname)
    }

    fn trusted_issuer(&self, token: &str) -> Result<String, ScitokenError> {
        let claims = ScitokenClaims::unverified(token)?;
        let issuer = claims.iss.trim_end_matches('/');
        if !self.issuers.iter().any(|i| i == issuer) {
            return Err(ScitokenError::UntrustedIssuer(claims.iss));
        }
        Ok(claims.iss)
    }

    fn verify_and_decode(&self, token: &str) -> Result<ScitokenClaims, ScitokenError> {
        let issuer = self.trusted_issuer(token)?;

        let header = decode_header(token).map_err(|e| ScitokenError::Malformed(e.to_string()))?;
        let key_set = self.keys.key_set(&issuer)?;
        let jwk = select_key(&key_set, header.kid.as_deref())?;

        let decoding_key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| ScitokenError::Invalid(format!("Invalid JWK: {}", e)))?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&issuer]);

        let token_data = decode::<ScitokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| ScitokenError::Invalid(e.to_string()))?;
        Ok(token_data.claims)
    }
}

impl ScitokenVerifier for JwksVerifier {
    fn verify(&self, token: &str, account: &str) -> Result<(), ScitokenError> {
        let claims = self.verify_and_decode(token)?;
        if !claims.authorizes_login(account) {
            return Err(ScitokenError::LoginNotAuthorized(account.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scitokens::tests::unsigned_token;

    fn verifier() -> JwksVerifier {
        JwksVerifier::new(&["https://issuer.example.org/".to_string()], "host").unwrap()
    }

    #[test]
    fn test_issuers_normalized() {
        assert_eq!(verifier().issuers, vec!["https://issuer.example.org"]);
    }

    #[test]
    fn test_untrusted_issuer_rejected_before_fetch() {
        let token = unsigned_token(r#"{"iss":"https://evil.example.com","aud":"host","exp":1}"#);
        assert!(matches!(
            verifier().verify(&token, "alice"),
            Err(ScitokenError::UntrustedIssuer(ref i)) if i == "https://evil.example.com"
        ));
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            verifier().verify("not.a-token", "alice"),
            Err(ScitokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_host_audience() {
        let v = JwksVerifier::for_host(&[]).unwrap();
        assert!(!v.audience.is_empty());
    }
}
